//! Date format resolver for the ten supported US date shapes.
//!
//! Formats are tried in a fixed priority order so ambiguous input resolves
//! deterministically: 4-digit-year ISO shapes first, zero-padded US shapes
//! before their unpadded counterparts, 2-digit-year shapes last. A candidate
//! only wins if its fields also form a real calendar date.

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical output format
pub const CANONICAL_FORMAT: &str = "%Y-%m-%d";

/// Two-digit years below this pivot land in the 2000s, the rest in the 1900s
pub const TWO_DIGIT_YEAR_PIVOT: u32 = 50;

/// Field order of a date grammar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOrder {
    YearMonthDay,
    MonthDayYear,
}

/// Static description of one date grammar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateFormatSpec {
    pub pattern: &'static str,
    pub separator: char,
    pub order: FieldOrder,
    pub four_digit_year: bool,
    /// Month and day always carry a leading zero
    pub zero_padded: bool,
}

/// The ten recognised formats, declared in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DateFormat {
    /// `YYYY-MM-DD`
    IsoDash,
    /// `YYYY/MM/DD`
    IsoSlash,
    /// `MM/DD/YYYY`
    PaddedSlash,
    /// `MM-DD-YYYY`
    PaddedDash,
    /// `M/D/YYYY`
    Slash,
    /// `M-D-YYYY`
    Dash,
    /// `MM/DD/YY`
    PaddedSlashShortYear,
    /// `MM-DD-YY`
    PaddedDashShortYear,
    /// `M/D/YY`
    SlashShortYear,
    /// `M-D-YY`
    DashShortYear,
}

/// All formats in parse priority order
pub const DATE_FORMATS: [DateFormat; 10] = [
    DateFormat::IsoDash,
    DateFormat::IsoSlash,
    DateFormat::PaddedSlash,
    DateFormat::PaddedDash,
    DateFormat::Slash,
    DateFormat::Dash,
    DateFormat::PaddedSlashShortYear,
    DateFormat::PaddedDashShortYear,
    DateFormat::SlashShortYear,
    DateFormat::DashShortYear,
];

const fn us(
    pattern: &'static str,
    separator: char,
    four_digit_year: bool,
    zero_padded: bool,
) -> DateFormatSpec {
    DateFormatSpec {
        pattern,
        separator,
        order: FieldOrder::MonthDayYear,
        four_digit_year,
        zero_padded,
    }
}

impl DateFormat {
    pub fn spec(&self) -> DateFormatSpec {
        match self {
            DateFormat::IsoDash => DateFormatSpec {
                pattern: "YYYY-MM-DD",
                separator: '-',
                order: FieldOrder::YearMonthDay,
                four_digit_year: true,
                zero_padded: true,
            },
            DateFormat::IsoSlash => DateFormatSpec {
                pattern: "YYYY/MM/DD",
                separator: '/',
                order: FieldOrder::YearMonthDay,
                four_digit_year: true,
                zero_padded: true,
            },
            DateFormat::PaddedSlash => us("MM/DD/YYYY", '/', true, true),
            DateFormat::PaddedDash => us("MM-DD-YYYY", '-', true, true),
            DateFormat::Slash => us("M/D/YYYY", '/', true, false),
            DateFormat::Dash => us("M-D-YYYY", '-', true, false),
            DateFormat::PaddedSlashShortYear => us("MM/DD/YY", '/', false, true),
            DateFormat::PaddedDashShortYear => us("MM-DD-YY", '-', false, true),
            DateFormat::SlashShortYear => us("M/D/YY", '/', false, false),
            DateFormat::DashShortYear => us("M-D-YY", '-', false, false),
        }
    }

    pub fn pattern(&self) -> &'static str {
        self.spec().pattern
    }

    /// Match `raw` against this format only
    pub fn parse_exact(&self, raw: &str) -> Option<NaiveDate> {
        let compiled = COMPILED.iter().find(|c| c.format == *self)?;
        compiled.parse(raw.trim())
    }

    /// Whether `raw` has this format's shape, ignoring calendar validity
    pub fn matches_shape(&self, raw: &str) -> bool {
        COMPILED
            .iter()
            .any(|c| c.format == *self && c.regex.is_match(raw.trim()))
    }

    /// Render a calendar date in this exact shape
    pub fn render(&self, date: NaiveDate) -> String {
        self.render_parts(date.year(), date.month(), date.day())
    }

    /// Render raw numeric parts without calendar checks
    pub fn render_parts(&self, year: i32, month: u32, day: u32) -> String {
        let spec = self.spec();
        let sep = spec.separator;
        let year = if spec.four_digit_year {
            format!("{:04}", year)
        } else {
            format!("{:02}", year.rem_euclid(100))
        };
        let (month, day) = if spec.zero_padded {
            (format!("{:02}", month), format!("{:02}", day))
        } else {
            (month.to_string(), day.to_string())
        };
        match spec.order {
            FieldOrder::YearMonthDay => format!("{year}{sep}{month}{sep}{day}"),
            FieldOrder::MonthDayYear => format!("{month}{sep}{day}{sep}{year}"),
        }
    }
}

impl fmt::Display for DateFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.pattern())
    }
}

struct CompiledFormat {
    format: DateFormat,
    spec: DateFormatSpec,
    regex: Regex,
}

impl CompiledFormat {
    fn build(format: DateFormat) -> Option<Self> {
        let spec = format.spec();
        let year = if spec.four_digit_year { r"(\d{4})" } else { r"(\d{2})" };
        let part = if spec.zero_padded { r"(\d{2})" } else { r"(\d{1,2})" };
        let sep = regex::escape(&spec.separator.to_string());
        let source = match spec.order {
            FieldOrder::YearMonthDay => format!("^{year}{sep}{part}{sep}{part}$"),
            FieldOrder::MonthDayYear => format!("^{part}{sep}{part}{sep}{year}$"),
        };
        let regex = Regex::new(&source).ok()?;
        Some(Self { format, spec, regex })
    }

    fn parse(&self, raw: &str) -> Option<NaiveDate> {
        let caps = self.regex.captures(raw)?;
        let field = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());
        let (year, month, day) = match self.spec.order {
            FieldOrder::YearMonthDay => (field(1)?, field(2)?, field(3)?),
            FieldOrder::MonthDayYear => (field(3)?, field(1)?, field(2)?),
        };
        let year = if self.spec.four_digit_year {
            year as i32
        } else {
            expand_two_digit_year(year)
        };
        NaiveDate::from_ymd_opt(year, month, day)
    }
}

static COMPILED: Lazy<Vec<CompiledFormat>> =
    Lazy::new(|| DATE_FORMATS.into_iter().filter_map(CompiledFormat::build).collect());

/// Expand a two-digit year around the fixed pivot
pub fn expand_two_digit_year(yy: u32) -> i32 {
    if yy < TWO_DIGIT_YEAR_PIVOT {
        2000 + yy as i32
    } else {
        1900 + yy as i32
    }
}

/// A successfully recognised date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedDate {
    pub date: NaiveDate,
    pub format: DateFormat,
}

impl ResolvedDate {
    /// `YYYY-MM-DD`
    pub fn canonical(&self) -> String {
        self.date.format(CANONICAL_FORMAT).to_string()
    }
}

/// Resolve `raw` against all formats in priority order
pub fn parse(raw: &str) -> Option<ResolvedDate> {
    let trimmed = raw.trim();
    COMPILED.iter().find_map(|compiled| {
        compiled.parse(trimmed).map(|date| ResolvedDate {
            date,
            format: compiled.format,
        })
    })
}

/// Resolve `raw` and return its canonical form
pub fn normalize(raw: &str) -> Option<String> {
    parse(raw).map(|resolved| resolved.canonical())
}

/// Whether `raw` has the shape of any supported format
pub fn is_date_shaped(raw: &str) -> bool {
    let trimmed = raw.trim();
    COMPILED.iter().any(|c| c.regex.is_match(trimmed))
}
