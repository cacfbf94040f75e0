//! Synthetic dataset generation
//!
//! A run's column layout (which positions hold dates, which semantic field
//! every other position represents) is drawn once from the run seed. Rows are
//! then produced lazily from a second stream derived from the same seed, so
//! calling [`DatasetGenerator::rows`] again replays the identical sequence.

use chrono::{Datelike, NaiveDate};
use loadbench_core::{
    ColumnKind, DatasetSchema, DateFormat, FieldKind, GeneratedRow, RunConfig, RunId, DATE_FORMATS,
};
use rand::rngs::StdRng;
use rand::seq::{index, IndexedRandom, SliceRandom};
use rand::{Rng, SeedableRng};

use crate::error::{ExecutionError, ExecutionResult};

/// Longest value emitted for a non-date cell
pub const MAX_FIELD_LEN: usize = 64;

/// Generated dates stay inside the window two-digit years expand back into
const MIN_YEAR: i32 = 1950;
const MAX_YEAR: i32 = 2049;

/// Separates the row stream from the schema stream of the same seed
const ROW_STREAM_SALT: u64 = 0x9E37_79B9_7F4A_7C15;

/// Produces the dataset of one run
#[derive(Debug, Clone)]
pub struct DatasetGenerator {
    run_id: RunId,
    rows: u64,
    seed: u64,
    invalid_date_ratio: f64,
    schema: DatasetSchema,
}

impl DatasetGenerator {
    /// Validate the shape and fix the column layout.
    ///
    /// Unseeded configs draw a seed here; read it back with [`seed`](Self::seed).
    pub fn new(run_id: RunId, config: &RunConfig) -> ExecutionResult<Self> {
        config
            .validate()
            .map_err(|e| ExecutionError::Configuration(e.to_string()))?;

        let seed = config.seed.unwrap_or_else(rand::random);
        let schema = build_schema(seed, config.columns as usize, config.date_columns as usize);

        Ok(Self {
            run_id,
            rows: config.rows,
            seed,
            invalid_date_ratio: config.invalid_date_ratio,
            schema,
        })
    }

    pub fn schema(&self) -> &DatasetSchema {
        &self.schema
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn row_count(&self) -> u64 {
        self.rows
    }

    /// Fresh pass over the dataset, starting at ordinal 0
    pub fn rows(&self) -> RowStream<'_> {
        RowStream {
            generator: self,
            rng: StdRng::seed_from_u64(self.seed ^ ROW_STREAM_SALT),
            next: 0,
        }
    }

    fn row(&self, ordinal: u64, rng: &mut StdRng) -> GeneratedRow {
        let values = self
            .schema
            .columns
            .iter()
            .map(|column| {
                Some(match column.kind {
                    ColumnKind::Date => self.date_value(rng),
                    ColumnKind::Field(kind) => field_value(kind, rng),
                })
            })
            .collect();

        GeneratedRow {
            run_id: self.run_id,
            ordinal,
            values,
        }
    }

    fn date_value(&self, rng: &mut StdRng) -> String {
        let format = DATE_FORMATS.choose(rng).copied().unwrap_or(DateFormat::IsoDash);
        let year = rng.random_range(MIN_YEAR..=MAX_YEAR);

        if self.invalid_date_ratio > 0.0 && rng.random_bool(self.invalid_date_ratio) {
            // date-shaped but never a real calendar date
            return match rng.random_range(0..3) {
                0 => format.render_parts(year, 13, rng.random_range(1..=28)),
                1 => format.render_parts(year, rng.random_range(1..=12), 32),
                _ => format.render_parts(year, 2, 30),
            };
        }

        let month = rng.random_range(1..=12);
        let day = rng.random_range(1..=days_in_month(year, month));
        match NaiveDate::from_ymd_opt(year, month, day) {
            Some(date) => format.render(date),
            None => format.render_parts(year, month, 1),
        }
    }
}

/// Lazy, finite sequence of generated rows
pub struct RowStream<'a> {
    generator: &'a DatasetGenerator,
    rng: StdRng,
    next: u64,
}

impl Iterator for RowStream<'_> {
    type Item = GeneratedRow;

    fn next(&mut self) -> Option<GeneratedRow> {
        if self.next >= self.generator.rows {
            return None;
        }
        let row = self.generator.row(self.next, &mut self.rng);
        self.next += 1;
        Some(row)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.generator.rows - self.next) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for RowStream<'_> {}

fn build_schema(seed: u64, columns: usize, date_columns: usize) -> DatasetSchema {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut kinds: Vec<ColumnKind> = Vec::with_capacity(columns);

    let mut fields = FieldKind::ALL.to_vec();
    fields.shuffle(&mut rng);
    let mut field_cycle = fields.into_iter().cycle();

    let date_positions = index::sample(&mut rng, columns, date_columns).into_vec();
    for position in 0..columns {
        if date_positions.contains(&position) {
            kinds.push(ColumnKind::Date);
        } else if let Some(kind) = field_cycle.next() {
            kinds.push(ColumnKind::Field(kind));
        }
    }
    DatasetSchema::from_kinds(kinds)
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .map(|d| d.day())
        .unwrap_or(28)
}

const FIRST_NAMES: &[&str] = &[
    "James", "Mary", "Robert", "Patricia", "John", "Jennifer", "Michael", "Linda", "David",
    "Elizabeth", "William", "Barbara", "Richard", "Susan", "Joseph", "Jessica", "Thomas", "Sarah",
    "Carlos", "Karen", "Daniel", "Nancy", "Matthew", "Lisa", "Anthony", "Betty", "Mark", "Sandra",
    "Steven", "Ashley",
];

const LAST_NAMES: &[&str] = &[
    "Smith", "Johnson", "Williams", "Brown", "Jones", "Garcia", "Miller", "Davis", "Rodriguez",
    "Martinez", "Hernandez", "Lopez", "Gonzalez", "Wilson", "Anderson", "Thomas", "Taylor", "Moore",
    "Jackson", "Martin", "Lee", "Perez", "Thompson", "White", "Harris", "Clark", "Lewis", "Walker",
];

const COMPANIES: &[&str] = &[
    "Acme Corp", "Globex", "Initech", "Umbrella Holdings", "Stark Industries", "Wayne Enterprises",
    "Hooli", "Vandelay Industries", "Soylent Co", "Tyrell Systems", "Cyberdyne", "Wonka Foods",
    "Pied Piper", "Massive Dynamic", "Oscorp",
];

const JOB_TITLES: &[&str] = &[
    "Software Engineer", "Account Manager", "Data Analyst", "Product Manager", "Sales Associate",
    "Operations Lead", "Support Specialist", "Financial Analyst", "Marketing Coordinator",
    "HR Generalist", "Site Reliability Engineer", "Office Manager",
];

const DEPARTMENTS: &[&str] = &[
    "Engineering", "Sales", "Marketing", "Finance", "Operations", "Support", "Legal",
    "Human Resources", "Research", "Facilities",
];

const STREETS: &[&str] = &[
    "Main St", "Oak Ave", "Maple Dr", "Cedar Ln", "Pine St", "Elm St", "Washington Blvd", "Lake Rd",
    "Hill St", "Park Ave", "Sunset Blvd", "River Rd",
];

const CITIES: &[&str] = &[
    "Springfield", "Riverside", "Franklin", "Greenville", "Bristol", "Clinton", "Fairview", "Salem",
    "Madison", "Georgetown", "Arlington", "Ashland", "Dover", "Oxford",
];

const STATES: &[&str] = &[
    "AL", "AZ", "CA", "CO", "FL", "GA", "IL", "MA", "MI", "MN", "NC", "NJ", "NY", "OH", "OR", "PA",
    "TX", "VA", "WA", "WI",
];

const COUNTRIES: &[&str] = &["United States", "Canada", "Mexico", "Puerto Rico"];

const DOMAINS: &[&str] = &["example.com", "example.org", "mail.test", "corp.example", "inbox.test"];

const WORDS: &[&str] = &[
    "quarterly", "review", "pending", "follow", "up", "customer", "requested", "callback",
    "invoice", "shipped", "delayed", "approved", "renewal", "contract", "meeting", "notes",
    "priority", "escalated", "resolved", "order",
];

fn pick(list: &'static [&'static str], rng: &mut StdRng) -> &'static str {
    list.choose(rng).copied().unwrap_or_default()
}

fn bounded(mut value: String) -> String {
    if value.len() > MAX_FIELD_LEN {
        let mut end = MAX_FIELD_LEN;
        while !value.is_char_boundary(end) {
            end -= 1;
        }
        value.truncate(end);
    }
    value
}

fn field_value(kind: FieldKind, rng: &mut StdRng) -> String {
    let value = match kind {
        FieldKind::FirstName => pick(FIRST_NAMES, rng).to_string(),
        FieldKind::LastName => pick(LAST_NAMES, rng).to_string(),
        FieldKind::FullName => format!("{} {}", pick(FIRST_NAMES, rng), pick(LAST_NAMES, rng)),
        FieldKind::Email => format!(
            "{}.{}{}@{}",
            pick(FIRST_NAMES, rng).to_lowercase(),
            pick(LAST_NAMES, rng).to_lowercase(),
            rng.random_range(1..1000),
            pick(DOMAINS, rng)
        ),
        FieldKind::Phone => format!(
            "({}) {:03}-{:04}",
            rng.random_range(201..990),
            rng.random_range(0..1000),
            rng.random_range(0..10000)
        ),
        FieldKind::Company => pick(COMPANIES, rng).to_string(),
        FieldKind::JobTitle => pick(JOB_TITLES, rng).to_string(),
        FieldKind::Department => pick(DEPARTMENTS, rng).to_string(),
        FieldKind::StreetAddress => {
            format!("{} {}", rng.random_range(1..10000), pick(STREETS, rng))
        }
        FieldKind::City => pick(CITIES, rng).to_string(),
        FieldKind::State => pick(STATES, rng).to_string(),
        FieldKind::PostalCode => format!("{:05}", rng.random_range(501..99951)),
        FieldKind::Country => pick(COUNTRIES, rng).to_string(),
        FieldKind::Username => format!(
            "{}{}",
            pick(FIRST_NAMES, rng).to_lowercase(),
            rng.random_range(10..100000)
        ),
        FieldKind::Website => format!("https://www.{}", pick(DOMAINS, rng)),
        FieldKind::Notes => {
            let count = rng.random_range(3..=9);
            (0..count).map(|_| pick(WORDS, rng)).collect::<Vec<_>>().join(" ")
        }
    };
    bounded(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use loadbench_core::dates;
    use loadbench_core::InsertMethod;

    fn config(rows: u64, columns: u32, date_columns: u32) -> RunConfig {
        RunConfig {
            rows,
            columns,
            date_columns,
            method: InsertMethod::SingleRow,
            seed: Some(42),
            invalid_date_ratio: 0.0,
        }
    }

    #[test]
    fn test_shape_matches_config() {
        let generator = DatasetGenerator::new(RunId::new(), &config(250, 37, 9)).unwrap();
        let date_positions = generator.schema().date_positions();
        assert_eq!(date_positions.len(), 9);

        let rows: Vec<_> = generator.rows().collect();
        assert_eq!(rows.len(), 250);
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(row.ordinal, i as u64);
            assert_eq!(row.width(), 37);
            let dated = row
                .values
                .iter()
                .filter(|v| v.as_deref().is_some_and(dates::is_date_shaped))
                .count();
            assert_eq!(dated, 9);
            for position in &date_positions {
                assert!(dates::is_date_shaped(row.values[*position].as_deref().unwrap()));
            }
        }
    }

    #[test]
    fn test_same_seed_same_bytes() {
        let run_id = RunId::new();
        let a = DatasetGenerator::new(run_id, &config(50, 20, 5)).unwrap();
        let b = DatasetGenerator::new(run_id, &config(50, 20, 5)).unwrap();
        assert_eq!(a.schema(), b.schema());
        assert!(a.rows().eq(b.rows()));
        // restartable
        assert!(a.rows().eq(a.rows()));

        let c = DatasetGenerator::new(run_id, &config(50, 20, 5).with_seed(43)).unwrap();
        assert!(!a.rows().eq(c.rows()));
    }

    #[test]
    fn test_unseeded_generator_reports_its_seed() {
        let mut cfg = config(5, 10, 2);
        cfg.seed = None;
        let generator = DatasetGenerator::new(RunId::new(), &cfg).unwrap();
        let replay = DatasetGenerator::new(RunId::new(), &cfg.with_seed(generator.seed())).unwrap();
        assert_eq!(generator.schema(), replay.schema());
    }

    #[test]
    fn test_generated_dates_always_resolve() {
        let generator = DatasetGenerator::new(RunId::new(), &config(300, 10, 10)).unwrap();
        for row in generator.rows() {
            for value in row.values.iter().flatten() {
                let resolved = dates::parse(value).expect("generated date must resolve");
                assert!((MIN_YEAR..=MAX_YEAR).contains(&resolved.date.year()));
            }
        }
    }

    #[test]
    fn test_invalid_ratio_produces_unresolvable_dates() {
        let mut cfg = config(100, 10, 3);
        cfg.invalid_date_ratio = 1.0;
        let generator = DatasetGenerator::new(RunId::new(), &cfg).unwrap();
        let positions = generator.schema().date_positions();
        for row in generator.rows() {
            for position in &positions {
                let value = row.values[*position].as_deref().unwrap();
                assert!(dates::is_date_shaped(value), "{value}");
                assert!(dates::parse(value).is_none(), "{value}");
            }
        }
    }

    #[test]
    fn test_field_values_are_bounded() {
        let generator = DatasetGenerator::new(RunId::new(), &config(100, 200, 0)).unwrap();
        for row in generator.rows() {
            assert!(row.values.iter().flatten().all(|v| v.len() <= MAX_FIELD_LEN && !v.is_empty()));
        }
    }

    #[test]
    fn test_invalid_config_fails_before_rows() {
        assert!(matches!(
            DatasetGenerator::new(RunId::new(), &config(0, 10, 0)),
            Err(ExecutionError::Configuration(_))
        ));
        assert!(DatasetGenerator::new(RunId::new(), &config(10, 9, 0)).is_err());
        assert!(DatasetGenerator::new(RunId::new(), &config(10, 10, 11)).is_err());
    }

    #[test]
    fn test_days_in_month() {
        assert_eq!(days_in_month(2024, 2), 29);
        assert_eq!(days_in_month(2023, 2), 28);
        assert_eq!(days_in_month(1999, 12), 31);
        assert_eq!(days_in_month(2000, 4), 30);
    }
}
