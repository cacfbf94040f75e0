use anyhow::{Context, Result};
use loadbench_config::LoadBenchConfig;
use loadbench_core::RunRequest;
use tokio_stream::StreamExt;
use tracing::{info, warn};

use super::{open_engine, print_json};

/// Start a run and block until it reaches a terminal state.
///
/// Ctrl-C requests cancellation; the run still finishes its current unit.
pub async fn handle_run(config: &LoadBenchConfig, request: RunRequest, follow: bool) -> Result<()> {
    let engine = open_engine(config).await?;
    let recovered = engine.recover().await?;
    if recovered > 0 {
        warn!(count = recovered, "Failed runs abandoned by an earlier process");
    }
    let run = engine.start_run(request).await.context("Run rejected")?;
    info!(run_id = %run.id, "Run started");

    let mut progress = if follow {
        Some(engine.subscribe(run.id).await?)
    } else {
        None
    };

    let wait = engine.wait(run.id);
    tokio::pin!(wait);
    let mut interrupted = false;

    let finished = loop {
        tokio::select! {
            finished = &mut wait => break finished?,
            snapshot = async {
                match progress.as_mut() {
                    Some(stream) => stream.next().await,
                    None => std::future::pending().await,
                }
            } => match snapshot {
                Some(snapshot) => println!("data: {}", snapshot.to_json()),
                None => progress = None,
            },
            signal = tokio::signal::ctrl_c(), if !interrupted => {
                signal.context("Failed to listen for Ctrl-C")?;
                interrupted = true;
                warn!(run_id = %run.id, "Interrupted, cancelling run");
                engine.cancel_run(run.id).await?;
            }
        }
    };

    // drain whatever the run published before it finished
    if let Some(mut stream) = progress {
        while let Some(snapshot) = stream.next().await {
            println!("data: {}", snapshot.to_json());
        }
    }

    print_json(&finished.to_resource())
}
