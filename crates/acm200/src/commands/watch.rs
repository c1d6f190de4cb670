//! `watch`: run the background poller and print every outcome until Ctrl-C.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use serde::Serialize;

use acm200_core::{Matrix, MatrixConfig, PollStatus};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
enum WatchEvent<'a> {
    Ready {
        taken_at: DateTime<Utc>,
        routes: BTreeMap<String, String>,
    },
    Unavailable {
        error: &'a str,
    },
}

fn render(status: &PollStatus, format: OutputFormat, color: bool) -> Result<Option<String>, CliError> {
    let event = match status {
        PollStatus::Pending => return Ok(None),
        PollStatus::Ready(snapshot) => WatchEvent::Ready {
            taken_at: snapshot.taken_at(),
            routes: snapshot.attributes(),
        },
        PollStatus::Unavailable(error) => WatchEvent::Unavailable { error },
    };

    let line = match format {
        OutputFormat::Json | OutputFormat::JsonCompact => output::render_json(&event, true)?,
        OutputFormat::Yaml => format!("---\n{}", output::render_yaml(&event)?),
        OutputFormat::Table | OutputFormat::Plain => {
            let stamp = output::dim_text(&Local::now().format("[%H:%M:%S]").to_string(), color);
            let body = match status {
                PollStatus::Ready(snapshot) => output::ok_text(&snapshot.overview(), color),
                PollStatus::Unavailable(error) => {
                    output::warn_text(&format!("unavailable: {error}"), color)
                }
                PollStatus::Pending => return Ok(None),
            };
            format!("{stamp} {body}")
        }
    };
    Ok(Some(line))
}

pub async fn handle(
    mut config: MatrixConfig,
    args: WatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if let Some(secs) = args.interval {
        config.poll_interval = Duration::from_secs(secs);
    }
    let interval = config.effective_poll_interval();
    let color = output::should_color(global.color);

    let matrix = Matrix::new(config)?;
    let mut updates = matrix.subscribe();
    matrix.start().await?;

    if !global.quiet {
        eprintln!(
            "Watching {} every {}s (Ctrl-C to stop)",
            matrix.device_info().unique_key,
            interval.as_secs()
        );
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let result = loop {
        tokio::select! {
            _ = &mut ctrl_c => break Ok(()),
            changed = updates.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                let status = updates.borrow_and_update().clone();
                match render(&status, global.output, color) {
                    Ok(Some(line)) => output::print_output(&line, global.quiet),
                    Ok(None) => {}
                    Err(e) => break Err(e),
                }
            }
        }
    };

    matrix.shutdown().await;
    result
}
