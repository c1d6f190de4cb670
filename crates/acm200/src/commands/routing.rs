//! Routing command handlers: `switch`, `route`, `routes`.

use serde::Serialize;
use tabled::Tabled;

use acm200_core::{InputLabels, Matrix, MatrixConfig, RoutingSnapshot, output_name};

use crate::cli::{GlobalOpts, RouteArgs, SwitchArgs};
use crate::error::CliError;
use crate::output;

// ── Route rows ──────────────────────────────────────────────────────

#[derive(Serialize)]
struct RouteEntry {
    output: u16,
    output_name: String,
    input: Option<u16>,
    source: Option<String>,
}

#[derive(Tabled)]
struct RouteRow {
    #[tabled(rename = "Output")]
    output: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Input")]
    input: String,
    #[tabled(rename = "Source")]
    source: String,
}

impl From<&RouteEntry> for RouteRow {
    fn from(e: &RouteEntry) -> Self {
        Self {
            output: format!("OUT{:03}", e.output),
            name: e.output_name.clone(),
            input: e
                .input
                .map_or_else(|| "-".into(), |input| format!("IN{input:03}")),
            source: e.source.clone().unwrap_or_else(|| "unknown".into()),
        }
    }
}

fn entry(config: &MatrixConfig, labels: &InputLabels, output: u16, input: Option<u16>) -> RouteEntry {
    RouteEntry {
        output,
        output_name: output_name(output, &config.output_names),
        input,
        source: input.map(|i| {
            labels
                .label(i)
                .map_or_else(|| format!("Input {i}"), ToOwned::to_owned)
        }),
    }
}

fn plain_line(e: &RouteEntry) -> String {
    let input = e.input.map_or_else(|| "-".into(), |i| i.to_string());
    format!("{} {input}", e.output)
}

// ── Switch ──────────────────────────────────────────────────────────

#[derive(Serialize)]
struct SwitchReport {
    output: u16,
    output_name: String,
    input: u16,
    source: String,
    command: String,
    rejected: bool,
    reply: String,
}

pub async fn switch(
    config: MatrixConfig,
    args: SwitchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let labels = InputLabels::new(config.num_inputs, &config.input_names);
    let name = output_name(args.output, &config.output_names);
    let output = args.output;
    let source = args.source.trim().to_owned();

    let (receipt, input) = Matrix::oneshot(config, move |matrix| async move {
        match source.parse::<u16>() {
            Ok(input) => Ok((matrix.switch_route(output, input).await?, input)),
            Err(_) => {
                let receipt = matrix.select_source(output, &source).await?;
                let input = matrix.labels().input_for(&source).unwrap_or_default();
                Ok((receipt, input))
            }
        }
    })
    .await?;

    let color = output::should_color(global.color);
    if receipt.rejected {
        eprintln!(
            "{}",
            output::warn_text(
                &format!("! matrix reported an error: {}", receipt.reply.trim()),
                color
            )
        );
    }

    let report = SwitchReport {
        output,
        output_name: name,
        input,
        source: labels
            .label(input)
            .map_or_else(|| format!("Input {input}"), ToOwned::to_owned),
        command: receipt.command,
        rejected: receipt.rejected,
        reply: receipt.reply.trim().to_owned(),
    };

    let out = output::render_single(
        global.output,
        &report,
        |r| {
            output::ok_text(
                &format!(
                    "✓ {} (OUT{:03}) → {} (IN{:03})",
                    r.output_name, r.output, r.source, r.input
                ),
                color,
            )
        },
        |r| r.command.clone(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

// ── Route ───────────────────────────────────────────────────────────

pub async fn route(
    config: MatrixConfig,
    args: RouteArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let output = args.output;
    let labels = InputLabels::new(config.num_inputs, &config.input_names);
    let entry_config = config.clone();

    let input = Matrix::oneshot(config, move |matrix| async move {
        matrix.get_route(output).await
    })
    .await?;

    let e = entry(&entry_config, &labels, output, input);
    let out = output::render_single(
        global.output,
        &e,
        |e| {
            let row = RouteRow::from(e);
            format!("{} ({}) ← {} ({})", row.name, row.output, row.source, row.input)
        },
        plain_line,
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

// ── Routes ──────────────────────────────────────────────────────────

fn entries(config: &MatrixConfig, snapshot: &RoutingSnapshot) -> Vec<RouteEntry> {
    let labels = InputLabels::new(config.num_inputs, &config.input_names);
    (1..=config.num_outputs)
        .map(|output| entry(config, &labels, output, snapshot.input_for(output)))
        .collect()
}

pub async fn routes(config: MatrixConfig, global: &GlobalOpts) -> Result<(), CliError> {
    let entry_config = config.clone();

    let snapshot = Matrix::oneshot(config, |matrix| async move { matrix.refresh().await }).await?;

    let rows = entries(&entry_config, &snapshot);
    let out = output::render_list(global.output, &rows, |e| RouteRow::from(e), plain_line)?;
    output::print_output(&out, global.quiet);

    if !snapshot.is_complete() && !global.quiet {
        let color = output::should_color(global.color);
        eprintln!(
            "{}",
            output::dim_text(
                &format!("{} output(s) did not report a route", snapshot.missing().len()),
                color
            )
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn entries_cover_every_output() {
        let mut config = MatrixConfig::new("10.0.0.5");
        config.num_outputs = 3;
        config.input_names.insert(2, "Apple TV".into());
        config.output_names.insert(1, "Lounge".into());
        let snapshot = RoutingSnapshot::new(BTreeMap::from([(1, 2), (3, 4)]), 3);

        let rows = entries(&config, &snapshot);

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].output_name, "Lounge");
        assert_eq!(rows[0].source.as_deref(), Some("Apple TV"));
        assert_eq!(rows[1].input, None);
        assert_eq!(rows[2].source.as_deref(), Some("Input 4"));
        assert_eq!(plain_line(&rows[1]), "2 -");
    }
}
