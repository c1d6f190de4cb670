//! Commands answered from configuration alone: `inputs` and `info`.

use serde::Serialize;
use tabled::Tabled;

use acm200_core::{DeviceInfo, InputLabels, MatrixConfig};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

// ── Inputs ──────────────────────────────────────────────────────────

#[derive(Serialize)]
struct InputEntry {
    input: u16,
    label: String,
}

#[derive(Tabled)]
struct InputRow {
    #[tabled(rename = "Input")]
    input: String,
    #[tabled(rename = "Source")]
    label: String,
}

pub fn inputs(config: &MatrixConfig, global: &GlobalOpts) -> Result<(), CliError> {
    let labels = InputLabels::new(config.num_inputs, &config.input_names);
    let entries: Vec<InputEntry> = labels
        .iter()
        .map(|(input, label)| InputEntry {
            input,
            label: label.to_owned(),
        })
        .collect();

    let out = output::render_list(
        global.output,
        &entries,
        |e| InputRow {
            input: format!("IN{:03}", e.input),
            label: e.label.clone(),
        },
        |e| e.label.clone(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

// ── Info ────────────────────────────────────────────────────────────

fn detail(info: &DeviceInfo) -> String {
    [
        format!("Name:          {}", info.name),
        format!("Manufacturer:  {}", info.manufacturer),
        format!("Model:         {}", info.model),
        format!("Address:       {}", info.unique_key),
        format!("Inputs:        {}", info.num_inputs),
        format!("Outputs:       {}", info.num_outputs),
        format!("Support:       {}", info.configuration_url),
    ]
    .join("\n")
}

pub fn info(config: &MatrixConfig, global: &GlobalOpts) -> Result<(), CliError> {
    let info = DeviceInfo::from_config(config);
    let out = output::render_single(global.output, &info, detail, |i| i.unique_key.clone())?;
    output::print_output(&out, global.quiet);
    Ok(())
}
