// ── Friendly names ──
//
// Inputs are offered to users as a list of source labels; labels must be
// unique, so repeated friendly names get a ` (n)` suffix in order.

use std::collections::{BTreeMap, HashMap};

/// Make labels unique while keeping order: the second `Apple TV` becomes
/// `Apple TV (2)`, the third `Apple TV (3)`.
pub fn unique_labels<I>(labels: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen: HashMap<String, usize> = HashMap::new();
    labels
        .into_iter()
        .map(|label| {
            let count = seen.entry(label.clone()).or_insert(0);
            *count += 1;
            if *count == 1 {
                label
            } else {
                format!("{label} ({count})")
            }
        })
        .collect()
}

fn friendly(names: &BTreeMap<u16, String>, id: u16) -> Option<&str> {
    names
        .get(&id)
        .map(|name| name.trim())
        .filter(|name| !name.is_empty())
}

/// Display name of an output: its friendly name, else `Output 001`.
pub fn output_name(output: u16, names: &BTreeMap<u16, String>) -> String {
    friendly(names, output).map_or_else(|| format!("Output {output:03}"), ToOwned::to_owned)
}

/// Source labels for inputs `1..=num_inputs`, with lookup both ways.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputLabels {
    labels: Vec<String>,
}

impl InputLabels {
    pub fn new(num_inputs: u16, names: &BTreeMap<u16, String>) -> Self {
        let raw = (1..=num_inputs).map(|id| {
            friendly(names, id).map_or_else(|| format!("Input {id}"), ToOwned::to_owned)
        });
        Self {
            labels: unique_labels(raw),
        }
    }

    /// Label for `input`, if it is within the configured range.
    pub fn label(&self, input: u16) -> Option<&str> {
        let index = usize::from(input).checked_sub(1)?;
        self.labels.get(index).map(String::as_str)
    }

    /// Input id for an exact label.
    pub fn input_for(&self, label: &str) -> Option<u16> {
        self.labels
            .iter()
            .position(|l| l == label)
            .and_then(|index| u16::try_from(index + 1).ok())
    }

    /// `(input id, label)` pairs in id order.
    pub fn iter(&self) -> impl Iterator<Item = (u16, &str)> {
        (1u16..).zip(self.labels.iter().map(String::as_str))
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}
