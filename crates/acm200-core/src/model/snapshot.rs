// ── Routing snapshot ──
//
// One poll cycle's view of the matrix. Built fresh every cycle and never
// mutated afterwards; an output missing from the map is "unknown".

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// One output -> input assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Route {
    pub output: u16,
    pub input: u16,
}

impl Route {
    pub fn new(output: u16, input: u16) -> Self {
        Self { output, input }
    }
}

/// Output -> input routes for outputs `1..=num_outputs`.
#[derive(Debug, Clone, Serialize)]
pub struct RoutingSnapshot {
    routes: BTreeMap<u16, u16>,
    num_outputs: u16,
    taken_at: DateTime<Utc>,
}

impl RoutingSnapshot {
    /// Build a snapshot, dropping ids of zero and outputs beyond `num_outputs`.
    pub fn new(routes: BTreeMap<u16, u16>, num_outputs: u16) -> Self {
        let routes = routes
            .into_iter()
            .filter(|(output, input)| *output >= 1 && *output <= num_outputs && *input >= 1)
            .collect();
        Self {
            routes,
            num_outputs,
            taken_at: Utc::now(),
        }
    }

    pub fn routes(&self) -> &BTreeMap<u16, u16> {
        &self.routes
    }

    pub fn num_outputs(&self) -> u16 {
        self.num_outputs
    }

    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    /// Input feeding `output`, if known.
    pub fn input_for(&self, output: u16) -> Option<u16> {
        self.routes.get(&output).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = Route> + '_ {
        self.routes
            .iter()
            .map(|(output, input)| Route::new(*output, *input))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Every configured output has a known route.
    pub fn is_complete(&self) -> bool {
        self.missing().is_empty()
    }

    /// Configured outputs with no known route, ascending.
    pub fn missing(&self) -> Vec<u16> {
        (1..=self.num_outputs)
            .filter(|output| !self.routes.contains_key(output))
            .collect()
    }

    /// One-line summary, e.g. `OUT001→IN002, OUT003→IN001`, or `No data`
    /// when no output has a known route.
    pub fn overview(&self) -> String {
        if self.routes.is_empty() {
            return "No data".into();
        }
        self.routes
            .iter()
            .map(|(output, input)| format!("OUT{output:03}→IN{input:03}"))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// `output_001 -> input_002` pairs in output order.
    pub fn attributes(&self) -> BTreeMap<String, String> {
        self.routes
            .iter()
            .map(|(output, input)| (format!("output_{output:03}"), format!("input_{input:03}")))
            .collect()
    }
}
