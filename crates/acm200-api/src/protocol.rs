// ── ACM200 command codec ──
//
// Formats outgoing command lines and parses free-form status replies.
// The reply grammar differs between firmware revisions, so parsing is a
// list of line patterns tried in order; a line that matches nothing is
// ignored and a bad number only drops that line.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::Error;

/// Output id -> input id, as parsed from one reply.
pub type RouteMap = BTreeMap<u16, u16>;

/// Highest id that fits the 3-digit wire format.
pub const MAX_PORT_ID: u16 = 999;

/// Prompt lines longer than this are treated as data, not a prompt.
const PROMPT_MAX_LEN: usize = 32;

/// Bulk status spellings, most common first.
const BULK_QUERIES: &[&str] = &["STATUS", "OUT 000 STATUS", "OUT000 STATUS", "OUT000STATUS"];

/// What a status query asks about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTarget {
    /// Every output in one reply.
    All,
    /// A single output.
    Output(u16),
}

// ── Formatting ───────────────────────────────────────────────────────

fn check_id(kind: &str, id: u16) -> Result<(), Error> {
    if id == 0 || id > MAX_PORT_ID {
        return Err(Error::invalid(format!(
            "{kind} id must be between 1 and {MAX_PORT_ID}, got {id}"
        )));
    }
    Ok(())
}

/// Build the route switch command, e.g. `OUT002FR005`.
///
/// Emitted in the compact form without spaces; firmware that also accepts
/// `OUT 002 FR 005` accepts this one too.
pub fn format_switch(output: u16, input: u16) -> Result<String, Error> {
    check_id("output", output)?;
    check_id("input", input)?;
    Ok(format!("OUT{output:03}FR{input:03}"))
}

/// Candidate status commands for `target`, in the order they should be tried.
pub fn format_status_query(target: StatusTarget) -> Result<Vec<String>, Error> {
    match target {
        StatusTarget::All => Ok(BULK_QUERIES.iter().map(ToString::to_string).collect()),
        StatusTarget::Output(output) => {
            check_id("output", output)?;
            Ok(vec![
                format!("OUT {output:03} STATUS"),
                format!("OUT{output:03} STATUS"),
                format!("OUT{output:03}STATUS"),
            ])
        }
    }
}

// ── Parsing ──────────────────────────────────────────────────────────

static ROUTE_PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
static TABLE_HEADER: OnceLock<Regex> = OnceLock::new();
static TABLE_ROW: OnceLock<Regex> = OnceLock::new();
static ERROR_MARKER: OnceLock<Regex> = OnceLock::new();

/// Single-line route patterns, most structured first. Every pattern
/// captures `out` and `inp`; `inp` may be the literal `AUTO`.
fn route_patterns() -> &'static [Regex] {
    ROUTE_PATTERNS.get_or_init(|| {
        [
            // OUT 001 FROM IN 002 / OUT001FR002 / Output 1 from Input 2
            r"(?i)\bOUT(?:PUT)?\s*[:#]?\s*(?P<out>\d+)\s*(?:FROM|FR)\s*[:#]?\s*(?:IN(?:PUT)?\s*[:#]?\s*)?(?P<inp>\d+|AUTO)\b",
            // OUT 001 -> IN 002 / Output 01: Input 03 / OUT001 | IN002
            r"(?i)\bOUT(?:PUT)?\s*[:#]?\s*(?P<out>\d+)\s*(?:->|=>|<-|[=:|,])\s*IN(?:PUT)?\s*[:#]?\s*(?P<inp>\d+|AUTO)\b",
            // OUT 001 IN 3
            r"(?i)\bOUT(?:PUT)?\s*[:#]?\s*(?P<out>\d+)\s+IN(?:PUT)?\s*[:#]?\s*(?P<inp>\d+|AUTO)\b",
            // IN 002 -> OUT 001 / Input 2 to Output 1
            r"(?i)\bIN(?:PUT)?\s*[:#]?\s*(?P<inp>\d+|AUTO)\s*(?:->|=>|\bTO\b)\s*OUT(?:PUT)?\s*[:#]?\s*(?P<out>\d+)\b",
        ]
        .into_iter()
        .map(|p| Regex::new(p).expect("route pattern is valid"))
        .collect()
    })
}

/// Column header of the tabular `STATUS` dialect, e.g. `Output  FromIn  HDMIcon`.
fn table_header() -> &'static Regex {
    TABLE_HEADER.get_or_init(|| {
        Regex::new(r"(?i)^\s*OUT(?:PUT)?\s+(?:FROM\s*IN(?:PUT)?|IN(?:PUT)?|FROM|SOURCE)\b")
            .expect("table header pattern is valid")
    })
}

/// A row under the tabular header: leading output and input columns.
fn table_row() -> &'static Regex {
    TABLE_ROW.get_or_init(|| {
        Regex::new(r"(?i)^\s*(?P<out>\d{1,3})\s+(?P<inp>\d{1,3}|AUTO)\b")
            .expect("table row pattern is valid")
    })
}

fn error_marker() -> &'static Regex {
    ERROR_MARKER.get_or_init(|| {
        Regex::new(
            r"(?im)\[\s*ERR(?:OR)?\s*\]|^\s*ERR(?:OR)?\b|\b(?:UNKNOWN|INVALID|BAD)\s+(?:COMMAND|CMD|PARAMETERS?)\b|\bCOMMAND\s+(?:ERROR|FAILED)\b",
        )
        .expect("error marker pattern is valid")
    })
}

/// One parsed line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineRoute {
    Routed { output: u16, input: u16 },
    Auto { output: u16 },
}

fn parse_id(token: &str) -> Option<u16> {
    token
        .parse::<u16>()
        .ok()
        .filter(|id| (1..=MAX_PORT_ID).contains(id))
}

fn route_from_captures(caps: &regex::Captures<'_>) -> Option<LineRoute> {
    let output = parse_id(caps.name("out")?.as_str())?;
    let input = caps.name("inp")?.as_str();
    if input.eq_ignore_ascii_case("AUTO") {
        return Some(LineRoute::Auto { output });
    }
    parse_id(input).map(|input| LineRoute::Routed { output, input })
}

fn parse_line(line: &str, in_table: bool) -> Option<LineRoute> {
    // First pattern that matches wins, even if its numbers are unusable.
    if let Some(caps) = route_patterns().iter().find_map(|re| re.captures(line)) {
        return route_from_captures(&caps);
    }
    if in_table {
        return table_row()
            .captures(line)
            .and_then(|caps| route_from_captures(&caps));
    }
    None
}

/// Parse every route found in a device reply.
///
/// Never fails: unknown lines contribute nothing, `AUTO` inputs leave the
/// output out of the result, and when an output is reported twice the later
/// line wins.
pub fn parse_routes(text: &str) -> RouteMap {
    let mut routes = RouteMap::new();
    let mut in_table = false;

    for line in text.lines() {
        let line = line.trim_matches(|c: char| c.is_whitespace() || c.is_control());
        if line.is_empty() {
            continue;
        }
        if table_header().is_match(line) {
            in_table = true;
            continue;
        }
        match parse_line(line, in_table) {
            Some(LineRoute::Routed { output, input }) => {
                routes.insert(output, input);
            }
            Some(LineRoute::Auto { output }) => {
                routes.remove(&output);
            }
            None => {}
        }
    }

    routes
}

/// Input currently routed to `output`, if the reply mentions it.
pub fn parse_route_for(text: &str, output: u16) -> Option<u16> {
    parse_routes(text).get(&output).copied()
}

/// Whether the reply carries an explicit rejection marker such as `[ERROR]`.
pub fn parse_error(text: &str) -> bool {
    error_marker().is_match(text)
}

/// Whether the accumulated reply ends with a command prompt (`ACM200>`).
pub fn ends_with_prompt(text: &str) -> bool {
    let trimmed = text.trim_end_matches(|c: char| c.is_whitespace() || c == '\0');
    let last_line = trimmed.rsplit(['\r', '\n']).next().unwrap_or_default();
    last_line.ends_with('>')
        && !last_line.ends_with("->")
        && !last_line.ends_with("=>")
        && last_line.len() <= PROMPT_MAX_LEN
}
