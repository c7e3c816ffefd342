//! Heuristic classifier for automation output.
//!
//! The scraping bundles write human-readable log lines; this module turns
//! each captured chunk into structured updates on the shared
//! [`RunStatus`]. It is deliberately a best-effort classifier, not a
//! parser with a grammar: the rules are an explicit, ordered table so the
//! precedence is documented and testable, and malformed input never fails:
//! it degrades to a plain log-tail append.
//!
//! Rule order per line:
//! 1. fraction (`[a/b]`, `Processing a/b`, `Processando a/b`)
//! 2. discovered total (`Found N items`, `Total de processos a processar: N`)
//! 3. current item (`PROCESSING: <label>`, `PROCESSANDO: <label>`)
//! 4. phase message (fixed substring trigger table, first match wins)
//! 5. severity classification + log-tail append (always)

use regex::Regex;
use rk_protocol::{LogEntry, RunStatus};
use std::sync::OnceLock;

/// Markers that flag a line as an error entry. Everything else is
/// informational, even on stderr: the automation frameworks route ordinary
/// progress logs there.
const SEVERITY_MARKERS: &[&str] = &["ERROR", "Error:", "Exception", "Traceback"];

/// Separator characters trimmed from the end of a captured item label.
const LABEL_SEPARATORS: &[char] = &['.', ':', '-', ' ', '\t'];

/// One entry of the phase-message trigger table.
///
/// Triggers are lowercase substrings; the table keeps the Portuguese
/// phrases the bundles actually emit next to their English equivalents.
struct PhaseRule {
    triggers: &'static [&'static str],
    message: &'static str,
}

/// Ordered trigger table; the first rule whose trigger appears in the line
/// wins. More specific phrases come before their prefixes ("iniciando
/// navegador" before "iniciando").
const PHASE_RULES: &[PhaseRule] = &[
    PhaseRule {
        triggers: &["iniciando navegador", "starting browser"],
        message: "Starting browser",
    },
    PhaseRule {
        triggers: &["navegando", "navigating"],
        message: "Navigating to the court portal",
    },
    PhaseRule {
        triggers: &["pesquisa realizada", "search performed"],
        message: "Search performed",
    },
    PhaseRule {
        triggers: &["extraindo dados", "extracting data"],
        message: "Extracting case data",
    },
    PhaseRule {
        triggers: &["atualizado com sucesso", "updated successfully"],
        message: "Record updated",
    },
    PhaseRule {
        triggers: &["iniciando", "starting"],
        message: "Starting automation",
    },
];

fn fraction_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\[(\d+)\s*/\s*(\d+)\]|process(?:ing|ando)\s+(\d+)\s*/\s*(\d+)")
            .expect("fraction regex compiles")
    })
}

fn found_total_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\bfound\s+(\d+)\s+(?:item|process|case|record)s?\b|total de processos(?:\s+a\s+processar)?\s*:\s*(\d+)",
        )
        .expect("found-total regex compiles")
    })
}

fn current_item_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)process(?:ing|ando)\s*:\s*(.+)").expect("current-item regex compiles")
    })
}

/// Apply one chunk of raw child output to the status record.
///
/// The chunk may contain any number of newline-delimited lines; the
/// transport delivers whole lines and no recognized pattern spans one, so
/// each line runs through the rule table independently. Feeding the same
/// lines one chunk at a time or concatenated yields the same final status.
pub fn apply_chunk(status: &mut RunStatus, chunk: &str) {
    // A fraction match suppresses the weaker discovered-total rule for the
    // rest of this chunk.
    let mut fraction_seen = false;

    for line in chunk.lines() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        apply_line(status, line, &mut fraction_seen);
    }
}

/// Severity classification for a single line, without any structured
/// matching. Used directly for late output arriving after a run stopped.
pub fn entry_for(line: &str) -> LogEntry {
    if SEVERITY_MARKERS.iter().any(|marker| line.contains(marker)) {
        LogEntry::error(line)
    } else {
        LogEntry::info(line)
    }
}

fn apply_line(status: &mut RunStatus, line: &str, fraction_seen: &mut bool) {
    if let Some((done, total)) = last_fraction(line) {
        // processed never decreases within a run, even if the script
        // re-reports a lower number.
        status.processed = status.processed.max(done);
        status.total = total;
        *fraction_seen = true;
    }

    if !*fraction_seen {
        if let Some(total) = last_discovered_total(line) {
            status.total = total;
        }
    }

    if let Some(label) = current_item(line) {
        status.current = Some(label);
    }

    if let Some(message) = phase_message(line) {
        status.message = Some(message.to_string());
    }

    status.push_log(entry_for(line));
}

/// Last `[a/b]` / `Processing a/b` match in the line; last write wins.
fn last_fraction(line: &str) -> Option<(u32, u32)> {
    fraction_re()
        .captures_iter(line)
        .filter_map(|caps| {
            let done = caps.get(1).or_else(|| caps.get(3))?;
            let total = caps.get(2).or_else(|| caps.get(4))?;
            Some((done.as_str().parse().ok()?, total.as_str().parse().ok()?))
        })
        .last()
}

/// Last `Found N items` / `Total de processos a processar: N` match.
fn last_discovered_total(line: &str) -> Option<u32> {
    found_total_re()
        .captures_iter(line)
        .filter_map(|caps| {
            let n = caps.get(1).or_else(|| caps.get(2))?;
            n.as_str().parse().ok()
        })
        .last()
}

/// `PROCESSING: <label>` with surrounding whitespace and trailing
/// separators stripped. An empty label after trimming is ignored.
fn current_item(line: &str) -> Option<String> {
    let caps = current_item_re().captures(line)?;
    let label = caps.get(1)?.as_str().trim().trim_end_matches(LABEL_SEPARATORS);
    if label.is_empty() {
        None
    } else {
        Some(label.to_string())
    }
}

/// First phase rule (in table order) whose trigger appears in the line.
fn phase_message(line: &str) -> Option<&'static str> {
    let lowered = line.to_lowercase();
    PHASE_RULES
        .iter()
        .find(|rule| rule.triggers.iter().any(|t| lowered.contains(t)))
        .map(|rule| rule.message)
}
