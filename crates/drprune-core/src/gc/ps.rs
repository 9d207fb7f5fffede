//! Parsing of `ps -o pid,comm,args` output.
use std::sync::LazyLock;

use drprune_model::{GcCommand, ProcessRecord};
use regex::Regex;
use thiserror::Error;

/// `<pid> <command> <args...>`
static PS_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+)\s+(\S+)\s*(.*?)\s*$").expect("valid ps line regex"));

const REGISTRY_COMMAND: &str = "registry";
const CONFIG_SUFFIX: &str = ".yml";

/// Remote command producing the listing parsed by [`parse`].
pub fn ps_argv() -> Vec<String> {
    ["ps", "-o", "pid,comm,args"]
        .into_iter()
        .map(String::from)
        .collect()
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PsParseError {
    #[error("invalid line {line}: {text:?}")]
    InvalidLine { line: usize, text: String },
    #[error("invalid pid on line {line}: {pid}")]
    InvalidPid { line: usize, pid: String },
}

/// Parse a process listing. The first line is a header and is skipped.
///
/// Every other line must match `<pid> <command> <args>`; the first non-conforming line
/// fails the whole parse.
pub fn parse(output: &str) -> Result<Vec<ProcessRecord>, PsParseError> {
    output
        .lines()
        .enumerate()
        .skip(1)
        .map(|(idx, text)| parse_line(idx + 1, text))
        .collect()
}

fn parse_line(line: usize, text: &str) -> Result<ProcessRecord, PsParseError> {
    let caps = PS_LINE
        .captures(text)
        .ok_or_else(|| PsParseError::InvalidLine {
            line,
            text: text.to_string(),
        })?;

    let pid = caps[1].parse().map_err(|_| PsParseError::InvalidPid {
        line,
        pid: caps[1].to_string(),
    })?;

    Ok(ProcessRecord {
        pid,
        command: caps[2].to_string(),
        args: caps[3].split_whitespace().map(String::from).collect(),
    })
}

/// Registry process and its config file.
///
/// Picks the first process whose command name contains `registry` and that has an
/// argument ending in `.yml`.
pub fn find_gc_command(records: &[ProcessRecord]) -> Option<GcCommand> {
    records.iter().find_map(|rec| {
        if !rec.command_basename().contains(REGISTRY_COMMAND) {
            return None;
        }
        rec.arg_with_suffix(CONFIG_SUFFIX)
            .map(|config| GcCommand::new(rec.command.clone(), config))
    })
}
