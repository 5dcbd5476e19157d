//! Instrumentation footer format.
//!
//! Under external instrumentation the launcher measures the program and
//! prints a footer of sentinel lines after its combined output:
//!
//! ```text
//! <program output>
//! [I] Memory used: 2048
//! [I] Time used: 17 ms
//! ```
//!
//! [`split`] cuts the transcript at the first line containing the memory
//! marker. Everything before it (trimmed) is program output, everything after
//! it carries the usage figures. A transcript without the marker is all
//! output and its usage is unmeasured.
//!
//! Internal instrumentation never goes through this module: the supervisor's
//! own figures are used and program output is taken verbatim.

use crate::config::types::ResourceUsage;

/// Prefix shared by every instrumentation line
pub const SENTINEL_PREFIX: &str = "[I]";
pub const MEMORY_MARKER: &str = "[I] Memory used:";
pub const TIME_MARKER: &str = "[I] Time used:";

/// Transcript split into program output and measured usage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitTranscript {
    pub output: String,
    pub usage: Option<ResourceUsage>,
}

/// Split a transcript at the first memory sentinel
pub fn split(transcript: &str) -> SplitTranscript {
    let lines: Vec<&str> = transcript.lines().collect();
    let Some(marker) = lines.iter().position(|line| line.contains(MEMORY_MARKER)) else {
        return SplitTranscript {
            output: strip_sentinels(transcript),
            usage: None,
        };
    };

    let output = strip_sentinels(&lines[..marker].join("\n"));

    let memory = parse_number_after(lines[marker], MEMORY_MARKER);
    let time = lines[marker..]
        .iter()
        .find(|line| line.contains(TIME_MARKER))
        .and_then(|line| parse_number_after(line, TIME_MARKER));

    let usage = memory.map(|peak_memory_kb| ResourceUsage {
        peak_memory_kb,
        elapsed_ms: time.unwrap_or(0),
    });

    SplitTranscript { output, usage }
}

/// Remove every instrumentation line and trim the remainder
pub fn strip_sentinels(text: &str) -> String {
    text.lines()
        .filter(|line| !line.trim_start().starts_with(SENTINEL_PREFIX))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn parse_number_after(line: &str, marker: &str) -> Option<u64> {
    let (_, rest) = line.split_once(marker)?;
    rest.split_whitespace().next()?.parse().ok()
}
