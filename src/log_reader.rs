//! Reading the provenance log back: records are pretty-printed JSON objects
//! written one after another.

use anyhow::Context;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ProvRecord {
    #[serde(default)]
    pub sink: String,
    #[serde(default)]
    pub ts: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub pid: u32,
    #[serde(default)]
    pub dest: Option<String>,
    #[serde(default)]
    pub owners: Vec<String>,
    #[serde(default)]
    pub data: String,
}

/// A record plus the fields the CLI displays.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProvEvent {
    #[serde(flatten)]
    pub record: ProvRecord,
    pub channel: String,
    pub owners_str: String,
}

pub fn channel_label(sink: &str) -> &str {
    match sink {
        "stdout" => "Console (stdout)",
        "stderr" => "Console (stderr)",
        "file_write" => "File write",
        "socket_send" => "Network send",
        other => other,
    }
}

fn parse_block(block: &str, records: &mut Vec<ProvRecord>) {
    let block = block.trim();
    if block.is_empty() {
        return;
    }
    match serde_json::from_str::<ProvRecord>(block) {
        Ok(record) => records.push(record),
        Err(e) => log::warn!("Skipping malformed provenance record: {e}"),
    }
}

/// Split the log into records. A new record starts at a line beginning with
/// `{` once the buffered text ends with `}`; unparseable blocks are skipped.
pub fn parse_log_str(content: &str) -> Vec<ProvRecord> {
    let mut records = Vec::new();
    let mut block = String::new();

    for line in content.lines() {
        if line.trim_start().starts_with('{') && block.trim_end().ends_with('}') {
            parse_block(&block, &mut records);
            block.clear();
        }
        block.push_str(line);
        block.push('\n');
    }
    parse_block(&block, &mut records);
    records
}

/// Missing files read as an empty log.
pub fn parse_log_file(path: &Path) -> anyhow::Result<Vec<ProvRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read provenance log: {}", path.display()))?;
    Ok(parse_log_str(&content))
}

/// Attach display fields and order newest first.
pub fn enrich(records: Vec<ProvRecord>) -> Vec<ProvEvent> {
    let mut events: Vec<ProvEvent> = records
        .into_iter()
        .map(|record| ProvEvent {
            channel: channel_label(&record.sink).to_string(),
            owners_str: record.owners.join(", "),
            record,
        })
        .collect();
    events.sort_by(|a, b| b.record.ts.cmp(&a.record.ts));
    events
}

#[derive(Debug, Default, Clone)]
pub struct EventFilter {
    pub owner: Option<String>,
    pub data_pattern: Option<Regex>,
}

impl EventFilter {
    pub fn new(owner: Option<&str>, data_pattern: Option<&str>) -> anyhow::Result<Self> {
        let data_pattern = data_pattern
            .map(|p| Regex::new(p).with_context(|| format!("Invalid data pattern: {p}")))
            .transpose()?;
        Ok(Self {
            owner: owner.map(|o| o.trim().to_lowercase()).filter(|o| !o.is_empty()),
            data_pattern,
        })
    }

    pub fn matches(&self, event: &ProvEvent) -> bool {
        if let Some(owner) = &self.owner {
            if !event.record.owners.iter().any(|o| o.to_lowercase() == *owner) {
                return false;
            }
        }
        if let Some(pattern) = &self.data_pattern {
            if !pattern.is_match(&event.record.data) {
                return false;
            }
        }
        true
    }

    pub fn apply(&self, events: Vec<ProvEvent>) -> Vec<ProvEvent> {
        events.into_iter().filter(|e| self.matches(e)).collect()
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct OwnerSummary {
    pub total: usize,
    pub by_channel: BTreeMap<String, usize>,
    pub last_seen: String,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct LogSummary {
    pub total_events: usize,
    pub by_channel: BTreeMap<String, usize>,
    pub owners: BTreeMap<String, OwnerSummary>,
}

pub fn summarize(events: &[ProvEvent]) -> LogSummary {
    let mut summary = LogSummary {
        total_events: events.len(),
        ..Default::default()
    };
    for event in events {
        *summary.by_channel.entry(event.channel.clone()).or_insert(0) += 1;
        for owner in &event.record.owners {
            let entry = summary.owners.entry(owner.clone()).or_default();
            entry.total += 1;
            *entry.by_channel.entry(event.channel.clone()).or_insert(0) += 1;
            if event.record.ts > entry.last_seen {
                entry.last_seen = event.record.ts.clone();
            }
        }
    }
    summary
}
