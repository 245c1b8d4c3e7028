//! Filter metadata records produced by `list` and `info` responses.

use std::collections::BTreeMap;

use crate::error::BloomError;

/// Metadata describing one filter on the server.
///
/// `list` responses populate the first five fields; `info` responses
/// additionally carry the operation counters. Keys the schema does not know
/// are kept verbatim in [`extra`](Self::extra).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FilterInfo {
    /// Filter name.
    pub name: String,
    /// Target false-positive probability.
    pub probability: f64,
    /// Storage consumed, in bytes.
    pub storage: u64,
    /// Configured capacity.
    pub capacity: u64,
    /// Number of items stored.
    pub size: u64,
    /// Total check operations.
    pub checks: u64,
    /// Check operations that found the key.
    pub check_hits: u64,
    /// Check operations that missed.
    pub check_misses: u64,
    /// Total set operations.
    pub sets: u64,
    /// Set operations that inserted a new key.
    pub set_hits: u64,
    /// Set operations on an already-present key.
    pub set_misses: u64,
    /// Pages faulted in from cold storage.
    pub page_ins: u64,
    /// Pages evicted to cold storage.
    pub page_outs: u64,
    /// Info keys outside the schema, verbatim.
    pub extra: BTreeMap<String, String>,
}

fn field<T: std::str::FromStr>(token: Option<&str>, line: &str) -> Result<T, BloomError> {
    token
        .and_then(|t| t.parse().ok())
        .ok_or_else(|| BloomError::Decode(line.to_string()))
}

impl FilterInfo {
    /// Parse one `list` row: `name probability storage capacity size`.
    pub(crate) fn from_list_row(line: &str) -> Result<Self, BloomError> {
        let mut parts = line.split_whitespace();
        let name = parts
            .next()
            .ok_or_else(|| BloomError::Decode(line.to_string()))?
            .to_string();
        let info = Self {
            name,
            probability: field(parts.next(), line)?,
            storage: field(parts.next(), line)?,
            capacity: field(parts.next(), line)?,
            size: field(parts.next(), line)?,
            ..Self::default()
        };
        if parts.next().is_some() {
            return Err(BloomError::Decode(line.to_string()));
        }
        Ok(info)
    }

    /// Build a record from `info` block lines of the form
    /// `snake_case_key value`. The filter name comes from the request; the
    /// block itself does not repeat it.
    pub(crate) fn from_info_block(name: &str, lines: &[String]) -> Result<Self, BloomError> {
        let mut info = Self {
            name: name.to_string(),
            ..Self::default()
        };
        for line in lines {
            let (key, value) = line
                .split_once(' ')
                .ok_or_else(|| BloomError::Decode(line.clone()))?;
            match key {
                "probability" => info.probability = field(Some(value), line)?,
                "storage" => info.storage = field(Some(value), line)?,
                "capacity" => info.capacity = field(Some(value), line)?,
                "size" => info.size = field(Some(value), line)?,
                "checks" => info.checks = field(Some(value), line)?,
                "check_hits" => info.check_hits = field(Some(value), line)?,
                "check_misses" => info.check_misses = field(Some(value), line)?,
                "sets" => info.sets = field(Some(value), line)?,
                "set_hits" => info.set_hits = field(Some(value), line)?,
                "set_misses" => info.set_misses = field(Some(value), line)?,
                "page_ins" => info.page_ins = field(Some(value), line)?,
                "page_outs" => info.page_outs = field(Some(value), line)?,
                _ => {
                    info.extra.insert(key.to_string(), value.to_string());
                }
            }
        }
        Ok(info)
    }
}
