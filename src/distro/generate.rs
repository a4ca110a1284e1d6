//! Hash generation from package index records
//!
//! Both drivers reduce their package manager output to [`IndexRecord`]s and
//! hand them to [`write_latest`], which keeps one entry per
//! (package, architecture): the one with the highest version under the
//! driver's version ordering.

use crate::digest::Sha256Digest;
use crate::error::ReproResult;
use crate::manifest::HashWriter;
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::debug;

/// One candidate file from a package index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRecord {
    pub package: String,
    pub version: String,
    pub architecture: Option<String>,
    /// Manifest filename, relative to the provider root
    pub filename: String,
    pub sha256: Sha256Digest,
}

impl IndexRecord {
    fn key(&self) -> (String, Option<String>) {
        (self.package.clone(), self.architecture.clone())
    }
}

/// Version ordering of a package ecosystem
pub type VersionCmp = fn(&str, &str) -> Ordering;

/// Write the highest-version record for each (package, architecture),
/// sorted by filename. Returns the number of entries written.
pub fn write_latest(
    records: impl IntoIterator<Item = IndexRecord>,
    compare: VersionCmp,
    hw: &mut dyn HashWriter,
) -> ReproResult<usize> {
    let mut latest: HashMap<(String, Option<String>), IndexRecord> = HashMap::new();
    for record in records {
        let key = record.key();
        match latest.get(&key) {
            Some(seen) if compare(&seen.version, &record.version) == Ordering::Greater => {
                debug!(
                    "Skipping {} {} (already have {})",
                    record.package, record.version, seen.version
                );
            }
            _ => {
                latest.insert(key, record);
            }
        }
    }

    let mut selected: Vec<IndexRecord> = latest.into_values().collect();
    selected.sort_by(|a, b| a.filename.cmp(&b.filename));
    for record in &selected {
        hw.write_entry(&record.sha256, &record.filename)?;
    }
    Ok(selected.len())
}
