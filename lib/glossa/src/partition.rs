//! Stable byte-range partitions over the input files.
//!
//! A descriptor is a pure function of the file list, file sizes and the split
//! size, so the coordinator can re-derive and re-run any partition from the
//! original input without keeping intermediate state.

use crate::error::{GlossaError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionDescriptor {
    pub id: usize,
    pub path: PathBuf,
    /// Inclusive start offset in bytes.
    pub start: u64,
    /// Exclusive end offset in bytes.
    pub end: u64,
}

impl PartitionDescriptor {
    pub fn len(&self) -> u64 { self.end - self.start }

    pub fn is_empty(&self) -> bool { self.start == self.end }
}

/// Cuts every non-empty file into `split_bytes`-sized ranges. Ids are dense and
/// follow file order, then offset order.
pub fn plan_partitions(files: &[PathBuf], split_bytes: u64) -> Result<Vec<PartitionDescriptor>> {
    if split_bytes == 0 {
        return Err(GlossaError::Config("split_bytes must be greater than zero".into()));
    }
    let mut parts = Vec::new();
    for path in files {
        let len = fs::metadata(path)
            .map_err(|e| GlossaError::storage("stat", path, e))?
            .len();
        let mut start = 0u64;
        while start < len {
            let end = (start + split_bytes).min(len);
            parts.push(PartitionDescriptor { id: parts.len(), path: path.clone(), start, end });
            start = end;
        }
    }
    Ok(parts)
}
