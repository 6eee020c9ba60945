use crate::error::{GlossaError, Result};
use crate::utils::is_hidden_name;
use std::collections::hash_map::DefaultHasher;
use std::fs::{self, File};
use std::hash::Hasher;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub fn ensure_dir(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    fs::create_dir_all(path).map_err(|e| GlossaError::storage("create_dir_all", path, e))
}

/// Data files under `path` (or `path` itself when it is a file), sorted so that
/// partition planning is reproducible across runs.
pub fn list_input_files(path: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let path = path.as_ref();
    let meta = fs::metadata(path).map_err(|e| GlossaError::storage("stat", path, e))?;
    if meta.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    let mut files = Vec::new();
    let walker = walkdir::WalkDir::new(path)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden_name(&e.file_name().to_string_lossy()));
    for entry in walker {
        let entry = entry.map_err(|e| {
            let at = e.path().unwrap_or(path).to_path_buf();
            GlossaError::storage("walk", at, e.into())
        })?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

/// Deterministic within one build: `DefaultHasher::new()` uses fixed keys. Map tasks
/// and reducers only need to agree within a single run.
pub fn hash_to_partition(key: &[u8], num_partitions: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    hasher.write(key);
    (hasher.finish() % num_partitions as u64) as usize
}

pub fn open_writer(path: impl AsRef<Path>) -> Result<BufWriter<File>> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    let file = File::create(path).map_err(|e| GlossaError::storage("create", path, e))?;
    Ok(BufWriter::new(file))
}

pub fn write_all(writer: &mut impl Write, path: &Path, bytes: &[u8]) -> Result<()> {
    writer.write_all(bytes).map_err(|e| GlossaError::storage("write", path, e))
}

// Spill record format: [len: u32 LE][token bytes]

pub const RECORD_HEADER: usize = 4;

pub fn encode_record(buf: &mut Vec<u8>, token: &[u8]) {
    buf.extend_from_slice(&(token.len() as u32).to_le_bytes());
    buf.extend_from_slice(token);
}

/// Returns the record body starting at `off` and the offset of the next record.
/// A truncated tail yields `None`.
pub fn read_record(bytes: &[u8], off: usize) -> Option<(&[u8], usize)> {
    let header = bytes.get(off..off + RECORD_HEADER)?;
    let len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize;
    let start = off + RECORD_HEADER;
    let body = bytes.get(start..start + len)?;
    Some((body, start + len))
}
