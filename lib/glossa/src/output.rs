//! Output location layout and fragment commit.
//!
//! ```text
//! <output>/_temporary/part-00003.attempt1   while a reducer writes
//! <output>/part-00003                       after the attempt commits
//! <output>/_SUCCESS                         after every fragment committed
//! ```

use crate::constants::{FRAGMENT_PREFIX, SUCCESS_MARKER, TEMPORARY_DIR};
use crate::error::{GlossaError, Result};
use crate::io::{ensure_dir, open_writer, write_all};
use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub fn fragment_name(reducer: usize) -> String {
    format!("{}{:05}", FRAGMENT_PREFIX, reducer)
}

pub struct FragmentWriter {
    output: PathBuf,
    temp_dir: PathBuf,
}

impl FragmentWriter {
    /// Creates the output location and its staging directory.
    pub fn create(output: &Path) -> Result<Self> {
        let temp_dir = output.join(TEMPORARY_DIR);
        ensure_dir(&temp_dir)?;
        Ok(Self { output: output.to_path_buf(), temp_dir })
    }

    fn attempt_path(&self, reducer: usize, attempt: usize) -> PathBuf {
        self.temp_dir.join(format!("{}.attempt{}", fragment_name(reducer), attempt))
    }

    pub fn output(&self) -> &Path { &self.output }

    /// Writes one token per line to a staging file, then renames it into place.
    /// Returns the number of bytes written.
    pub fn write_fragment<'t, I>(&self, reducer: usize, attempt: usize, tokens: I) -> Result<u64>
    where
        I: IntoIterator<Item = &'t [u8]>,
    {
        let bytes = self.stage_fragment(reducer, attempt, tokens)?;
        self.commit_fragment(reducer, attempt)?;
        Ok(bytes)
    }

    /// Writes and syncs the staging file of one attempt without publishing it.
    pub fn stage_fragment<'t, I>(&self, reducer: usize, attempt: usize, tokens: I) -> Result<u64>
    where
        I: IntoIterator<Item = &'t [u8]>,
    {
        let tmp = self.attempt_path(reducer, attempt);
        let mut w = open_writer(&tmp)?;
        let mut bytes = 0u64;
        for token in tokens {
            write_all(&mut w, &tmp, token)?;
            write_all(&mut w, &tmp, b"\n")?;
            bytes += token.len() as u64 + 1;
        }
        w.flush().map_err(|e| GlossaError::storage("flush", &tmp, e))?;
        let file = w.into_inner().map_err(|e| GlossaError::storage("flush", &tmp, e.into_error()))?;
        file.sync_all().map_err(|e| GlossaError::storage("sync", &tmp, e))?;
        Ok(bytes)
    }

    /// Renames a staged attempt to its final `part-NNNNN` name.
    pub fn commit_fragment(&self, reducer: usize, attempt: usize) -> Result<()> {
        let tmp = self.attempt_path(reducer, attempt);
        let dest = self.output.join(fragment_name(reducer));
        fs::rename(&tmp, &dest).map_err(|e| GlossaError::storage("rename", &dest, e))
    }

    /// Drops the staging file of a failed attempt, if any.
    pub fn discard_attempt(&self, reducer: usize, attempt: usize) {
        let _ = fs::remove_file(self.attempt_path(reducer, attempt));
    }

    /// Removes the staging directory and writes the `_SUCCESS` marker.
    pub fn commit(self) -> Result<()> {
        fs::remove_dir_all(&self.temp_dir).map_err(|e| GlossaError::storage("remove_dir_all", &self.temp_dir, e))?;
        let marker = self.output.join(SUCCESS_MARKER);
        fs::write(&marker, b"").map_err(|e| GlossaError::storage("write", &marker, e))
    }
}

/// Committed fragment files of an output location, sorted by name.
pub fn list_fragments(location: &Path) -> Result<Vec<PathBuf>> {
    let base = location.to_string_lossy();
    let pattern = format!("{}/{}*", glob::Pattern::escape(&base), FRAGMENT_PREFIX);
    let paths = glob::glob(&pattern).map_err(|e| GlossaError::Config(format!("bad fragment pattern {pattern}: {e}")))?;
    let mut out = Vec::new();
    for entry in paths {
        let path = entry.map_err(|e| {
            let at = e.path().to_path_buf();
            GlossaError::storage("glob", at, e.into_error())
        })?;
        if path.is_file() {
            out.push(path);
        }
    }
    out.sort();
    Ok(out)
}

/// Every token line across all fragments, duplicates included.
pub fn read_tokens(location: &Path) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    for path in list_fragments(location)? {
        let text = fs::read_to_string(&path).map_err(|e| GlossaError::storage("read", &path, e))?;
        tokens.extend(text.lines().map(str::to_owned));
    }
    Ok(tokens)
}

/// The Vocabulary stored at `location`, as a set.
pub fn read_vocabulary(location: &Path) -> Result<HashSet<String>> {
    Ok(read_tokens(location)?.into_iter().collect())
}

/// True when a previous run finished writing `location`.
pub fn is_complete(location: &Path) -> bool {
    location.join(SUCCESS_MARKER).is_file()
}
