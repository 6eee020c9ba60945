//! Job configuration and runtime tuning.

use crate::constants::*;
use crate::error::{GlossaError, Result};
use crate::utils::{env_parse, env_var_truthy};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

/// The two locations a run is defined by. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobConfig {
    input: PathBuf,
    output: PathBuf,
}

impl JobConfig {
    /// Accepts plain paths or `file://` URIs.
    pub fn new(input: impl AsRef<str>, output: impl AsRef<str>) -> Result<Self> {
        let input = parse_location(input.as_ref())?;
        let output = parse_location(output.as_ref())?;
        let (abs_input, abs_output) = (absolute(&input), absolute(&output));
        if abs_input == abs_output {
            return Err(GlossaError::Config(format!(
                "input and output point at the same location: {}",
                input.display()
            )));
        }
        // the output is cleared before reading, which would take the input with it
        if abs_input.starts_with(&abs_output) {
            return Err(GlossaError::Config(format!(
                "input {} lies inside output location {}",
                input.display(),
                output.display()
            )));
        }
        Ok(Self { input, output })
    }

    pub fn input(&self) -> &Path { &self.input }

    pub fn output(&self) -> &Path { &self.output }
}

/// Lexically absolute form of `path`: joined onto the working directory and
/// with `.` and `..` components folded. Symlinks are not resolved.
fn absolute(path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().map(|cwd| cwd.join(path)).unwrap_or_else(|_| path.to_path_buf())
    };
    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

pub fn parse_location(location: &str) -> Result<PathBuf> {
    let location = location.trim();
    if location.is_empty() {
        return Err(GlossaError::Config("empty location".into()));
    }
    match location.split_once("://") {
        None => Ok(PathBuf::from(location)),
        Some(("file", rest)) if !rest.is_empty() => Ok(PathBuf::from(rest)),
        Some(("file", _)) => Err(GlossaError::Config(format!("empty file:// location: {location}"))),
        Some((scheme, _)) => Err(GlossaError::Config(format!(
            "unsupported storage scheme '{scheme}' in {location}"
        ))),
    }
}

/// Tuning knobs that never change what a run produces, only how it gets there.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeOptions {
    /// Worker threads in the execution pool.
    pub workers: usize,
    /// Number of hash partitions (and output fragments).
    pub num_reducers: usize,
    /// Target size of one input partition in bytes.
    pub split_bytes: u64,
    /// Attempts per partition or fragment before the job fails.
    pub max_attempts: usize,
    /// Per-reducer buffer a map task fills before handing a batch to the writer pool.
    pub local_batch_bytes: usize,
    pub writer_queue_cap: usize,
    /// Root for per-job scratch directories.
    pub work_root: PathBuf,
    pub keep_intermediates: bool,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        let cpus = num_cpus::get().max(1);
        Self {
            workers: cpus,
            num_reducers: cpus,
            split_bytes: DEFAULT_SPLIT_BYTES,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            local_batch_bytes: DEFAULT_LOCAL_BATCH_BYTES,
            writer_queue_cap: DEFAULT_WRITER_QUEUE_CAP,
            work_root: PathBuf::from(DEFAULT_WORK_DIR),
            keep_intermediates: false,
        }
    }
}

impl RuntimeOptions {
    /// Defaults overridden by any `GLOSSA_*` variables that are set and parse.
    pub fn from_env() -> Self {
        let d = Self::default();
        let workers = env_parse::<usize>(ENV_WORKERS).unwrap_or(d.workers);
        Self {
            workers,
            // reducers follow the worker count unless pinned explicitly
            num_reducers: env_parse::<usize>(ENV_NUM_REDUCERS).unwrap_or(workers),
            split_bytes: env_parse(ENV_SPLIT_BYTES).unwrap_or(d.split_bytes),
            max_attempts: env_parse(ENV_MAX_ATTEMPTS).unwrap_or(d.max_attempts),
            local_batch_bytes: env_parse(ENV_LOCAL_BATCH_BYTES).unwrap_or(d.local_batch_bytes),
            writer_queue_cap: env_parse(ENV_WRITER_QUEUE_CAP).unwrap_or(d.writer_queue_cap),
            work_root: std::env::var(ENV_WORK_DIR).map(PathBuf::from).unwrap_or(d.work_root),
            keep_intermediates: env_var_truthy(ENV_KEEP_INTERMEDIATES),
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_reducers(mut self, num_reducers: usize) -> Self {
        self.num_reducers = num_reducers;
        self
    }

    pub fn with_split_bytes(mut self, split_bytes: u64) -> Self {
        self.split_bytes = split_bytes;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_work_root(mut self, work_root: impl Into<PathBuf>) -> Self {
        self.work_root = work_root.into();
        self
    }

    pub fn with_keep_intermediates(mut self, keep: bool) -> Self {
        self.keep_intermediates = keep;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("workers", self.workers as u64),
            ("num_reducers", self.num_reducers as u64),
            ("split_bytes", self.split_bytes),
            ("max_attempts", self.max_attempts as u64),
            ("local_batch_bytes", self.local_batch_bytes as u64),
            ("writer_queue_cap", self.writer_queue_cap as u64),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(GlossaError::Config(format!("{name} must be greater than zero")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_paths_and_file_uris() {
        assert_eq!(parse_location("/data/in").unwrap(), PathBuf::from("/data/in"));
        assert_eq!(parse_location("file:///data/in").unwrap(), PathBuf::from("/data/in"));
        assert_eq!(parse_location("relative/dir").unwrap(), PathBuf::from("relative/dir"));
    }

    #[test]
    fn remote_schemes_are_rejected() {
        let err = parse_location("hdfs://namenode/user/root/wiki.txt").unwrap_err();
        assert!(err.to_string().contains("hdfs"));
        assert!(parse_location("").is_err());
        assert!(parse_location("file://").is_err());
    }

    #[test]
    fn input_must_differ_from_output() {
        assert!(JobConfig::new("/tmp/x", "file:///tmp/x").is_err());
        let cfg = JobConfig::new("/tmp/in", "/tmp/out").unwrap();
        assert_eq!(cfg.input(), Path::new("/tmp/in"));
        assert_eq!(cfg.output(), Path::new("/tmp/out"));
    }

    #[test]
    fn input_inside_output_is_rejected() {
        let err = JobConfig::new("/data/out/corpus.txt", "/data/out").unwrap_err();
        assert!(matches!(err, GlossaError::Config(_)));
        assert!(err.to_string().contains("inside output"));
        assert!(JobConfig::new("file:///data/out/nested/dir", "/data/out/").is_err());
        assert!(JobConfig::new("/data/out/../out/corpus.txt", "/data/./out").is_err());
        assert!(JobConfig::new("relative/out/a.txt", "relative/out").is_err());
    }

    #[test]
    fn sibling_with_shared_prefix_is_fine() {
        assert!(JobConfig::new("/data/output-old/corpus.txt", "/data/out").is_ok());
        // output nested in the input is allowed; only the output gets cleared
        assert!(JobConfig::new("/data/in", "/data/in/vocab").is_ok());
    }

    #[test]
    fn zero_options_fail_validation() {
        assert!(RuntimeOptions::default().validate().is_ok());
        assert!(RuntimeOptions::default().with_reducers(0).validate().is_err());
        assert!(RuntimeOptions::default().with_max_attempts(0).validate().is_err());
    }
}
