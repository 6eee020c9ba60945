//! Centralized environment variable names and default values for Glossa runtime tuning.

// Environment variable names
pub const ENV_WORKERS: &str = "GLOSSA_WORKERS";
pub const ENV_NUM_REDUCERS: &str = "GLOSSA_NUM_REDUCERS";
pub const ENV_SPLIT_BYTES: &str = "GLOSSA_SPLIT_BYTES";
pub const ENV_MAX_ATTEMPTS: &str = "GLOSSA_MAX_ATTEMPTS";
pub const ENV_LOCAL_BATCH_BYTES: &str = "GLOSSA_LOCAL_BATCH_BYTES";
pub const ENV_WRITER_QUEUE_CAP: &str = "GLOSSA_WRITER_QUEUE_CAP";
pub const ENV_WORK_DIR: &str = "GLOSSA_WORK_DIR";
pub const ENV_KEEP_INTERMEDIATES: &str = "GLOSSA_KEEP_INTERMEDIATES";

// Defaults
pub const DEFAULT_SPLIT_BYTES: u64 = 64 * 1024 * 1024; // 64 MiB per partition
pub const DEFAULT_MAX_ATTEMPTS: usize = 3;
pub const DEFAULT_LOCAL_BATCH_BYTES: usize = 4 * 1024 * 1024; // 4 MiB per reducer buffer
pub const DEFAULT_WRITER_QUEUE_CAP: usize = 1024;
/// Same cap as the standard analyzer: longer runs are cut into chunks.
pub const DEFAULT_MAX_TOKEN_LEN: usize = 255;
pub const DEFAULT_WORK_DIR: &str = ".glossa_runs";

/// Completion marker written once every fragment is in place.
pub const SUCCESS_MARKER: &str = "_SUCCESS";
/// Staging directory for fragments that are still being written.
pub const TEMPORARY_DIR: &str = "_temporary";
pub const FRAGMENT_PREFIX: &str = "part-";
