//! Execution context: the worker pool and scratch space a job runs in.

use crate::config::RuntimeOptions;
use crate::error::{GlossaError, Result};
use crate::io::ensure_dir;
use crate::utils::local_job_id;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub struct ExecutionContext {
    job_id: String,
    options: RuntimeOptions,
    pool: rayon::ThreadPool,
    scratch: PathBuf,
    /// Set when `start` had to create the work root.
    owns_work_root: bool,
}

impl ExecutionContext {
    pub fn start(options: RuntimeOptions) -> Result<Self> {
        options.validate()?;
        let job_id = local_job_id();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.workers)
            .thread_name(|i| format!("glossa-worker-{}", i))
            .build()
            .map_err(|e| GlossaError::Config(format!("cannot build worker pool: {e}")))?;
        let owns_work_root = !options.work_root.exists();
        let scratch = options.work_root.join(&job_id);
        ensure_dir(&scratch)?;
        info!(
            job_id = %job_id,
            workers = options.workers,
            reducers = options.num_reducers,
            split_bytes = options.split_bytes,
            max_attempts = options.max_attempts,
            fd_soft_limit = get_fd_soft_limit().unwrap_or(0),
            scratch = %scratch.display(),
            "Glossa context started"
        );
        Ok(Self { job_id, options, pool, scratch, owns_work_root })
    }

    pub fn job_id(&self) -> &str { &self.job_id }

    pub fn options(&self) -> &RuntimeOptions { &self.options }

    pub fn scratch(&self) -> &Path { &self.scratch }

    /// Runs `op` inside the worker pool, so `par_iter` calls use its threads.
    pub fn install<OP, R>(&self, op: OP) -> R
    where
        OP: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(op)
    }

    /// Shuts the pool down and drops scratch data unless intermediates are kept.
    pub fn stop(self) {
        if self.options.keep_intermediates {
            info!(scratch = %self.scratch.display(), "keeping intermediates");
        } else if let Err(e) = fs::remove_dir_all(&self.scratch) {
            warn!(scratch = %self.scratch.display(), error = %e, "failed to remove scratch directory");
        }
        // a pre-existing work root belongs to the caller; ours goes only once empty
        if self.owns_work_root {
            let _ = fs::remove_dir(&self.options.work_root);
        }
        info!(job_id = %self.job_id, "Glossa context stopped");
    }
}

#[cfg(target_os = "linux")]
fn get_fd_soft_limit() -> Option<u64> {
    use libc::{getrlimit, rlimit, RLIMIT_NOFILE};
    let mut lim = rlimit { rlim_cur: 0, rlim_max: 0 };
    let rc = unsafe { getrlimit(RLIMIT_NOFILE, &mut lim as *mut rlimit) };
    if rc == 0 { Some(lim.rlim_cur as u64) } else { None }
}

#[cfg(not(target_os = "linux"))]
fn get_fd_soft_limit() -> Option<u64> { None }
