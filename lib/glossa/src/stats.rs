use serde::Serialize;

/// Counters for one successful map attempt.
#[derive(Clone, Debug, Default)]
pub struct MapTaskStats {
    pub partition: usize,
    pub attempts: usize,
    pub bytes_in: u64,
    pub lines: u64,
    pub tokens: u64,
    pub tokens_combined: u64,
    pub tokenize_failures: u64,
    pub flushes: u64,
    pub bytes_out: u64,
    pub wall_ms: u64,
}

/// Counters for one successful reduce attempt.
#[derive(Clone, Debug, Default)]
pub struct ReduceTaskStats {
    pub reducer: usize,
    pub attempts: usize,
    pub records_in: u64,
    pub distinct: u64,
    pub bytes_out: u64,
    pub sort_ms: u64,
    pub wall_ms: u64,
}

#[derive(Default, Clone, Debug, Serialize)]
pub struct MapStats {
    pub tasks: usize,
    pub input_bytes: u64,
    pub lines: u64,
    pub tokens_emitted: u64,
    pub tokens_combined: u64,
    pub tokenize_failures: u64,
    pub retries: u64,
    pub spill_bytes: u64,
    pub min_task_ms: u64,
    pub max_task_ms: u64,
    pub wall_ms: u64,
}

#[derive(Default, Clone, Debug, Serialize)]
pub struct ReduceStats {
    pub reducers: usize,
    pub records_in: u64,
    pub distinct_tokens: u64,
    pub output_bytes: u64,
    pub retries: u64,
    pub min_reducer_ms: u64,
    pub max_reducer_ms: u64,
    pub wall_ms: u64,
}

/// What a finished run reports back to its caller.
#[derive(Default, Clone, Debug, Serialize)]
pub struct JobReport {
    pub job_id: String,
    pub input: String,
    pub output: String,
    pub input_files: usize,
    pub partitions: usize,
    pub cleared_previous_output: bool,
    pub map: MapStats,
    pub reduce: ReduceStats,
    pub wall_ms: u64,
}

impl JobReport {
    pub fn distinct_tokens(&self) -> u64 { self.reduce.distinct_tokens }

    pub fn partition_retries(&self) -> u64 { self.map.retries + self.reduce.retries }
}

impl MapStats {
    pub fn from_tasks(tasks: &[MapTaskStats], wall_ms: u64) -> Self {
        Self {
            tasks: tasks.len(),
            input_bytes: tasks.iter().map(|t| t.bytes_in).sum(),
            lines: tasks.iter().map(|t| t.lines).sum(),
            tokens_emitted: tasks.iter().map(|t| t.tokens).sum(),
            tokens_combined: tasks.iter().map(|t| t.tokens_combined).sum(),
            tokenize_failures: tasks.iter().map(|t| t.tokenize_failures).sum(),
            retries: tasks.iter().map(|t| t.attempts.saturating_sub(1) as u64).sum(),
            spill_bytes: tasks.iter().map(|t| t.bytes_out).sum(),
            min_task_ms: tasks.iter().map(|t| t.wall_ms).min().unwrap_or(0),
            max_task_ms: tasks.iter().map(|t| t.wall_ms).max().unwrap_or(0),
            wall_ms,
        }
    }
}

impl ReduceStats {
    pub fn from_tasks(tasks: &[ReduceTaskStats], wall_ms: u64) -> Self {
        Self {
            reducers: tasks.len(),
            records_in: tasks.iter().map(|t| t.records_in).sum(),
            distinct_tokens: tasks.iter().map(|t| t.distinct).sum(),
            output_bytes: tasks.iter().map(|t| t.bytes_out).sum(),
            retries: tasks.iter().map(|t| t.attempts.saturating_sub(1) as u64).sum(),
            min_reducer_ms: tasks.iter().map(|t| t.wall_ms).min().unwrap_or(0),
            max_reducer_ms: tasks.iter().map(|t| t.wall_ms).max().unwrap_or(0),
            wall_ms,
        }
    }
}
