use crate::config::JobConfig;
use crate::context::ExecutionContext;
use crate::error::{GlossaError, Result};
use crate::guard::clear_output;
use crate::io::{list_input_files, read_record};
use crate::output::FragmentWriter;
use crate::partition::{plan_partitions, PartitionDescriptor};
use crate::reader::PartitionReader;
use crate::shuffle::{spill_path, WriterPool};
use crate::stats::{JobReport, MapStats, MapTaskStats, ReduceStats, ReduceTaskStats};
use crate::tokenizer::{Tokenizer, WordTokenizer};
use memmap2::Mmap;
use rayon::prelude::*;
use std::any::Any;
use std::fs::File;
use std::io::ErrorKind;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Tokenize the corpus at `config.input()` and write its distinct tokens to
/// `config.output()`, replacing whatever was there.
pub struct VocabularyJob<T = WordTokenizer> {
    config: JobConfig,
    tokenizer: T,
}

impl VocabularyJob<WordTokenizer> {
    pub fn new(config: JobConfig) -> Self {
        Self { config, tokenizer: WordTokenizer::default() }
    }
}

impl<T: Tokenizer> VocabularyJob<T> {
    pub fn with_tokenizer(config: JobConfig, tokenizer: T) -> Self {
        Self { config, tokenizer }
    }

    pub fn config(&self) -> &JobConfig { &self.config }

    pub fn run(&self, ctx: &ExecutionContext) -> Result<JobReport> {
        let job_start = Instant::now();
        let opts = ctx.options();
        let input = self.config.input();
        let output = self.config.output();

        // Clean slate before anything is read.
        let cleared = clear_output(output)?;

        let files = list_input_files(input)?;
        let partitions = plan_partitions(&files, opts.split_bytes)?;
        let num_reducers = opts.num_reducers;
        info!(
            job_id = %ctx.job_id(), input = %input.display(), output = %output.display(),
            input_files = files.len(), partitions = partitions.len(), reducers = num_reducers,
            "Glossa starting map phase"
        );

        // Map: tokenize and redistribute by token hash.
        let spill_dir = ctx.scratch().join("map_out");
        let (pool, mut joiner) = WriterPool::new(&spill_dir, num_reducers, opts.local_batch_bytes, opts.writer_queue_cap)?;
        let map_phase_start = Instant::now();
        let map_result: Result<Vec<MapTaskStats>> = ctx.install(|| {
            partitions
                .par_iter()
                .map(|desc| {
                    with_retries("map", desc.id, opts.max_attempts, |_| {}, |attempt| {
                        map_partition(desc, attempt, &self.tokenizer, &pool, opts.local_batch_bytes)
                    })
                })
                .collect()
        });
        // Barrier: every partition has finished (or the stage failed) before spills close.
        pool.close_all();
        let spill_stats = joiner.join_all()?;
        let map_tasks = map_result?;
        let map = MapStats::from_tasks(&map_tasks, map_phase_start.elapsed().as_millis() as u64);
        info!(phase = "map",
              tasks = map.tasks, lines = map.lines, tokens = map.tokens_emitted,
              combined = map.tokens_combined, tokenize_failures = map.tokenize_failures,
              retries = map.retries, spill_bytes = spill_stats.iter().map(|s| s.bytes_written).sum::<u64>(),
              min_task_ms = map.min_task_ms, max_task_ms = map.max_task_ms,
              wall_ms = map.wall_ms,
              "Map phase complete");

        // Reduce: per-reducer sort + distinct, one fragment each.
        let writer = FragmentWriter::create(output)?;
        let reduce_phase_start = Instant::now();
        let reduce_tasks: Vec<ReduceTaskStats> = ctx.install(|| {
            (0..num_reducers)
                .into_par_iter()
                .map(|r| {
                    let spill = spill_path(&spill_dir, r);
                    with_retries("reduce", r, opts.max_attempts, |attempt| writer.discard_attempt(r, attempt), |attempt| {
                        reduce_partition(r, attempt, &spill, &writer)
                    })
                })
                .collect::<Result<Vec<_>>>()
        })?;
        writer.commit()?;
        let reduce = ReduceStats::from_tasks(&reduce_tasks, reduce_phase_start.elapsed().as_millis() as u64);
        info!(phase = "reduce",
              reducers = reduce.reducers, records_in = reduce.records_in,
              distinct = reduce.distinct_tokens, output_bytes = reduce.output_bytes,
              retries = reduce.retries,
              min_reducer_ms = reduce.min_reducer_ms, max_reducer_ms = reduce.max_reducer_ms,
              wall_ms = reduce.wall_ms,
              "Reduce phase complete");

        Ok(JobReport {
            job_id: ctx.job_id().to_string(),
            input: input.display().to_string(),
            output: output.display().to_string(),
            input_files: files.len(),
            partitions: partitions.len(),
            cleared_previous_output: cleared,
            map,
            reduce,
            wall_ms: job_start.elapsed().as_millis() as u64,
        })
    }
}

/// Runs `attempt_fn` until it succeeds. Panics count as a crashed worker and
/// are retried after `cleanup`; `Err` values are fatal and returned as is.
fn with_retries<R, C, F>(stage: &'static str, id: usize, max_attempts: usize, cleanup: C, attempt_fn: F) -> Result<R>
where
    C: Fn(usize),
    F: Fn(usize) -> Result<R>,
{
    let mut reason = String::new();
    for attempt in 1..=max_attempts {
        match catch_unwind(AssertUnwindSafe(|| attempt_fn(attempt))) {
            Ok(result) => return result,
            Err(payload) => {
                reason = panic_message(payload.as_ref());
                warn!(stage, id, attempt, max_attempts, reason = %reason, "task crashed, recomputing");
                cleanup(attempt);
            }
        }
    }
    Err(GlossaError::Partition { partition: id, attempts: max_attempts, reason })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn map_partition<T: Tokenizer>(
    desc: &PartitionDescriptor,
    attempt: usize,
    tokenizer: &T,
    pool: &WriterPool,
    batch_bytes: usize,
) -> Result<MapTaskStats> {
    let task_start = Instant::now();
    debug!(partition = desc.id, attempt, path = %desc.path.display(), start = desc.start, end = desc.end, "map task starting");
    let reader = PartitionReader::open(desc)?;
    let mut spill = pool.spill_writer(batch_bytes);
    let mut stats = MapTaskStats { partition: desc.id, attempts: attempt, bytes_in: desc.len(), ..Default::default() };

    // Tokens of the current line are staged so a failing line contributes nothing.
    let mut arena = String::new();
    let mut spans: Vec<(usize, usize)> = Vec::new();
    for (line_no, raw) in reader.lines().enumerate() {
        stats.lines += 1;
        arena.clear();
        spans.clear();
        let outcome = tokenizer.tokenize_bytes(raw, &mut |token: &str| {
            let start = arena.len();
            arena.push_str(token);
            spans.push((start, arena.len()));
        });
        if let Err(e) = outcome {
            stats.tokenize_failures += 1;
            warn!(partition = desc.id, line = line_no, error = %e, "skipping untokenizable line");
            continue;
        }
        for &(s, e) in &spans {
            spill.emit(&arena[s..e])?;
        }
    }
    let counters = spill.finish()?;
    stats.tokens = counters.emitted;
    stats.tokens_combined = counters.combined;
    stats.flushes = counters.flushes;
    stats.bytes_out = counters.bytes_sent;
    stats.wall_ms = task_start.elapsed().as_millis() as u64;
    Ok(stats)
}

fn reduce_partition(reducer: usize, attempt: usize, spill: &Path, writer: &FragmentWriter) -> Result<ReduceTaskStats> {
    let reducer_start = Instant::now();
    let file = File::open(spill).map_err(|e| GlossaError::storage("open", spill, e))?;
    let len = file.metadata().map_err(|e| GlossaError::storage("stat", spill, e))?.len();
    // empty spills are never mapped
    let map = if len == 0 {
        None
    } else {
        Some(unsafe { Mmap::map(&file) }.map_err(|e| GlossaError::storage("mmap", spill, e))?)
    };
    let bytes: &[u8] = map.as_deref().unwrap_or(&[]);

    let mut records: Vec<&[u8]> = Vec::new();
    let mut off = 0usize;
    while let Some((token, next)) = read_record(bytes, off) {
        records.push(token);
        off = next;
    }
    if off != bytes.len() {
        return Err(GlossaError::storage(
            "read spill",
            spill,
            std::io::Error::new(ErrorKind::InvalidData, format!("truncated record at byte {off}")),
        ));
    }
    let records_in = records.len() as u64;

    let sort_start = Instant::now();
    records.par_sort_unstable();
    records.dedup();
    let sort_ms = sort_start.elapsed().as_millis() as u64;

    let bytes_out = writer.stage_fragment(reducer, attempt, records.iter().copied())?;
    #[cfg(test)]
    faults::before_commit(writer.output(), reducer);
    writer.commit_fragment(reducer, attempt)?;
    Ok(ReduceTaskStats {
        reducer,
        attempts: attempt,
        records_in,
        distinct: records.len() as u64,
        bytes_out,
        sort_ms,
        wall_ms: reducer_start.elapsed().as_millis() as u64,
    })
}
