//! Token redistribution between the map and reduce stages.
//!
//! Map tasks route every token to reducer `hash(token) % reducers` and hand
//! full batches to a [`WriterPool`]: one dedicated IO thread per reducer that
//! appends to that reducer's spill file. Channels are bounded for backpressure.

use crate::error::{GlossaError, Result};
use crate::io::{encode_record, ensure_dir, hash_to_partition, open_writer, write_all};
use crossbeam_channel as channel;
use std::collections::HashSet;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Instant;
use tracing::debug;

enum WriterMsg {
    Data(Vec<u8>),
    Close,
}

#[derive(Clone, Debug, Default)]
pub struct SpillFileStats {
    pub reducer: usize,
    pub chunks: u64,
    pub bytes_written: u64,
    pub write_calls: u64,
    pub write_ms: u64,
}

pub struct WriterPool {
    senders: Vec<channel::Sender<WriterMsg>>,
    paths: Vec<PathBuf>,
}

pub struct WriterJoiner {
    handles: Vec<thread::JoinHandle<Result<SpillFileStats>>>,
}

impl WriterJoiner {
    /// Waits for every IO thread; the first storage error wins.
    pub fn join_all(&mut self) -> Result<Vec<SpillFileStats>> {
        let mut stats = Vec::with_capacity(self.handles.len());
        let mut first_err = None;
        for h in self.handles.drain(..) {
            match h.join() {
                Ok(Ok(s)) => stats.push(s),
                Ok(Err(e)) => { first_err.get_or_insert(e); }
                Err(_) => {
                    first_err.get_or_insert(GlossaError::storage(
                        "spill",
                        PathBuf::new(),
                        std::io::Error::new(ErrorKind::Other, "spill writer thread panicked"),
                    ));
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(stats),
        }
    }
}

pub fn spill_path(dir: &Path, reducer: usize) -> PathBuf {
    dir.join(format!("part{}.bin", reducer))
}

impl WriterPool {
    pub fn new(dir: &Path, num_reducers: usize, flush_bytes: usize, queue_cap: usize) -> Result<(Self, WriterJoiner)> {
        ensure_dir(dir)?;
        let mut senders = Vec::with_capacity(num_reducers);
        let mut handles = Vec::with_capacity(num_reducers);
        let mut paths = Vec::with_capacity(num_reducers);
        for reducer in 0..num_reducers {
            let (tx, rx) = channel::bounded::<WriterMsg>(queue_cap);
            let path = spill_path(dir, reducer);
            // open up front so a bad scratch dir fails before any map work
            let mut writer = open_writer(&path)?;
            let thread_path = path.clone();
            let handle = thread::Builder::new()
                .name(format!("glossa-spill-{}", reducer))
                .spawn(move || -> Result<SpillFileStats> {
                    let mut stats = SpillFileStats { reducer, ..Default::default() };
                    let mut buf: Vec<u8> = Vec::with_capacity(flush_bytes);
                    let mut write_out = |buf: &mut Vec<u8>, stats: &mut SpillFileStats| -> Result<()> {
                        if buf.is_empty() { return Ok(()); }
                        let w_start = Instant::now();
                        write_all(&mut writer, &thread_path, buf)?;
                        stats.bytes_written += buf.len() as u64;
                        stats.write_calls += 1;
                        stats.write_ms += w_start.elapsed().as_millis() as u64;
                        buf.clear();
                        Ok(())
                    };
                    // a dropped sender counts as close
                    while let Ok(WriterMsg::Data(bytes)) = rx.recv() {
                        stats.chunks += 1;
                        buf.extend_from_slice(&bytes);
                        if buf.len() >= flush_bytes {
                            write_out(&mut buf, &mut stats)?;
                        }
                    }
                    write_out(&mut buf, &mut stats)?;
                    writer.flush().map_err(|e| GlossaError::storage("flush", &thread_path, e))?;
                    debug!(reducer, bytes = stats.bytes_written, chunks = stats.chunks, "spill writer closed");
                    Ok(stats)
                })
                .map_err(|e| GlossaError::storage("spawn spill writer", &path, e))?;
            senders.push(tx);
            handles.push(handle);
            paths.push(path);
        }
        Ok((Self { senders, paths }, WriterJoiner { handles }))
    }

    pub fn num_reducers(&self) -> usize { self.senders.len() }

    pub fn spill_paths(&self) -> &[PathBuf] { &self.paths }

    /// The pool takes ownership of the chunk; ordering between chunks is not kept.
    pub fn write_chunk(&self, reducer: usize, bytes: Vec<u8>) -> Result<()> {
        self.senders[reducer].send(WriterMsg::Data(bytes)).map_err(|_| {
            GlossaError::storage(
                "spill",
                &self.paths[reducer],
                std::io::Error::new(ErrorKind::BrokenPipe, "spill writer is no longer running"),
            )
        })
    }

    pub fn close_all(&self) {
        for tx in &self.senders {
            let _ = tx.send(WriterMsg::Close);
        }
    }

    pub fn spill_writer(&self, batch_bytes: usize) -> SpillWriter<'_> {
        SpillWriter::new(self, batch_bytes)
    }
}

/// Counters for one map attempt.
#[derive(Clone, Debug, Default)]
pub struct SpillCounters {
    /// Tokens handed to the writer.
    pub emitted: u64,
    /// Tokens dropped because the same token was already in the reducer's buffer.
    pub combined: u64,
    pub flushes: u64,
    pub bytes_sent: u64,
}

/// Per-task buffering in front of the pool, with a combiner that drops tokens
/// already waiting in the same reducer buffer.
pub struct SpillWriter<'a> {
    pool: &'a WriterPool,
    buffers: Vec<Vec<u8>>,
    pending: Vec<HashSet<Box<[u8]>>>,
    batch_bytes: usize,
    counters: SpillCounters,
}

impl<'a> SpillWriter<'a> {
    fn new(pool: &'a WriterPool, batch_bytes: usize) -> Self {
        let n = pool.num_reducers();
        Self {
            pool,
            buffers: (0..n).map(|_| Vec::new()).collect(),
            pending: (0..n).map(|_| HashSet::new()).collect(),
            batch_bytes,
            counters: SpillCounters::default(),
        }
    }

    pub fn emit(&mut self, token: &str) -> Result<()> {
        self.counters.emitted += 1;
        let key = token.as_bytes();
        let reducer = hash_to_partition(key, self.buffers.len());
        if self.pending[reducer].contains(key) {
            self.counters.combined += 1;
            return Ok(());
        }
        self.pending[reducer].insert(Box::from(key));
        encode_record(&mut self.buffers[reducer], key);
        if self.buffers[reducer].len() >= self.batch_bytes {
            self.flush_reducer(reducer)?;
        }
        Ok(())
    }

    pub fn finish(mut self) -> Result<SpillCounters> {
        for reducer in 0..self.buffers.len() {
            self.flush_reducer(reducer)?;
        }
        Ok(self.counters)
    }

    fn flush_reducer(&mut self, reducer: usize) -> Result<()> {
        if self.buffers[reducer].is_empty() { return Ok(()); }
        let chunk = std::mem::take(&mut self.buffers[reducer]);
        self.pending[reducer].clear();
        self.counters.bytes_sent += chunk.len() as u64;
        self.counters.flushes += 1;
        self.pool.write_chunk(reducer, chunk)
    }
}
