//! Line reader over one partition.
//!
//! A line belongs to the partition holding its first byte: a reader whose range
//! does not start at offset 0 skips forward past the first newline at or after
//! `start - 1`, and keeps reading whole lines while the line start is below `end`,
//! even when the line itself runs past `end`.

use crate::error::{GlossaError, Result};
use crate::partition::PartitionDescriptor;
use memchr::memchr;
use memmap2::Mmap;
use std::fs::File;

pub struct PartitionReader {
    map: Mmap,
    first: usize,
    end: usize,
}

impl PartitionReader {
    pub fn open(desc: &PartitionDescriptor) -> Result<Self> {
        let file = File::open(&desc.path).map_err(|e| GlossaError::storage("open", &desc.path, e))?;
        let map = unsafe { Mmap::map(&file) }.map_err(|e| GlossaError::storage("mmap", &desc.path, e))?;
        let len = map.len();
        let start = (desc.start as usize).min(len);
        let end = (desc.end as usize).min(len);
        let first = if start == 0 {
            0
        } else {
            match memchr(b'\n', &map[start - 1..]) {
                Some(i) => start + i,
                None => len,
            }
        };
        Ok(Self { map, first, end })
    }

    /// Raw line bytes without the terminator (`\n` or `\r\n`).
    pub fn lines(&self) -> Lines<'_> {
        Lines { bytes: &self.map[..], pos: self.first, end: self.end }
    }
}

pub struct Lines<'a> {
    bytes: &'a [u8],
    pos: usize,
    end: usize,
}

impl<'a> Iterator for Lines<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.end || self.pos >= self.bytes.len() {
            return None;
        }
        let rest = &self.bytes[self.pos..];
        let (mut line, advance) = match memchr(b'\n', rest) {
            Some(i) => (&rest[..i], i + 1),
            None => (rest, rest.len()),
        };
        if let [head @ .., b'\r'] = line {
            line = head;
        }
        self.pos += advance;
        Some(line)
    }
}
