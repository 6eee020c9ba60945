//! Word tokenization.
//!
//! Segmentation follows Unicode word boundaries (UAX #29): letters and digits
//! form tokens, with word-internal apostrophes and numeric separators kept
//! (`can't`, `32.3`); punctuation, symbols and whitespace are dropped. Tokens
//! keep their original case.

use crate::constants::DEFAULT_MAX_TOKEN_LEN;
use crate::error::TokenizeError;
use unicode_segmentation::{UnicodeSegmentation, UnicodeWords};

/// Splits one line of text into tokens, emitted left to right.
///
/// An `Err` means the whole line is discarded: callers must not keep tokens
/// emitted before the error.
pub trait Tokenizer: Send + Sync {
    fn tokenize<F>(&self, line: &str, emit: &mut F) -> Result<(), TokenizeError>
    where
        F: FnMut(&str);

    fn tokenize_bytes<F>(&self, raw: &[u8], emit: &mut F) -> Result<(), TokenizeError>
    where
        F: FnMut(&str),
    {
        let line = std::str::from_utf8(raw)?;
        self.tokenize(line, emit)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WordTokenizer {
    max_token_len: usize,
}

impl Default for WordTokenizer {
    fn default() -> Self { Self::new(DEFAULT_MAX_TOKEN_LEN) }
}

impl WordTokenizer {
    /// `max_token_len` is counted in chars; longer words are cut into chunks.
    pub fn new(max_token_len: usize) -> Self {
        Self { max_token_len: max_token_len.max(1) }
    }

    pub fn tokens<'a>(&self, line: &'a str) -> Tokens<'a> {
        Tokens { words: line.unicode_words(), pending: "", max_len: self.max_token_len }
    }
}

impl Tokenizer for WordTokenizer {
    fn tokenize<F>(&self, line: &str, emit: &mut F) -> Result<(), TokenizeError>
    where
        F: FnMut(&str),
    {
        for token in self.tokens(line) {
            emit(token);
        }
        Ok(())
    }
}

/// Lazy token stream over one line.
pub struct Tokens<'a> {
    words: UnicodeWords<'a>,
    pending: &'a str,
    max_len: usize,
}

impl<'a> Iterator for Tokens<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        if self.pending.is_empty() {
            self.pending = self.words.next()?;
        }
        let cut = self
            .pending
            .char_indices()
            .nth(self.max_len)
            .map(|(i, _)| i)
            .unwrap_or(self.pending.len());
        let (head, tail) = self.pending.split_at(cut);
        self.pending = tail;
        Some(head)
    }
}
