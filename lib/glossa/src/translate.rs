//! Per-line translation extension point.
//!
//! Nothing here talks to a network. A [`Translator`] is supplied by the caller;
//! [`RateLimitedTranslator`] spaces out and retries its calls, and
//! [`TranslatingTokenizer`] puts it in front of a tokenizer. A translation
//! failure never fails the line: the untranslated text is tokenized instead.
//! The default job does not translate.

use crate::error::TokenizeError;
use crate::tokenizer::Tokenizer;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranslationModel {
    /// Standard edition.
    Base,
    /// Premium neural model.
    Nmt,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationRequest {
    pub source_language: String,
    pub target_language: String,
    pub model: TranslationModel,
}

impl Default for TranslationRequest {
    fn default() -> Self {
        Self { source_language: "sv".into(), target_language: "fr".into(), model: TranslationModel::Base }
    }
}

/// A remote, quota-bound text translation service.
pub trait Translator: Send + Sync {
    fn translate(&self, text: &str, request: &TranslationRequest) -> anyhow::Result<String>;
}

#[derive(Debug, Clone)]
pub struct RateLimit {
    /// Minimum spacing between two calls to the wrapped translator.
    pub min_interval: Duration,
    /// Extra attempts after the first failure.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Upper bound of the random delay added to each backoff.
    pub jitter: Duration,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_millis(100),
            max_retries: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(2000),
            jitter: Duration::from_millis(250),
        }
    }
}

pub struct RateLimitedTranslator<Tr> {
    inner: Tr,
    limit: RateLimit,
    next_slot: Mutex<Instant>,
}

impl<Tr: Translator> RateLimitedTranslator<Tr> {
    pub fn new(inner: Tr, limit: RateLimit) -> Self {
        Self { inner, limit, next_slot: Mutex::new(Instant::now()) }
    }

    fn wait_for_slot(&self) {
        let mut next = match self.next_slot.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        let now = Instant::now();
        if *next > now {
            thread::sleep(*next - now);
        }
        *next = Instant::now() + self.limit.min_interval;
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let exp = self.limit.base_delay.saturating_mul(2u32.saturating_pow(attempt));
        let capped = exp.min(self.limit.max_delay);
        let jitter_ms = self.limit.jitter.as_millis() as u64;
        let random = if jitter_ms == 0 { 0 } else { rand::thread_rng().gen_range(0..=jitter_ms) };
        capped + Duration::from_millis(random)
    }
}

impl<Tr: Translator> Translator for RateLimitedTranslator<Tr> {
    fn translate(&self, text: &str, request: &TranslationRequest) -> anyhow::Result<String> {
        let mut attempt = 0u32;
        loop {
            self.wait_for_slot();
            match self.inner.translate(text, request) {
                Ok(t) => return Ok(t),
                Err(e) if attempt < self.limit.max_retries => {
                    warn!(attempt, max_retries = self.limit.max_retries, error = %e, "translation failed, backing off");
                    thread::sleep(self.backoff(attempt));
                    attempt += 1;
                }
                Err(e) => return Err(e.context(format!("translation gave up after {} attempts", attempt + 1))),
            }
        }
    }
}

/// Translates each line before tokenizing it.
pub struct TranslatingTokenizer<Tr, T> {
    translator: Tr,
    request: TranslationRequest,
    tokenizer: T,
    fallbacks: AtomicU64,
}

impl<Tr: Translator, T: Tokenizer> TranslatingTokenizer<Tr, T> {
    pub fn new(translator: Tr, request: TranslationRequest, tokenizer: T) -> Self {
        Self { translator, request, tokenizer, fallbacks: AtomicU64::new(0) }
    }

    /// Lines that were tokenized untranslated because translation failed.
    pub fn fallbacks(&self) -> u64 {
        self.fallbacks.load(Ordering::Relaxed)
    }
}

impl<Tr: Translator, T: Tokenizer> Tokenizer for TranslatingTokenizer<Tr, T> {
    fn tokenize<F>(&self, line: &str, emit: &mut F) -> Result<(), TokenizeError>
    where
        F: FnMut(&str),
    {
        match self.translator.translate(line, &self.request) {
            Ok(translated) => self.tokenizer.tokenize(&translated, emit),
            Err(e) => {
                self.fallbacks.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "translation unavailable, tokenizing original line");
                self.tokenizer.tokenize(line, emit)
            }
        }
    }
}
