pub mod config;
pub mod constants;
pub mod context;
pub mod error;
pub mod guard;
pub mod io;
pub mod output;
pub mod partition;
pub mod reader;
pub mod runtime;
pub mod shuffle;
pub mod stats;
pub mod tokenizer;
pub mod translate;
pub mod utils;

pub use config::{JobConfig, RuntimeOptions};
pub use context::ExecutionContext;
pub use error::{GlossaError, Result, TokenizeError};
pub use guard::clear_output;
pub use output::{read_tokens, read_vocabulary};
pub use runtime::VocabularyJob;
pub use stats::JobReport;
pub use tokenizer::{Tokenizer, WordTokenizer};
