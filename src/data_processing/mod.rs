mod batcher;
mod dataset;
mod labels;
pub(crate) mod tokenizer;

pub use batcher::*;
pub use dataset::*;
pub use labels::*;
pub use tokenizer::{BertMultilingualTokenizer, EncodedText, Tokenizer};
