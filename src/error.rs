// Общий тип ошибок библиотеки. Бинарник оборачивает его в anyhow.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error on `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("dataset `{0}` contains no labeled comments")]
    EmptyDataset(PathBuf),

    #[error("{total} labeled comments leave the {split} split empty")]
    EmptySplit { split: &'static str, total: usize },

    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    #[error("huggingface hub error: {0}")]
    Hub(#[from] hf_hub::api::sync::ApiError),

    #[error("model record error: {0}")]
    Record(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
