pub mod artifacts;
pub mod data_processing;
pub mod error;
pub mod inference;
pub mod metrics;
pub mod model;
pub mod training;
pub mod verdict;

mod progress;

pub use error::{Error, Result};
pub use inference::{Prediction, ToxicityClassifier};
pub use verdict::{verdict, VERDICT_PREFIX};
