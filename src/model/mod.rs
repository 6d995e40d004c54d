pub(crate) mod bert;
mod classifier;
mod loss;
pub mod pretrained;

pub use bert::*;
pub use classifier::*;
pub use loss::binary_cross_entropy_with_logits;
