pub mod backend;
pub mod model;
pub mod preprocess;
#[cfg(feature = "torch")]
pub mod torch_backend;
#[cfg(feature = "tract")]
pub mod tract_backend;

pub use model::{InferenceError, Model, Prediction};
