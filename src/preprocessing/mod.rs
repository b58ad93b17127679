//! Feature preprocessing
//!
//! Turns customer records into a numeric feature matrix:
//! - Standard scaling of numeric columns
//! - One-hot encoding of categorical columns, unknown categories ignored

mod encoder;
mod pipeline;
mod scaler;

pub use encoder::OneHotEncoder;
pub use pipeline::FeaturePreprocessor;
pub use scaler::StandardScaler;
