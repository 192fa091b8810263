//! Explain Module - Local Surrogate Explanations
//!
//! Giải thích vì sao classifier cho ra xác suất này, chỉ dùng predict_proba.

pub mod engine;
pub mod regression;
pub mod sampler;
pub mod types;


pub use engine::ExplanationEngine;
pub use sampler::{DistributionModel, Neighborhood, ReferenceSample};
pub use types::{Direction, ExplainError, Explanation, ExplanationItem, LocalFit};
