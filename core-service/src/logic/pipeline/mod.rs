//! Pipeline Module - Score + Explain
//!
//! `PipelineContext` giữ artifacts đã load; `score()` chạy trọn pipeline và
//! chỉ trả lỗi khi classifier không dùng được.

pub mod context;
pub mod result;

#[cfg(test)]
mod tests;

pub use context::{PipelineContext, Prepared, ScoreError};
pub use result::{aggregate, Diagnostics, PredictionResult};
