//! # Optimizer Module
//!
//! - `image_optimizer`: per-file resize → compress → measure → log chain
//! - `orchestrator`: owns the configuration and wires watches to the optimizer

pub mod image_optimizer;
pub mod orchestrator;

pub use image_optimizer::{ImageOptimizer, Optimize};
pub use orchestrator::Orchestrator;
