//! Predictive maintenance: classify machine sensor readings as SAFE or
//! FAILURE with pre-trained, file-backed models.

pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod features;
pub mod models;
pub mod pipeline;
pub mod predict;
pub mod preprocess;
pub mod report;
pub mod validate;
