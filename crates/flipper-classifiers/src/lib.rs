//! flipper-classifiers: bootstrap-validated classifiers for the Palmer penguins data.
//!
//! This crate provides the stages of a train/validate/test workflow: loading
//! and preprocessing penguin records, a stratified train/test split, bootstrap
//! resampling, two models (logistic regression backed by linfa, and a random
//! forest of CART trees), metric computation and an HTML report.
//!
//! Stages take their seeds and parameters explicitly so that repeated runs and
//! tests can vary them independently.
pub mod config;
pub mod data_handling;
pub mod error;
pub mod io;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod preprocessing;
pub mod report;
pub mod resample;
pub mod split;
pub mod validation;

pub use error::{FlipperError, Result};
