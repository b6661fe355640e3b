//! Type definitions for the fraud detection service

pub mod prediction;
pub mod transaction;

pub use prediction::{Label, Prediction};
pub use transaction::{feature_index, TransactionRecord, FEATURE_COUNT, FEATURE_NAMES};
