//! Weather alerting for Cropcast
//!
//! Provides threshold evaluation over weather readings and webhook delivery.

mod evaluator;
mod notifier;

pub use evaluator::{evaluate, ThresholdRule, Thresholds};
pub use notifier::{NotificationResult, NotificationSender};
