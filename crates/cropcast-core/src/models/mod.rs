//! Data models for Cropcast

mod alert;
mod forecast;
mod market;
mod record;

pub use alert::*;
pub use forecast::*;
pub use market::*;
pub use record::*;
