//! Derived views over fetched records
//!
//! Everything here is a pure function of its input; results are recomputed
//! per request and never cached.

mod aggregator;
mod recommend;

pub use aggregator::{
    compare_across_categories, daily_prices, group_by_category, market_averages, ALL_MARKETS,
};
pub use recommend::recommend;

pub(crate) use aggregator::round2;
