//! Grouping, trend and comparison over records

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tracing::debug;

use crate::models::{MarketAverage, PricePoint, Record, TrendLabel, TrendSummary};

/// Market filter value that selects every market
pub const ALL_MARKETS: &str = "All Markets";

/// Minimum in-window records for a category to get a trend
const MIN_TREND_RECORDS: usize = 2;

/// Group records by category, preserving input order within each group
pub fn group_by_category(records: &[Record]) -> BTreeMap<String, Vec<Record>> {
    let mut groups: BTreeMap<String, Vec<Record>> = BTreeMap::new();
    for record in records {
        groups
            .entry(record.category.clone())
            .or_default()
            .push(record.clone());
    }
    groups
}

/// Trend per category over the trailing `window_days`
///
/// The window ends at the most recent timestamp across all records. A
/// category with fewer than two in-window records, or whose first in-window
/// value is zero, is left out of the result.
pub fn compare_across_categories(records: &[Record], window_days: i64) -> Vec<TrendSummary> {
    let in_window = trailing_window(records, window_days);

    let mut summaries = Vec::new();
    for (category, mut group) in group_by_category(&in_window) {
        if group.len() < MIN_TREND_RECORDS {
            debug!(
                category = %category,
                count = group.len(),
                "Excluding category with too few in-window records"
            );
            continue;
        }

        group.sort_by_key(|r| r.timestamp);
        let (first, last) = (&group[0], &group[group.len() - 1]);

        if first.value == 0.0 {
            debug!(category = %category, "Excluding category with zero base value");
            continue;
        }

        let change = (last.value - first.value) / first.value * 100.0;
        summaries.push(TrendSummary {
            category,
            current_value: last.value,
            percent_change: round2(change),
            trend_label: TrendLabel::from_change(change),
            last_updated: last.date(),
        });
    }
    summaries
}

/// Mean value per day and market, sorted by date then market
///
/// `market` of `None` or [`ALL_MARKETS`] keeps every market.
pub fn daily_prices(records: &[Record], market: Option<&str>) -> Vec<PricePoint> {
    let market = market.filter(|m| *m != ALL_MARKETS);

    let mut sums: BTreeMap<(NaiveDate, String), (f64, usize)> = BTreeMap::new();
    for record in records {
        if market.is_some_and(|m| m != record.category) {
            continue;
        }
        let entry = sums
            .entry((record.date(), record.category.clone()))
            .or_insert((0.0, 0));
        entry.0 += record.value;
        entry.1 += 1;
    }

    sums.into_iter()
        .map(|((date, market), (sum, count))| PricePoint {
            date,
            market,
            price: sum / count as f64,
        })
        .collect()
}

/// Mean value per market over the trailing `window_days`, sorted by market
pub fn market_averages(records: &[Record], window_days: i64) -> Vec<MarketAverage> {
    group_by_category(&trailing_window(records, window_days))
        .into_iter()
        .map(|(market, group)| {
            let sum: f64 = group.iter().map(|r| r.value).sum();
            MarketAverage {
                market,
                average_price: sum / group.len() as f64,
                samples: group.len(),
            }
        })
        .collect()
}

/// Records no older than `window_days` before the latest timestamp
fn trailing_window(records: &[Record], window_days: i64) -> Vec<Record> {
    let Some(latest) = records.iter().map(|r| r.timestamp).max() else {
        return Vec::new();
    };
    let start: DateTime<Utc> = latest - Duration::days(window_days);
    records
        .iter()
        .filter(|r| r.timestamp >= start)
        .cloned()
        .collect()
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn rec(category: &str, y: i32, m: u32, d: u32, value: f64) -> Record {
        Record::new(Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap(), category, value, "$ / BU")
    }

    #[test]
    fn groups_by_category() {
        let records = vec![
            rec("Iowa", 2024, 1, 15, 4.0),
            rec("Ohio", 2024, 1, 15, 4.2),
            rec("Iowa", 2024, 2, 15, 4.1),
        ];
        let groups = group_by_category(&records);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups["Iowa"].len(), 2);
        assert_eq!(groups["Ohio"].len(), 1);
    }

    #[test]
    fn excludes_categories_with_one_record_in_window() {
        let records = vec![
            rec("A", 2024, 3, 15, 5.0),
            rec("B", 2024, 1, 15, 4.0),
            rec("B", 2024, 2, 15, 4.2),
            rec("B", 2024, 3, 15, 4.4),
        ];
        let trends = compare_across_categories(&records, 180);
        assert_eq!(trends.len(), 1);
        assert_eq!(trends[0].category, "B");
        assert_eq!(trends[0].percent_change, 10.0);
        assert_eq!(trends[0].trend_label, TrendLabel::Rising);
        assert_eq!(trends[0].current_value, 4.4);
        assert_eq!(trends[0].last_updated, NaiveDate::from_ymd_opt(2024, 3, 15).unwrap());
    }

    #[test]
    fn window_is_anchored_at_latest_record() {
        let records = vec![
            rec("Iowa", 2022, 1, 15, 1.0),
            rec("Iowa", 2024, 2, 15, 4.0),
            rec("Iowa", 2024, 3, 15, 4.0),
        ];
        let trends = compare_across_categories(&records, 90);
        assert_eq!(trends.len(), 1);
        assert_eq!(trends[0].percent_change, 0.0);
        assert_eq!(trends[0].trend_label, TrendLabel::Stable);
    }

    #[test]
    fn sorts_by_timestamp_before_comparing() {
        let records = vec![
            rec("Iowa", 2024, 3, 15, 3.0),
            rec("Iowa", 2024, 1, 15, 4.0),
        ];
        let trends = compare_across_categories(&records, 180);
        assert_eq!(trends[0].percent_change, -25.0);
        assert_eq!(trends[0].trend_label, TrendLabel::Falling);
    }

    #[test]
    fn zero_base_value_is_excluded() {
        let records = vec![rec("Iowa", 2024, 1, 15, 0.0), rec("Iowa", 2024, 2, 15, 3.0)];
        assert!(compare_across_categories(&records, 180).is_empty());
    }

    #[test]
    fn empty_input_gives_empty_output() {
        assert!(compare_across_categories(&[], 180).is_empty());
        assert!(market_averages(&[], 90).is_empty());
        assert!(daily_prices(&[], None).is_empty());
    }

    #[rstest]
    #[case(2.5, TrendLabel::Rising)]
    #[case(2.0, TrendLabel::Stable)]
    #[case(0.0, TrendLabel::Stable)]
    #[case(-2.0, TrendLabel::Stable)]
    #[case(-2.01, TrendLabel::Falling)]
    fn labels_follow_stability_band(#[case] change: f64, #[case] expected: TrendLabel) {
        assert_eq!(TrendLabel::from_change(change), expected);
    }

    #[test]
    fn daily_prices_average_same_day_records() {
        let records = vec![
            rec("Iowa", 2024, 1, 15, 4.0),
            rec("Iowa", 2024, 1, 15, 5.0),
            rec("Ohio", 2024, 1, 15, 3.0),
            rec("Iowa", 2024, 2, 15, 6.0),
        ];

        let all = daily_prices(&records, Some(ALL_MARKETS));
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].market, "Iowa");
        assert_eq!(all[0].price, 4.5);
        assert_eq!(all[1].market, "Ohio");

        let iowa = daily_prices(&records, Some("Iowa"));
        assert_eq!(iowa.len(), 2);
        assert!(iowa.iter().all(|p| p.market == "Iowa"));
    }

    #[test]
    fn market_averages_respect_window() {
        let records = vec![
            rec("Iowa", 2023, 1, 15, 100.0),
            rec("Iowa", 2024, 2, 15, 4.0),
            rec("Iowa", 2024, 3, 15, 6.0),
            rec("Ohio", 2024, 3, 15, 3.0),
        ];
        let averages = market_averages(&records, 90);
        assert_eq!(
            averages,
            vec![
                MarketAverage {
                    market: "Iowa".into(),
                    average_price: 5.0,
                    samples: 2
                },
                MarketAverage {
                    market: "Ohio".into(),
                    average_price: 3.0,
                    samples: 1
                },
            ]
        );
    }
}
