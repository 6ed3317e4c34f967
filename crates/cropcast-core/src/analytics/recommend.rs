//! Selling recommendations from market trends

use crate::error::{Error, Result};
use crate::models::{Advice, MarketInsight, MarketPick, Recommendations, TrendSummary};

/// Build recommendations for `crop` from per-market trends over `window_days`
///
/// Ties go to the market listed first.
pub fn recommend(crop: &str, trends: &[TrendSummary], window_days: i64) -> Result<Recommendations> {
    let best = first_max_by(trends, |t| t.current_value)
        .ok_or_else(|| Error::insufficient(format!("{crop} market trends"), 1, 0))?;
    let trending = first_max_by(trends, |t| t.percent_change)
        .ok_or_else(|| Error::insufficient(format!("{crop} market trends"), 1, 0))?;

    let best_price_market = MarketPick {
        market: best.category.clone(),
        price: best.current_value,
        price_change: best.percent_change,
        reason: format!("Currently offers the highest price for {crop}"),
    };
    let trending_market = MarketPick {
        market: trending.category.clone(),
        price: trending.current_value,
        price_change: trending.percent_change,
        reason: format!(
            "Prices trending {} over the last {window_days} days",
            trending.trend_label.as_str()
        ),
    };

    let market_insights = trends
        .iter()
        .map(|t| {
            let advice = Advice::for_trend(t);
            MarketInsight {
                market: t.category.clone(),
                current_price: t.current_value,
                trend: t.trend_label,
                change: t.percent_change,
                last_updated: t.last_updated,
                advice,
                recommendation: advice.text().to_string(),
            }
        })
        .collect();

    Ok(Recommendations {
        crop: crop.to_string(),
        best_price_market,
        trending_market,
        market_insights,
    })
}

fn first_max_by<F>(trends: &[TrendSummary], key: F) -> Option<&TrendSummary>
where
    F: Fn(&TrendSummary) -> f64,
{
    trends.iter().fold(None, |best, t| match best {
        Some(b) if key(t) <= key(b) => Some(b),
        _ => Some(t),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TrendLabel;
    use chrono::NaiveDate;

    fn trend(market: &str, price: f64, change: f64) -> TrendSummary {
        TrendSummary {
            category: market.to_string(),
            current_value: price,
            percent_change: change,
            trend_label: TrendLabel::from_change(change),
            last_updated: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
        }
    }

    #[test]
    fn picks_best_price_and_trending_markets() {
        let trends = vec![
            trend("Iowa", 4.8, 1.0),
            trend("Ohio", 5.2, -6.0),
            trend("Kansas", 4.5, 7.5),
        ];
        let rec = recommend("Corn", &trends, 180).unwrap();

        assert_eq!(rec.best_price_market.market, "Ohio");
        assert_eq!(rec.trending_market.market, "Kansas");
        assert_eq!(
            rec.trending_market.reason,
            "Prices trending rising over the last 180 days"
        );
        assert_eq!(rec.market_insights.len(), 3);
    }

    #[test]
    fn advice_follows_trend_strength() {
        let trends = vec![
            trend("A", 1.0, 7.0),
            trend("B", 1.0, 3.0),
            trend("C", 1.0, -7.0),
            trend("D", 1.0, -3.0),
            trend("E", 1.0, 0.5),
        ];
        let rec = recommend("Wheat", &trends, 180).unwrap();
        let advice: Vec<Advice> = rec.market_insights.iter().map(|i| i.advice).collect();
        assert_eq!(
            advice,
            vec![
                Advice::SellNow,
                Advice::Hold,
                Advice::SellQuickly,
                Advice::Standard,
                Advice::Standard
            ]
        );
        assert_eq!(rec.market_insights[0].recommendation, "Consider selling now");
    }

    #[test]
    fn ties_go_to_first_market() {
        let trends = vec![trend("Iowa", 5.0, 3.0), trend("Ohio", 5.0, 3.0)];
        let rec = recommend("Corn", &trends, 180).unwrap();
        assert_eq!(rec.best_price_market.market, "Iowa");
        assert_eq!(rec.trending_market.market, "Iowa");
    }

    #[test]
    fn no_trends_is_insufficient_data() {
        let err = recommend("Corn", &[], 180).unwrap_err();
        assert!(matches!(err, Error::InsufficientData { .. }));
    }
}
