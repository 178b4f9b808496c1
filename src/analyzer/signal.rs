use crate::model::{HistoryStats, PriceCandidate, PriceSummary, Signal};

/// At or below 3% over the historical low is a good time to buy.
pub const GOOD_BUY_RATIO: f64 = 1.03;
/// At or above 15% over the historical low suggests waiting.
pub const WAIT_RATIO: f64 = 1.15;

pub fn signal_for(current: f64, lowest: f64) -> Signal {
    if current <= lowest * GOOD_BUY_RATIO {
        Signal::GoodTimeToBuy
    } else if current >= lowest * WAIT_RATIO {
        Signal::ConsiderWaiting
    } else {
        Signal::FairPrice
    }
}

/// Whole-percent distance from the lowest price, rounded half up.
pub fn percent_vs_lowest(current: Option<f64>, lowest: Option<f64>) -> Option<i64> {
    let (current, lowest) = (current?, lowest?);
    if lowest == 0.0 || !current.is_finite() || !lowest.is_finite() {
        return None;
    }
    let pct = (current - lowest) / lowest * 100.0;
    Some((pct + 0.5).floor() as i64)
}

/// Combines a live price with history stats in the same currency.
pub fn build_summary(current: PriceCandidate, stats: &HistoryStats) -> PriceSummary {
    PriceSummary {
        current: current.value,
        lowest: stats.lowest,
        highest: stats.highest,
        currency: stats.currency,
        point_count: stats.point_count,
        signal: signal_for(current.value, stats.lowest),
        percent_vs_lowest: percent_vs_lowest(Some(current.value), Some(stats.lowest)),
    }
}
