// 6.0: funding. once per funding epoch the mark twap is compared with the index twap
// and the gap, scaled down to one interval, is added to the market's cumulative
// premium fraction. positions pay size * (cpf now - cpf at last settlement).

use crate::math::quo;
use chrono::Duration;
use rust_decimal::Decimal;

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Whole funding intervals in a day. None when the epoch is empty or longer than a day.
pub fn intervals_per_day(epoch_duration: Duration) -> Option<i64> {
    let ms = epoch_duration.num_milliseconds();
    if ms <= 0 {
        return None;
    }
    match MILLIS_PER_DAY / ms {
        0 => None,
        n => Some(n),
    }
}

// 6.1: (mark - index) / intervals per day
pub fn premium_fraction(mark_twap: Decimal, index_twap: Decimal, intervals_per_day: i64) -> Decimal {
    quo(mark_twap - index_twap, Decimal::from(intervals_per_day))
}

// reported only. premium relative to the index
pub fn funding_rate(premium_fraction: Decimal, index_twap: Decimal) -> Decimal {
    if index_twap.is_zero() {
        return Decimal::ZERO;
    }
    quo(premium_fraction, index_twap)
}
