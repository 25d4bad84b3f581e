//! Priority scoring for waiting orders.
//!
//! The score is a weighted sum of four components, each on a 0..100 scale:
//!
//! | component  | weight | raw value                                         |
//! |------------|--------|---------------------------------------------------|
//! | wait       | 0.40   | `minutes_waiting / 10 * 100`                      |
//! | complexity | 0.25   | `max(0, 120 - 20 * prep_minutes)`                 |
//! | urgency    | 0.25   | 100 past 8 minutes, else `minutes_waiting / 8 * 50` |
//! | loyalty    | 0.10   | 100 for loyal customers                           |
//!
//! Wait and urgency are collinear except for the step at 8 minutes; that
//! step is the only thing urgency adds and it is kept as is.
//!
//! Higher scores are served first. Scores are not clamped.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::{Drink, Order};

pub const WEIGHT_WAIT: f64 = 0.40;
pub const WEIGHT_COMPLEXITY: f64 = 0.25;
pub const WEIGHT_URGENCY: f64 = 0.25;
pub const WEIGHT_LOYALTY: f64 = 0.10;

/// Waiting longer than this triggers the urgency boost.
pub const URGENCY_BOOST_MINUTES: f64 = 8.0;

/// Raw component values and the weighted total.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub wait: f64,
    pub complexity: f64,
    pub urgency: f64,
    pub loyalty: f64,
    pub total: f64,
}

/// Compute every component of the priority score at `now`.
pub fn breakdown(order: &Order, drink: &Drink, now: DateTime<Utc>) -> ScoreBreakdown {
    let minutes_waiting = order.minutes_waiting(now);
    let prep = f64::from(drink.prep_time_minutes);

    let wait = (minutes_waiting / 10.0) * 100.0;
    let complexity = (120.0 - 20.0 * prep).max(0.0);
    let urgency = if minutes_waiting > URGENCY_BOOST_MINUTES {
        100.0
    } else {
        (minutes_waiting / URGENCY_BOOST_MINUTES) * 50.0
    };
    let loyalty = if order.loyal { 100.0 } else { 0.0 };

    ScoreBreakdown {
        wait,
        complexity,
        urgency,
        loyalty,
        total: WEIGHT_WAIT * wait
            + WEIGHT_COMPLEXITY * complexity
            + WEIGHT_URGENCY * urgency
            + WEIGHT_LOYALTY * loyalty,
    }
}

/// Priority score of `order` at `now`.
pub fn score(order: &Order, drink: &Drink, now: DateTime<Utc>) -> f64 {
    breakdown(order, drink, now).total
}

/// Congestion tier derived from the running average completion wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CongestionRegime {
    Normal,
    Moderate,
    Congested,
}

impl CongestionRegime {
    pub const MODERATE_AVG_WAIT: f64 = 5.0;
    pub const CONGESTED_AVG_WAIT: f64 = 7.5;

    pub fn from_avg_wait(avg_wait: f64) -> Self {
        if avg_wait >= Self::CONGESTED_AVG_WAIT {
            Self::Congested
        } else if avg_wait >= Self::MODERATE_AVG_WAIT {
            Self::Moderate
        } else {
            Self::Normal
        }
    }

    /// Score adjustment for a drink with `prep_minutes` under this regime.
    pub fn throughput_bonus(self, prep_minutes: u32) -> f64 {
        match self {
            Self::Congested => match prep_minutes {
                0..=2 => 20.0,
                4 => 5.0,
                _ => -15.0,
            },
            Self::Moderate => match prep_minutes {
                0..=2 => 10.0,
                3..=5 => 0.0,
                _ => -5.0,
            },
            Self::Normal => {
                if prep_minutes <= 1 {
                    5.0
                } else {
                    0.0
                }
            }
        }
    }
}

/// Priority score biased toward short drinks as the average wait degrades.
pub fn score_with_throughput(
    order: &Order,
    drink: &Drink,
    now: DateTime<Utc>,
    current_avg_wait: f64,
) -> f64 {
    let regime = CongestionRegime::from_avg_wait(current_avg_wait);
    score(order, drink, now) + regime.throughput_bonus(drink.prep_time_minutes)
}
