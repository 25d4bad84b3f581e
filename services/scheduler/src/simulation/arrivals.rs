//! Morning-rush workload generator.
//!
//! Inter-arrival gaps are exponential with rate `lambda` per minute. If the
//! window closes before the quota is met, the remainder arrive uniformly at
//! random inside the window.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use tracing::debug;

use crate::model::{Drink, Order};
use crate::priority;

/// Half-open interval `[start, end)` in which orders arrive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrivalWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ArrivalWindow {
    pub fn new(start: DateTime<Utc>, minutes: i64) -> Self {
        Self {
            start,
            end: start + Duration::minutes(minutes.max(0)),
        }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }

    fn seconds(&self) -> i64 {
        (self.end - self.start).num_seconds()
    }
}

/// `quota` arrival times inside `window`, in ascending order.
pub fn arrival_times<R: Rng + ?Sized>(
    rng: &mut R,
    quota: usize,
    lambda: f64,
    window: &ArrivalWindow,
) -> Vec<DateTime<Utc>> {
    let mut times = Vec::with_capacity(quota);

    if lambda > 0.0 {
        let mut cursor = window.start;
        while times.len() < quota {
            let u: f64 = rng.random();
            let gap_minutes = -(1.0 - u).ln() / lambda;
            let Some(next) = Duration::try_seconds((gap_minutes * 60.0) as i64)
                .and_then(|gap| cursor.checked_add_signed(gap))
            else {
                break;
            };
            cursor = next;
            if !window.contains(cursor) {
                break;
            }
            times.push(cursor);
        }
    }

    let poisson = times.len();
    let span = window.seconds();
    while times.len() < quota {
        let offset = if span > 0 { rng.random_range(0..span) } else { 0 };
        times.push(window.start + Duration::seconds(offset));
    }
    if times.len() > poisson {
        debug!(poisson, top_up = times.len() - poisson, "Topped up arrivals uniformly");
    }

    times.sort();
    times
}

/// Pick a drink weighted by `demand_frequency`.
///
/// Falls back to the first drink when the weights sum to less than the draw.
pub fn sample_drink<'a, R: Rng + ?Sized>(rng: &mut R, menu: &'a [Drink]) -> Option<&'a Drink> {
    let draw: f64 = rng.random();
    let mut cumulative = 0.0;
    for drink in menu {
        cumulative += drink.demand_frequency;
        if draw < cumulative {
            return Some(drink);
        }
    }
    menu.first()
}

/// Generate `quota` WAITING orders named `Customer_1..=Customer_n` by arrival.
pub fn generate_orders<R: Rng + ?Sized>(
    rng: &mut R,
    menu: &[Drink],
    quota: usize,
    lambda: f64,
    loyal_rate: f64,
    window: &ArrivalWindow,
) -> Vec<Order> {
    if menu.is_empty() {
        return Vec::new();
    }

    arrival_times(&mut *rng, quota, lambda, window)
        .into_iter()
        .enumerate()
        .filter_map(|(i, arrived)| {
            let drink = sample_drink(&mut *rng, menu)?;
            let loyal = rng.random::<f64>() < loyal_rate;
            let mut order = Order::new(format!("Customer_{}", i + 1), drink.id, loyal, arrived);
            order.priority_score = priority::score(&order, drink, arrived);
            Some(order)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rstest::rstest;

    fn window() -> ArrivalWindow {
        ArrivalWindow::new(Utc.with_ymd_and_hms(2026, 3, 2, 7, 0, 0).unwrap(), 180)
    }

    fn menu() -> Vec<Drink> {
        vec![
            Drink::new("Cold Brew", 1, 4.50, 0.25),
            Drink::new("Espresso", 2, 3.00, 0.20),
            Drink::new("Americano", 2, 3.50, 0.15),
            Drink::new("Cappuccino", 4, 4.50, 0.20),
            Drink::new("Latte", 4, 4.50, 0.12),
            Drink::new("Mocha", 6, 5.50, 0.08),
        ]
    }

    #[rstest]
    #[case(100, 0.60)]
    #[case(100, 0.05)]
    #[case(500, 0.60)]
    #[case(10, 0.0)]
    fn test_quota_met_inside_window(#[case] quota: usize, #[case] lambda: f64) {
        let mut rng = StdRng::seed_from_u64(7);
        let times = arrival_times(&mut rng, quota, lambda, &window());
        assert_eq!(times.len(), quota);
        assert!(times.iter().all(|t| window().contains(*t)));
        assert!(times.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_same_seed_same_arrivals() {
        let a = arrival_times(&mut StdRng::seed_from_u64(42), 100, 0.6, &window());
        let b = arrival_times(&mut StdRng::seed_from_u64(42), 100, 0.6, &window());
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_window_puts_everything_at_start() {
        let w = ArrivalWindow::new(window().start, 0);
        let times = arrival_times(&mut StdRng::seed_from_u64(1), 3, 0.6, &w);
        assert_eq!(times, vec![w.start; 3]);
    }

    #[test]
    fn test_sampling_follows_demand_frequency() {
        let menu = menu();
        let mut rng = StdRng::seed_from_u64(11);
        let draws = 20_000;
        let cold_brew = (0..draws)
            .filter(|_| sample_drink(&mut rng, &menu).map(|d| d.name.as_str()) == Some("Cold Brew"))
            .count();
        let share = cold_brew as f64 / draws as f64;
        assert!((share - 0.25).abs() < 0.02, "share = {share}");
    }

    #[test]
    fn test_sampling_falls_back_to_first_drink() {
        let menu = vec![Drink::new("Tea", 3, 2.0, 0.0), Drink::new("Soda", 1, 2.0, 0.0)];
        let picked = sample_drink(&mut StdRng::seed_from_u64(3), &menu).unwrap();
        assert_eq!(picked.name, "Tea");
        assert!(sample_drink(&mut StdRng::seed_from_u64(3), &[]).is_none());
    }

    #[test]
    fn test_generated_orders_are_named_by_arrival() {
        let menu = menu();
        let orders = generate_orders(&mut StdRng::seed_from_u64(5), &menu, 100, 0.6, 0.3, &window());

        assert_eq!(orders.len(), 100);
        assert_eq!(orders[0].customer_name, "Customer_1");
        assert_eq!(orders[99].customer_name, "Customer_100");
        assert!(orders.windows(2).all(|w| w[0].order_time() <= w[1].order_time()));
        assert!(orders.iter().all(|o| o.assigned_worker.is_none()));
        let loyal = orders.iter().filter(|o| o.loyal).count();
        assert!((10..=50).contains(&loyal), "loyal = {loyal}");
    }
}
