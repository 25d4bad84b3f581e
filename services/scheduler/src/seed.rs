//! Default menu and staff.

use crate::model::{Drink, Worker};

pub const DEFAULT_WORKERS: [&str; 3] = ["Alice", "Bob", "Charlie"];

/// The six-drink menu. Demand frequencies sum to 1.
pub fn default_menu() -> Vec<Drink> {
    vec![
        Drink::new("Cold Brew", 1, 4.50, 0.25),
        Drink::new("Espresso", 2, 3.00, 0.20),
        Drink::new("Americano", 2, 3.50, 0.15),
        Drink::new("Cappuccino", 4, 4.50, 0.20),
        Drink::new("Latte", 4, 4.50, 0.12),
        Drink::new("Mocha", 6, 5.50, 0.08),
    ]
}

pub fn default_workers() -> Vec<Worker> {
    DEFAULT_WORKERS.iter().map(|name| Worker::new(*name)).collect()
}
