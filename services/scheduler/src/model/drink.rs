use brew_id::DrinkId;
use serde::{Deserialize, Serialize};

use crate::store::Record;

/// A menu item with a fixed preparation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Drink {
    pub id: DrinkId,
    pub name: String,
    pub prep_time_minutes: u32,
    pub price: f64,
    /// Relative demand; only the simulator's sampling uses it.
    pub demand_frequency: f64,
}

impl Drink {
    pub fn new(
        name: impl Into<String>,
        prep_time_minutes: u32,
        price: f64,
        demand_frequency: f64,
    ) -> Self {
        Self {
            id: DrinkId::new(),
            name: name.into(),
            prep_time_minutes,
            price,
            demand_frequency,
        }
    }
}

impl Record for Drink {
    type Id = DrinkId;

    fn id(&self) -> DrinkId {
        self.id
    }
}
