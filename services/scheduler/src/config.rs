use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{ensure, Context, Result};

use crate::service::ShopConfig;
use crate::simulation::SimulationConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub log_level: String,
    pub tick_interval: Duration,
    /// Maximum orders in PREPARING at once.
    pub capacity: usize,
    /// Seed the default menu and staff on startup.
    pub seed_defaults: bool,
    pub simulation: SimulationConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let listen_addr: SocketAddr = var("BREW_LISTEN_ADDR", "127.0.0.1:8080")
            .parse()
            .context("BREW_LISTEN_ADDR")?;

        let log_level = var("BREW_LOG_LEVEL", "info");

        let tick_secs: u64 = var("BREW_TICK_INTERVAL_SECS", "30")
            .parse()
            .context("BREW_TICK_INTERVAL_SECS")?;
        ensure!(tick_secs > 0, "BREW_TICK_INTERVAL_SECS must be positive");

        let capacity: usize = var("BREW_CAPACITY", "3").parse().context("BREW_CAPACITY")?;
        ensure!(capacity > 0, "BREW_CAPACITY must be positive");

        let seed_defaults = lookup("BREW_SEED_DEFAULTS")
            .map(|v| v == "1" || v.to_lowercase() == "true")
            .unwrap_or(true);

        let defaults = SimulationConfig::default();
        let seed = lookup("BREW_SIM_SEED")
            .map(|v| v.parse::<u64>())
            .transpose()
            .context("BREW_SIM_SEED")?;
        let total_orders = match lookup("BREW_SIM_ORDERS") {
            Some(v) => v.parse().context("BREW_SIM_ORDERS")?,
            None => defaults.total_orders,
        };
        let lambda: f64 = match lookup("BREW_SIM_LAMBDA") {
            Some(v) => v.parse().context("BREW_SIM_LAMBDA")?,
            None => defaults.lambda,
        };
        ensure!(
            lambda.is_finite() && lambda > 0.0,
            "BREW_SIM_LAMBDA must be a positive number"
        );

        Ok(Self {
            listen_addr,
            log_level,
            tick_interval: Duration::from_secs(tick_secs),
            capacity,
            seed_defaults,
            simulation: SimulationConfig {
                total_orders,
                lambda,
                seed,
                ..defaults
            },
        })
    }

    pub fn shop(&self) -> ShopConfig {
        ShopConfig {
            capacity: self.capacity,
            simulation: self.simulation.clone(),
        }
    }
}
