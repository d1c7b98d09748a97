use serde::{Deserialize, Serialize};

use crate::types::PlayerLevel;

// === CITY ===

/// Largest size a city can grow to.
pub const MAX_CITY_SIZE: u32 = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CityConfig {
    /// Supply (and demand) basket size for each city size, indexed by `size - 1`.
    pub resources_per_size: [usize; MAX_CITY_SIZE as usize],
    /// Concurrent route capacity for each city size, indexed by `size - 1`.
    pub max_routes_per_size: [u32; MAX_CITY_SIZE as usize],
    /// Growth fires once the growth decider reaches this value (and a coin flip succeeds).
    pub growth_decision_target: f64,
    /// Range the per-city growth rate is drawn from.
    pub growth_rate: (f64, f64),
    /// Inclusive range the per-city refill interval (in turns) is drawn from.
    pub supply_refill_rate: (u32, u32),
    /// Cities at or below this initial size can host a player's start.
    pub start_city_max_size: u32,
    pub planet_radius_km: f64,
}

impl Default for CityConfig {
    fn default() -> Self {
        Self {
            resources_per_size: [2, 3, 3, 4, 4, 5, 5, 6, 6, 7],
            max_routes_per_size: [1, 1, 2, 2, 3, 3, 4, 4, 5, 6],
            growth_decision_target: 50.0,
            growth_rate: (0.5, 2.0),
            supply_refill_rate: (2, 6),
            start_city_max_size: 3,
            planet_radius_km: 6371.0,
        }
    }
}

impl CityConfig {
    pub fn resources_for_size(&self, size: u32) -> usize {
        let index = size.clamp(1, MAX_CITY_SIZE) as usize - 1;
        self.resources_per_size[index]
    }

    pub fn max_routes_for_size(&self, size: u32) -> u32 {
        let index = size.clamp(1, MAX_CITY_SIZE) as usize - 1;
        self.max_routes_per_size[index]
    }
}

// === RESOURCE ===

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceConfig {
    /// A price change fires once `decider + volatility` reaches this.
    pub decision_target: f64,
    /// Range of the random factor multiplied by volatility each turn.
    pub decider_step: (f64, f64),
    /// Price delta (fraction of `max_value`) drawn when the price sits at its ceiling.
    pub ceiling_delta: (f64, f64),
    /// Symmetric price delta (fraction of current value) drawn otherwise.
    pub walk_delta: f64,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            decision_target: 1.0,
            decider_step: (0.25, 1.25),
            ceiling_delta: (-0.08, 0.02),
            walk_delta: 0.15,
        }
    }
}

// === ROUTE ===

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteConfig {
    pub track_cost_per_km: i64,
    /// Kilometres of track laid per turn while a route sits in the queue.
    pub build_km_per_turn: i64,
    /// Fraction of track + train cost returned when a route is deleted.
    pub recoup_fraction: f64,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            track_cost_per_km: 30,
            build_km_per_turn: 150,
            recoup_fraction: 0.5,
        }
    }
}

impl RouteConfig {
    pub fn build_turns(&self, distance: i64) -> u32 {
        let per_turn = self.build_km_per_turn.max(1);
        let turns = (distance + per_turn - 1) / per_turn;
        turns.max(1) as u32
    }
}

// === STOCK ===

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StockConfig {
    pub max_stock_amount: u32,
    pub starting_shares: u32,
    pub buy_multiplier: f64,
    pub length_multiplier: f64,
    pub average_revenue_divisor: f64,
    pub stock_holder_multiplier: f64,
    pub total_profits_divisor: f64,
    pub base_value: i64,
    pub max_value_history: usize,
}

impl Default for StockConfig {
    fn default() -> Self {
        Self {
            max_stock_amount: 10,
            starting_shares: 4,
            buy_multiplier: 1.25,
            length_multiplier: 2500.0,
            average_revenue_divisor: 2.0,
            stock_holder_multiplier: 2000.0,
            total_profits_divisor: 10.0,
            base_value: 5000,
            max_value_history: 20,
        }
    }
}

// === NET WORTH ===

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetWorthConfig {
    pub tracks_divisor: i64,
    pub train_divisor: i64,
    pub upgrade_divisor: i64,
    pub gold_divisor: i64,
}

impl Default for NetWorthConfig {
    fn default() -> Self {
        Self {
            tracks_divisor: 2,
            train_divisor: 2,
            upgrade_divisor: 2,
            gold_divisor: 1,
        }
    }
}

// === LEVELS ===

/// What a player must hold to be promoted into a level.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LevelRequirement {
    pub routes: usize,
    pub average_revenue: i64,
    pub gold: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelConfig {
    /// Requirements for Intermediate, Advanced and Master, in that order.
    pub requirements: [LevelRequirement; 3],
    /// Maximum route length in km for each level.
    pub range: [u32; 4],
}

impl Default for LevelConfig {
    fn default() -> Self {
        Self {
            requirements: [
                LevelRequirement {
                    routes: 3,
                    average_revenue: 1500,
                    gold: 150_000,
                },
                LevelRequirement {
                    routes: 6,
                    average_revenue: 5000,
                    gold: 350_000,
                },
                LevelRequirement {
                    routes: 10,
                    average_revenue: 12_000,
                    gold: 800_000,
                },
            ],
            range: [450, 600, 800, 1100],
        }
    }
}

impl LevelConfig {
    pub fn requirement_for(&self, level: PlayerLevel) -> Option<&LevelRequirement> {
        match level {
            PlayerLevel::Novice => None,
            other => self.requirements.get(other.index() - 1),
        }
    }

    pub fn range_for(&self, level: PlayerLevel) -> u32 {
        self.range[level.index()]
    }
}

// === OPPONENT ===

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpponentConfig {
    /// Gold the AI keeps untouched when buying routes.
    pub route_reserve: i64,
    /// The AI stops queueing once this many routes are under construction.
    pub max_queue_length: usize,
    /// Routes queued in one turn are capped at `routes_per_turn_base + level index`.
    pub routes_per_turn_base: usize,
    /// Shares of a single rival the AI is willing to hold.
    pub max_holdings_per_stock: u32,
    /// Gold the AI must still have after buying a share.
    pub stock_reserve: i64,
    /// Below this much gold the AI considers itself broke.
    pub broke_threshold: i64,
    /// Turns a save lasts before the goal is retried.
    pub save_duration: u32,
    /// Gold the AI must still have after a buyout.
    pub buyout_reserve: i64,
}

impl Default for OpponentConfig {
    fn default() -> Self {
        Self {
            route_reserve: 20_000,
            max_queue_length: 2,
            routes_per_turn_base: 1,
            max_holdings_per_stock: 3,
            stock_reserve: 60_000,
            broke_threshold: 25_000,
            save_duration: 5,
            buyout_reserve: 10_000,
        }
    }
}

// === LOGGING ===

/// Which diagnostic event families are emitted through `tracing`.
///
/// Everything is off by default. Logging never changes simulation outcomes.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub turns: bool,
    pub finance: bool,
    pub ai: bool,
    pub stocks: bool,
    pub persistence: bool,
}

impl LogConfig {
    pub fn verbose() -> Self {
        Self {
            turns: true,
            finance: true,
            ai: true,
            stocks: true,
            persistence: true,
        }
    }
}

// === GAME ===

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub seed: u64,
    pub opponents: usize,
    pub start_gold: i64,
    pub city: CityConfig,
    pub resource: ResourceConfig,
    pub route: RouteConfig,
    pub stock: StockConfig,
    pub net_worth: NetWorthConfig,
    pub level: LevelConfig,
    pub opponent: OpponentConfig,
    pub log: LogConfig,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            seed: 0x4e41_5244_4953,
            opponents: 3,
            start_gold: 200_000,
            city: CityConfig::default(),
            resource: ResourceConfig::default(),
            route: RouteConfig::default(),
            stock: StockConfig::default(),
            net_worth: NetWorthConfig::default(),
            level: LevelConfig::default(),
            opponent: OpponentConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl GameConfig {
    /// Parse a (possibly partial) JSON config; missing fields take defaults.
    pub fn from_json(raw: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_opponents(mut self, opponents: usize) -> Self {
        self.opponents = opponents;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config = GameConfig::from_json(r#"{"opponents": 1, "stock": {"base_value": 0}}"#)
            .unwrap();
        assert_eq!(config.opponents, 1);
        assert_eq!(config.stock.base_value, 0);
        assert_eq!(config.stock.max_stock_amount, 10);
        assert_eq!(config.start_gold, 200_000);
    }

    #[test]
    fn build_turns_rounds_up_and_never_hits_zero() {
        let route = RouteConfig::default();
        assert_eq!(route.build_turns(1), 1);
        assert_eq!(route.build_turns(150), 1);
        assert_eq!(route.build_turns(151), 2);
        assert_eq!(route.build_turns(0), 1);
    }

    #[test]
    fn level_tables_line_up() {
        let levels = LevelConfig::default();
        assert!(levels.requirement_for(PlayerLevel::Novice).is_none());
        assert_eq!(
            levels.requirement_for(PlayerLevel::Master).unwrap().routes,
            10
        );
        assert!(levels.range_for(PlayerLevel::Master) > levels.range_for(PlayerLevel::Novice));
    }
}
