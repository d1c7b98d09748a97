use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use slotmap::SecondaryMap;

use crate::config::StockConfig;
use crate::resource::ValueRecord;
use crate::types::{Identifiable, PlayerId};

/// A player's company stock. Holders are tracked by player id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stock {
    pub owning_player: PlayerId,
    pub name: String,
    pub value: i64,
    pub value_history: VecDeque<ValueRecord>,
    /// Shares held per player
    pub supply: SecondaryMap<PlayerId, u32>,
    pub is_active: bool,
}

impl Stock {
    /// Issue the starting shares to the owner.
    pub fn new(owning_player: PlayerId, name: impl Into<String>, config: &StockConfig) -> Self {
        let mut supply = SecondaryMap::new();
        if config.starting_shares > 0 {
            supply.insert(owning_player, config.starting_shares);
        }
        let value = config.base_value
            + (f64::from(config.starting_shares) * config.stock_holder_multiplier).floor() as i64;

        Self {
            owning_player,
            name: name.into(),
            value,
            value_history: VecDeque::from([ValueRecord { value, turn: 0 }]),
            supply,
            is_active: true,
        }
    }

    pub fn shares_outstanding(&self) -> u32 {
        self.supply.values().sum()
    }

    pub fn shares_held_by(&self, player: PlayerId) -> u32 {
        self.supply.get(player).copied().unwrap_or(0)
    }

    pub fn is_fully_issued(&self, config: &StockConfig) -> bool {
        self.shares_outstanding() >= config.max_stock_amount
    }

    pub fn get_buy_value(&self, config: &StockConfig) -> i64 {
        (self.value as f64 * config.buy_multiplier).floor() as i64
    }

    pub fn get_sell_value(&self) -> i64 {
        self.value
    }

    /// What `holder` is owed for their whole position in a buyout.
    pub fn buyout_value_for(&self, holder: PlayerId) -> i64 {
        i64::from(self.shares_held_by(holder)) * self.get_sell_value()
    }

    /// Issue one share to `buyer`. Fails once the cap is reached.
    pub fn buy_stock(&mut self, buyer: PlayerId, config: &StockConfig) -> bool {
        if !self.is_active || self.is_fully_issued(config) {
            return false;
        }
        match self.supply.get_mut(buyer) {
            Some(held) => *held += 1,
            None => {
                self.supply.insert(buyer, 1);
            }
        }
        true
    }

    /// Take one share back from `seller`. Fails when they hold none.
    pub fn sell_stock(&mut self, seller: PlayerId) -> bool {
        if !self.is_active {
            return false;
        }
        let Some(held) = self.supply.get_mut(seller) else {
            return false;
        };
        *held -= 1;
        if *held == 0 {
            self.supply.remove(seller);
        }
        true
    }

    /// Move every share to `acquirer`.
    pub(crate) fn consolidate(&mut self, acquirer: PlayerId) {
        let total = self.shares_outstanding();
        self.supply.clear();
        self.supply.insert(acquirer, total);
    }

    /// Recompute the share price from the owner's performance. Returns true
    /// when the value moved.
    pub fn update_value(
        &mut self,
        active_routes: usize,
        average_revenue: i64,
        total_profits: i64,
        turn: u32,
        config: &StockConfig,
    ) -> bool {
        let routes = (active_routes as f64 * config.length_multiplier).floor() as i64;
        let revenue = (average_revenue as f64 / config.average_revenue_divisor).floor() as i64;
        let holders =
            (f64::from(self.shares_outstanding()) * config.stock_holder_multiplier).floor() as i64;
        let profits = (total_profits as f64 / config.total_profits_divisor).floor() as i64;

        let value = (config.base_value + routes + revenue + holders + profits).max(0);
        if value == self.value {
            return false;
        }

        self.value = value;
        self.value_history.push_back(ValueRecord { value, turn });
        while self.value_history.len() > config.max_value_history {
            self.value_history.pop_front();
        }
        true
    }
}

impl Identifiable for Stock {
    type Id = PlayerId;

    fn id(&self) -> PlayerId {
        self.owning_player
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl PartialEq for Stock {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn players(n: usize) -> Vec<PlayerId> {
        let mut map: SlotMap<PlayerId, ()> = SlotMap::with_key();
        (0..n).map(|_| map.insert(())).collect()
    }

    #[test]
    fn starting_value_from_holder_multiplier() {
        let config = StockConfig {
            stock_holder_multiplier: 20.0,
            base_value: 0,
            ..StockConfig::default()
        };
        let ids = players(1);
        let stock = Stock::new(ids[0], "Acme", &config);

        assert_eq!(stock.get_sell_value(), 80);
        assert_eq!(stock.get_buy_value(&config), 100);
        assert_eq!(stock.shares_held_by(ids[0]), 4);
    }

    #[test]
    fn buying_stops_at_the_cap() {
        let config = StockConfig::default();
        let ids = players(2);
        let mut stock = Stock::new(ids[0], "Acme", &config);

        for _ in 0..6 {
            assert!(stock.buy_stock(ids[1], &config));
        }
        assert_eq!(stock.shares_outstanding(), 10);
        assert!(!stock.buy_stock(ids[1], &config));
        assert_eq!(stock.shares_held_by(ids[1]), 6);
    }

    #[test]
    fn selling_needs_a_holding() {
        let config = StockConfig::default();
        let ids = players(2);
        let mut stock = Stock::new(ids[0], "Acme", &config);

        assert!(!stock.sell_stock(ids[1]));
        assert!(stock.buy_stock(ids[1], &config));
        assert!(stock.sell_stock(ids[1]));
        assert!(!stock.sell_stock(ids[1]));
        assert_eq!(stock.shares_outstanding(), 4);
    }

    #[test]
    fn update_value_caps_history() {
        let config = StockConfig {
            max_value_history: 3,
            ..StockConfig::default()
        };
        let ids = players(1);
        let mut stock = Stock::new(ids[0], "Acme", &config);

        for routes in 1..=5 {
            assert!(stock.update_value(routes, 0, 0, routes as u32, &config));
        }
        assert_eq!(stock.value_history.len(), 3);
        // 5000 + 5 * 2500 + 4 * 2000
        assert_eq!(stock.value, 25_500);
        assert!(!stock.update_value(5, 0, 0, 6, &config));
    }

    #[test]
    fn update_value_weights_every_term() {
        let config = StockConfig::default();
        let ids = players(1);
        let mut stock = Stock::new(ids[0], "Acme", &config);

        stock.update_value(2, 1001, -95, 1, &config);
        // 5000 + 5000 + 500 + 8000 + floor(-9.5)
        assert_eq!(stock.value, 18_490);
    }
}
