//! Per-player gold ledger.
//!
//! Every credit and debit goes through [`Finance::add_to_finance_income`] or
//! [`Finance::add_to_finance_expense`], which keep four views in step:
//! - `gold`, the authoritative balance (may go negative)
//! - a three-turn rolling history per direction, used for averages
//! - all-time totals keyed by category and entity
//! - `total_profits`, lifetime income minus lifetime expense

use serde::{Deserialize, Serialize};
use slotmap::SecondaryMap;

use crate::config::NetWorthConfig;
use crate::route::Route;
use crate::train::{Upgrade, effective_upkeep};
use crate::types::{FinanceType, LedgerRef, PlayerId, UpgradeId};
use crate::world::GameData;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub kind: FinanceType,
    pub reference: LedgerRef,
    pub amount: u32,
    pub value: i64,
    pub turn: u32,
}

impl LedgerEntry {
    pub fn total(&self) -> i64 {
        i64::from(self.amount) * self.value
    }
}

/// Entries of the current turn and the two before it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollingBuckets {
    pub nth_turn: Vec<LedgerEntry>,
    pub nth_turn_minus_one: Vec<LedgerEntry>,
    pub nth_turn_minus_two: Vec<LedgerEntry>,
}

impl RollingBuckets {
    /// Age every bucket by one turn, dropping the oldest.
    pub fn shift(&mut self) {
        self.nth_turn_minus_two = std::mem::take(&mut self.nth_turn_minus_one);
        self.nth_turn_minus_one = std::mem::take(&mut self.nth_turn);
    }

    pub fn buckets(&self) -> [&Vec<LedgerEntry>; 3] {
        [
            &self.nth_turn,
            &self.nth_turn_minus_one,
            &self.nth_turn_minus_two,
        ]
    }

    fn buckets_mut(&mut self) -> [&mut Vec<LedgerEntry>; 3] {
        [
            &mut self.nth_turn,
            &mut self.nth_turn_minus_one,
            &mut self.nth_turn_minus_two,
        ]
    }

    /// Rounded mean of the three bucket sums.
    pub fn average(&self) -> i64 {
        let sum: i64 = self
            .buckets()
            .iter()
            .map(|bucket| bucket.iter().map(LedgerEntry::total).sum::<i64>())
            .sum();
        (sum as f64 / 3.0).round() as i64
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollingHistory {
    pub income: RollingBuckets,
    pub expense: RollingBuckets,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerTotal {
    pub kind: FinanceType,
    pub reference: LedgerRef,
    pub amount: u64,
    pub value: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotalHistory {
    pub income: Vec<LedgerTotal>,
    pub expense: Vec<LedgerTotal>,
}

impl TotalHistory {
    fn apply(totals: &mut Vec<LedgerTotal>, kind: FinanceType, reference: LedgerRef, amount: i64, value: i64) {
        match totals
            .iter_mut()
            .find(|t| t.kind == kind && t.reference == reference)
        {
            Some(total) => {
                total.amount = (total.amount as i64 + amount).max(0) as u64;
                total.value += value;
            }
            None => totals.push(LedgerTotal {
                kind,
                reference,
                amount: amount.max(0) as u64,
                value,
            }),
        }
    }

    pub fn income_for(&self, kind: FinanceType, reference: LedgerRef) -> i64 {
        Self::lookup(&self.income, kind, reference)
    }

    pub fn expense_for(&self, kind: FinanceType, reference: LedgerRef) -> i64 {
        Self::lookup(&self.expense, kind, reference)
    }

    fn lookup(totals: &[LedgerTotal], kind: FinanceType, reference: LedgerRef) -> i64 {
        totals
            .iter()
            .find(|t| t.kind == kind && t.reference == reference)
            .map(|t| t.value)
            .unwrap_or(0)
    }

    pub fn income_total(&self) -> i64 {
        self.income.iter().map(|t| t.value).sum()
    }

    pub fn expense_total(&self) -> i64 {
        self.expense.iter().map(|t| t.value).sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finance {
    pub gold: i64,
    pub history: RollingHistory,
    pub total_history: TotalHistory,
    pub total_profits: i64,
    pub net_worth: i64,
    /// Shares this player holds, keyed by the stock's owning player
    pub stocks: SecondaryMap<PlayerId, u32>,
}

impl Finance {
    pub fn new(gold: i64) -> Self {
        Self {
            gold,
            history: RollingHistory::default(),
            total_history: TotalHistory::default(),
            total_profits: 0,
            net_worth: gold,
            stocks: SecondaryMap::new(),
        }
    }

    pub fn can_afford(&self, cost: i64) -> bool {
        self.gold >= cost
    }

    // === Ledger ===

    pub fn add_to_finance_expense(
        &mut self,
        kind: FinanceType,
        reference: LedgerRef,
        amount: u32,
        value: i64,
        turn: u32,
    ) {
        let entry = LedgerEntry {
            kind,
            reference,
            amount,
            value,
            turn,
        };
        let total = entry.total();
        TotalHistory::apply(&mut self.total_history.expense, kind, reference, i64::from(amount), total);
        self.total_profits -= total;
        self.gold -= total;
        self.history.expense.nth_turn.push(entry);
    }

    pub fn add_to_finance_income(
        &mut self,
        kind: FinanceType,
        reference: LedgerRef,
        amount: u32,
        value: i64,
        turn: u32,
    ) {
        let entry = LedgerEntry {
            kind,
            reference,
            amount,
            value,
            turn,
        };
        let total = entry.total();
        TotalHistory::apply(&mut self.total_history.income, kind, reference, i64::from(amount), total);
        self.total_profits += total;
        self.gold += total;
        self.history.income.nth_turn.push(entry);
    }

    /// Undo the first recorded expense matching `kind` and `reference` still
    /// inside the rolling window. Returns false when nothing matches.
    pub fn remove_from_finance_expense(&mut self, kind: FinanceType, reference: LedgerRef) -> bool {
        for bucket in self.history.expense.buckets_mut() {
            if let Some(index) = bucket
                .iter()
                .position(|e| e.kind == kind && e.reference == reference)
            {
                let entry = bucket.remove(index);
                let total = entry.total();
                TotalHistory::apply(
                    &mut self.total_history.expense,
                    kind,
                    reference,
                    -i64::from(entry.amount),
                    -total,
                );
                self.total_profits += total;
                self.gold += total;
                return true;
            }
        }
        false
    }

    pub fn get_average_revenue(&self) -> i64 {
        self.history.income.average()
    }

    pub fn get_average_expense(&self) -> i64 {
        self.history.expense.average()
    }

    pub fn is_profitable(&self) -> bool {
        self.get_average_revenue() > self.get_average_expense()
    }

    // === Turn settlement ===

    /// Roll the history window, then charge upkeep on every route and credit
    /// deliveries for every route that arrived this turn.
    pub fn settle_turn(&mut self, routes: &mut [Route], upgrades: &[UpgradeId], data: &GameData, turn: u32) {
        self.history.income.shift();
        self.history.expense.shift();

        let owned: Vec<&Upgrade> = data.upgrades_from(upgrades).collect();

        for route in routes.iter_mut() {
            let Some(train) = data.trains.get(route.train) else {
                continue;
            };

            let upkeep = effective_upkeep(train, owned.iter().copied());
            self.add_to_finance_expense(FinanceType::Upkeep, LedgerRef::Train(train.id), 1, upkeep, turn);
            route.profit -= upkeep;

            if !route.route_state.has_arrived {
                continue;
            }
            let Some(destination) = data.cities.get(route.route_state.destination) else {
                continue;
            };

            for item in &route.route_state.cargo {
                if item.actual_amount == 0 || !destination.demands(item.resource) {
                    continue;
                }
                let price = data.resource_value(item.resource);
                self.add_to_finance_income(
                    FinanceType::Cargo,
                    LedgerRef::Resource(item.resource),
                    item.actual_amount,
                    price,
                    turn,
                );
                route.profit += i64::from(item.actual_amount) * price;
            }
        }
    }

    // === Stock holdings ===

    pub fn shares_in(&self, owner: PlayerId) -> u32 {
        self.stocks.get(owner).copied().unwrap_or(0)
    }

    pub fn add_shares(&mut self, owner: PlayerId, count: u32) {
        if count == 0 {
            return;
        }
        match self.stocks.get_mut(owner) {
            Some(held) => *held += count,
            None => {
                self.stocks.insert(owner, count);
            }
        }
    }

    pub fn remove_shares(&mut self, owner: PlayerId, count: u32) {
        if let Some(held) = self.stocks.get_mut(owner) {
            *held = held.saturating_sub(count);
            if *held == 0 {
                self.stocks.remove(owner);
            }
        }
    }

    // === Net worth ===

    /// Recompute and store net worth.
    ///
    /// `assets` is every active and queued route; `share_value` yields the
    /// current sell value per share of a player's stock (zero when the stock
    /// is gone).
    pub fn calculate_net_worth<'a>(
        &mut self,
        assets: impl IntoIterator<Item = &'a Route>,
        upgrades: &[UpgradeId],
        data: &GameData,
        share_value: impl Fn(PlayerId) -> i64,
        config: &NetWorthConfig,
    ) -> i64 {
        let routes: i64 = assets
            .into_iter()
            .map(|route| {
                let train_cost = data.trains.get(route.train).map(|t| t.cost).unwrap_or(0);
                route.cost.div_euclid(config.tracks_divisor.max(1))
                    + train_cost.div_euclid(config.train_divisor.max(1))
            })
            .sum();

        let upgrades: i64 = data
            .upgrades_from(upgrades)
            .map(|u| u.cost.div_euclid(config.upgrade_divisor.max(1)))
            .sum();

        let gold = self.gold.div_euclid(config.gold_divisor.max(1));

        let holdings: i64 = self
            .stocks
            .iter()
            .map(|(owner, shares)| i64::from(*shares) * share_value(owner))
            .sum();

        self.net_worth = routes + upgrades + gold + holdings;
        self.net_worth
    }
}
