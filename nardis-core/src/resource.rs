//! Tradeable resources and their fluctuating prices.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::ResourceConfig;
use crate::random::{GameRng, between_f64};
use crate::types::{Identifiable, ResourceId, TurnAdvanceable, YieldTier};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueRecord {
    pub value: i64,
    pub turn: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub id: ResourceId,
    pub name: String,
    pub tier: YieldTier,
    pub value: i64,
    pub min_value: i64,
    pub max_value: i64,
    /// Cargo space one unit occupies
    pub weight: u32,
    /// 0.0 - 1.0, scales both how often and how far the price moves
    pub value_volatility: f64,
    pub value_change_decider: f64,
    pub value_history: Vec<ValueRecord>,
}

impl Resource {
    pub fn new(
        id: ResourceId,
        name: impl Into<String>,
        tier: YieldTier,
        value: i64,
        bounds: (i64, i64),
        weight: u32,
        value_volatility: f64,
    ) -> Self {
        let (min_value, max_value) = bounds;
        let value = value.clamp(min_value, max_value);
        Self {
            id,
            name: name.into(),
            tier,
            value,
            min_value,
            max_value,
            weight,
            value_volatility: value_volatility.clamp(0.0, 1.0),
            value_change_decider: 0.0,
            value_history: vec![ValueRecord { value, turn: 0 }],
        }
    }

    fn last_recorded_value(&self) -> i64 {
        self.value_history
            .last()
            .map(|r| r.value)
            .unwrap_or(self.value)
    }

    /// Candidate price for the next change.
    ///
    /// At the ceiling the nudge is small and mostly downward, elsewhere it is
    /// a wider symmetric step. The result is always within bounds.
    fn roll_new_value(&self, rng: &mut GameRng, config: &ResourceConfig) -> i64 {
        if self.value >= self.max_value {
            let (low, high) = config.ceiling_delta;
            let delta = (between_f64(rng, low, high) * self.max_value as f64).round() as i64;
            (self.value + delta).min(self.max_value).max(self.min_value)
        } else {
            let spread = config.walk_delta.abs();
            let fraction = if spread > 0.0 {
                rng.random_range(-spread..=spread)
            } else {
                0.0
            };
            let delta = (fraction * self.value as f64).round() as i64;
            (self.value + delta).clamp(self.min_value, self.max_value)
        }
    }
}

pub struct ResourceTurn<'a> {
    pub turn: u32,
    pub rng: &'a mut GameRng,
    pub config: &'a ResourceConfig,
}

impl TurnAdvanceable for Resource {
    type Context<'a> = ResourceTurn<'a>;

    fn handle_turn(&mut self, ctx: ResourceTurn<'_>) -> crate::Result<()> {
        let (low, high) = ctx.config.decider_step;
        self.value_change_decider += self.value_volatility * between_f64(ctx.rng, low, high);

        if self.value_change_decider + self.value_volatility >= ctx.config.decision_target {
            let candidate = self.roll_new_value(ctx.rng, ctx.config);
            if candidate != self.last_recorded_value() {
                self.value = candidate;
                self.value_history.push(ValueRecord {
                    value: candidate,
                    turn: ctx.turn,
                });
                self.value_change_decider = 0.0;
            }
        }

        Ok(())
    }
}

impl Identifiable for Resource {
    type Id = ResourceId;

    fn id(&self) -> ResourceId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl PartialEq for Resource {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}
