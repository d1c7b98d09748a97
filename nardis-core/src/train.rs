//! Train models and upgrades. Both are immutable once generated.

use serde::{Deserialize, Serialize};

use crate::types::{Identifiable, PlayerLevel, TrainId, UpgradeId, UpgradeType};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Train {
    pub id: TrainId,
    pub name: String,
    pub cost: i64,
    pub upkeep: i64,
    /// Kilometres per turn
    pub speed: u32,
    /// Total cargo weight the train can haul
    pub cargo_space: u32,
    pub level_required: PlayerLevel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Upgrade {
    pub id: UpgradeId,
    pub name: String,
    pub kind: UpgradeType,
    pub value: f64,
    pub level_required: PlayerLevel,
    pub cost: i64,
}

impl Identifiable for Train {
    type Id = TrainId;

    fn id(&self) -> TrainId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl PartialEq for Train {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

impl Identifiable for Upgrade {
    type Id = UpgradeId;

    fn id(&self) -> UpgradeId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl PartialEq for Upgrade {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

/// Train speed after every owned speed upgrade, applied one after another.
pub fn effective_speed<'a>(train: &Train, upgrades: impl IntoIterator<Item = &'a Upgrade>) -> u32 {
    let speed = upgrades
        .into_iter()
        .filter(|u| u.kind == UpgradeType::Speed)
        .fold(train.speed as f64, |speed, u| speed * (1.0 + u.value));
    speed.floor().max(1.0) as u32
}

/// Per-turn upkeep after every owned upkeep upgrade, applied one after another.
pub fn effective_upkeep<'a>(train: &Train, upgrades: impl IntoIterator<Item = &'a Upgrade>) -> i64 {
    let upkeep = upgrades
        .into_iter()
        .filter(|u| u.kind == UpgradeType::Upkeep)
        .fold(train.upkeep as f64, |upkeep, u| upkeep * (1.0 - u.value));
    upkeep.floor().max(0.0) as i64
}
