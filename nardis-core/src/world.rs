// Shared world arena: every city, resource, train model and upgrade in a game

use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

use crate::city::City;
use crate::resource::Resource;
use crate::train::{Train, Upgrade};
use crate::types::{CityId, ResourceId, TrainId, UpgradeId, YieldTier};

/// The bundle every turn handler reads from.
///
/// Relationships between entities are stored as ids into these maps, never
/// as nested copies.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameData {
    pub resources: SlotMap<ResourceId, Resource>,
    pub trains: SlotMap<TrainId, Train>,
    pub upgrades: SlotMap<UpgradeId, Upgrade>,
    pub cities: SlotMap<CityId, City>,
}

impl GameData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resource_value(&self, id: ResourceId) -> i64 {
        self.resources.get(id).map(|r| r.value).unwrap_or(0)
    }

    pub fn city_name(&self, id: CityId) -> &str {
        self.cities.get(id).map(|c| c.name.as_str()).unwrap_or("?")
    }

    /// Upgrades from an id list, skipping ids that are not in the catalog.
    pub fn upgrades_from<'a>(
        &'a self,
        ids: &'a [UpgradeId],
    ) -> impl Iterator<Item = &'a Upgrade> + 'a {
        ids.iter().filter_map(|id| self.upgrades.get(*id))
    }

    /// Distance between two cities in km, or `None` if either is unknown.
    pub fn distance(&self, a: CityId, b: CityId, radius_km: f64) -> Option<i64> {
        let one = self.cities.get(a)?;
        let two = self.cities.get(b)?;
        Some(one.distance_to(two, radius_km))
    }
}

/// Resource ids grouped by yield tier, used whenever a city picks resources.
#[derive(Debug, Clone, Default)]
pub struct ResourcePool {
    pub low: Vec<ResourceId>,
    pub medium: Vec<ResourceId>,
    pub high: Vec<ResourceId>,
}

impl ResourcePool {
    pub fn from_resources(resources: &SlotMap<ResourceId, Resource>) -> Self {
        let mut pool = Self::default();
        for (id, resource) in resources {
            match resource.tier {
                YieldTier::Low => pool.low.push(id),
                YieldTier::Medium => pool.medium.push(id),
                YieldTier::High => pool.high.push(id),
            }
        }
        pool
    }

    pub fn tier(&self, tier: YieldTier) -> &[ResourceId] {
        match tier {
            YieldTier::Low => &self.low,
            YieldTier::Medium => &self.medium,
            YieldTier::High => &self.high,
        }
    }

    pub fn tier_of(&self, id: ResourceId) -> Option<YieldTier> {
        [YieldTier::Low, YieldTier::Medium, YieldTier::High]
            .into_iter()
            .find(|tier| self.tier(*tier).contains(&id))
    }
}
