// City type: a node in the rail network with a supply and a demand basket

use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

use crate::config::{CityConfig, MAX_CITY_SIZE};
use crate::error::NardisError;
use crate::random::{GameRng, between};
use crate::types::{CityId, Coords, Identifiable, ResourceId, TurnAdvanceable, YieldTier};
use crate::world::ResourcePool;

/// Returned by [`City::distance_to`] when asked for the distance to itself.
pub const SELF_DISTANCE: i64 = -1;

/// Growth only considers high-yield resources from this size upwards.
const HIGH_YIELD_MIN_SIZE: u32 = 5;

/// A resource the city produces. `available` drains as trains load and is
/// topped back up to `amount` on each refill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplyEntry {
    pub resource: ResourceId,
    pub amount: u32,
    pub available: u32,
}

/// A resource the city buys. Demand is unbounded, so there is no stock level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemandEntry {
    pub resource: ResourceId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct City {
    pub id: CityId,
    pub name: String,
    pub size: u32,
    pub coords: Coords,
    pub supply: Vec<SupplyEntry>,
    pub demand: Vec<DemandEntry>,
    pub growth_rate: f64,
    /// Turns between supply refills
    pub supply_refill_rate: u32,
    pub growth_change_decider: f64,
    pub supply_refill_decider: u32,
    pub max_concurrent_routes: u32,
    pub current_route_count: u32,
    pub is_start_city: bool,
}

impl City {
    pub fn new(
        id: CityId,
        name: impl Into<String>,
        size: u32,
        coords: Coords,
        config: &CityConfig,
    ) -> Self {
        let size = size.clamp(1, MAX_CITY_SIZE);
        Self {
            id,
            name: name.into(),
            size,
            coords,
            supply: Vec::new(),
            demand: Vec::new(),
            growth_rate: 1.0,
            supply_refill_rate: 1,
            growth_change_decider: 0.0,
            supply_refill_decider: 0,
            max_concurrent_routes: config.max_routes_for_size(size),
            current_route_count: 0,
            is_start_city: size <= config.start_city_max_size,
        }
    }

    pub fn with_supply(mut self, supply: Vec<SupplyEntry>) -> Self {
        self.supply = supply;
        self
    }

    pub fn with_demand(mut self, demand: Vec<DemandEntry>) -> Self {
        self.demand = demand;
        self
    }

    pub fn with_rates(mut self, growth_rate: f64, supply_refill_rate: u32) -> Self {
        self.growth_rate = growth_rate;
        self.supply_refill_rate = supply_refill_rate;
        self
    }

    // === Baskets ===

    pub fn supplies(&self, resource: ResourceId) -> bool {
        self.supply.iter().any(|s| s.resource == resource)
    }

    pub fn demands(&self, resource: ResourceId) -> bool {
        self.demand.iter().any(|d| d.resource == resource)
    }

    pub fn supply_entry(&self, resource: ResourceId) -> Option<&SupplyEntry> {
        self.supply.iter().find(|s| s.resource == resource)
    }

    pub fn supply_entry_mut(&mut self, resource: ResourceId) -> Option<&mut SupplyEntry> {
        self.supply.iter_mut().find(|s| s.resource == resource)
    }

    fn holds(&self, resource: ResourceId) -> bool {
        self.supplies(resource) || self.demands(resource)
    }

    /// Pick a resource this city neither supplies nor demands.
    ///
    /// Medium yield is the default; from size 5 a roll of `min(size, 10) / 10`
    /// escalates to high yield. When the rolled tier is used up the other
    /// non-low tier is tried before giving up.
    pub fn roll_new_resource(
        &self,
        rng: &mut GameRng,
        pool: &ResourcePool,
    ) -> crate::Result<ResourceId> {
        let escalate = self.size >= HIGH_YIELD_MIN_SIZE
            && rng.random_bool(f64::from(self.size.min(10)) / 10.0);
        let (first, fallback) = if escalate {
            (YieldTier::High, YieldTier::Medium)
        } else {
            (YieldTier::Medium, YieldTier::High)
        };

        for tier in [first, fallback] {
            let candidates: Vec<ResourceId> = pool
                .tier(tier)
                .iter()
                .copied()
                .filter(|r| !self.holds(*r))
                .collect();
            if let Some(choice) = candidates.choose(rng) {
                return Ok(*choice);
            }
        }

        Err(NardisError::ResourcePoolExhausted(self.id))
    }

    /// Top both baskets up to the size ceiling with freshly rolled resources.
    /// Both ceilings count the whole basket, low-yield entries included.
    pub fn fill_baskets(
        &mut self,
        rng: &mut GameRng,
        pool: &ResourcePool,
        config: &CityConfig,
    ) -> crate::Result<()> {
        let ceiling = config.resources_for_size(self.size);

        while self.supply.len() < ceiling {
            let resource = self.roll_new_resource(rng, pool)?;
            let tier = pool.tier_of(resource).unwrap_or(YieldTier::Medium);
            let amount = supply_amount(tier, self.size, rng);
            self.supply.push(SupplyEntry {
                resource,
                amount,
                available: amount,
            });
        }

        while self.demand.len() < ceiling {
            let resource = self.roll_new_resource(rng, pool)?;
            self.demand.push(DemandEntry { resource });
        }

        Ok(())
    }

    // === Routes ===

    pub fn is_full(&self) -> bool {
        self.current_route_count >= self.max_concurrent_routes
    }

    /// Reserve a route slot. Returns false when the city is at capacity.
    pub fn add_route(&mut self) -> bool {
        if self.is_full() {
            return false;
        }
        self.current_route_count += 1;
        true
    }

    pub fn remove_route(&mut self) {
        self.current_route_count = self.current_route_count.saturating_sub(1);
    }

    // === Geography ===

    /// Great-circle distance in whole kilometres.
    pub fn distance_to(&self, other: &City, radius_km: f64) -> i64 {
        if self.id == other.id {
            return SELF_DISTANCE;
        }
        haversine_km(self.coords, other.coords, radius_km).round() as i64
    }

    // === Turn phases ===

    fn grow(&mut self, rng: &mut GameRng, pool: &ResourcePool, config: &CityConfig) -> crate::Result<()> {
        let ready = self.growth_change_decider >= config.growth_decision_target;
        if ready && rng.random_bool(0.5) && self.size < MAX_CITY_SIZE {
            self.size += 1;
            self.growth_change_decider = 0.0;
            self.fill_baskets(rng, pool, config)?;
            self.max_concurrent_routes = config.max_routes_for_size(self.size);
        } else {
            self.growth_change_decider += self.growth_rate;
        }
        Ok(())
    }

    fn refill(&mut self) {
        if self.supply_refill_decider >= self.supply_refill_rate {
            for entry in &mut self.supply {
                entry.available = entry.amount;
            }
            self.supply_refill_decider = 0;
        } else {
            self.supply_refill_decider += 1;
        }
    }
}

pub struct CityTurn<'a> {
    pub rng: &'a mut GameRng,
    pub pool: &'a ResourcePool,
    pub config: &'a CityConfig,
}

impl TurnAdvanceable for City {
    type Context<'a> = CityTurn<'a>;

    fn handle_turn(&mut self, ctx: CityTurn<'_>) -> crate::Result<()> {
        self.grow(ctx.rng, ctx.pool, ctx.config)?;
        self.refill();
        Ok(())
    }
}

impl Identifiable for City {
    type Id = CityId;

    fn id(&self) -> CityId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl PartialEq for City {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

/// Stock level of a newly assigned supply entry.
pub fn supply_amount(tier: YieldTier, size: u32, rng: &mut GameRng) -> u32 {
    let per_size = match tier {
        YieldTier::Low => between(rng, 2, 4),
        YieldTier::Medium => between(rng, 1, 3),
        YieldTier::High => between(rng, 1, 2),
    };
    per_size as u32 * size
}

pub fn haversine_km(a: Coords, b: Coords, radius_km: f64) -> f64 {
    let lat_one = a.latitude.to_radians();
    let lat_two = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_one.cos() * lat_two.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    radius_km * c
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::Resource;
    use rand::SeedableRng;
    use slotmap::SlotMap;

    fn world() -> (SlotMap<ResourceId, Resource>, SlotMap<CityId, ()>) {
        let mut resources = SlotMap::with_key();
        for (name, tier) in [
            ("Passengers", YieldTier::Low),
            ("Mail", YieldTier::Low),
            ("Coal", YieldTier::Medium),
            ("Grain", YieldTier::Medium),
            ("Wool", YieldTier::Medium),
            ("Fish", YieldTier::Medium),
            ("Timber", YieldTier::Medium),
            ("Steel", YieldTier::High),
            ("Silk", YieldTier::High),
            ("Spices", YieldTier::High),
        ] {
            resources.insert_with_key(|id| Resource::new(id, name, tier, 100, (50, 200), 1, 0.2));
        }
        (resources, SlotMap::with_key())
    }

    #[test]
    fn roll_skips_resources_already_held() {
        let (resources, mut ids) = world();
        let pool = ResourcePool::from_resources(&resources);
        let config = CityConfig::default();
        let mut rng = GameRng::seed_from_u64(1);
        let city = City::new(ids.insert(()), "Whitby", 2, Coords::new(0.0, 0.0), &config)
            .with_supply(vec![SupplyEntry {
                resource: pool.medium[0],
                amount: 2,
                available: 2,
            }])
            .with_demand(vec![DemandEntry {
                resource: pool.medium[1],
            }]);

        for _ in 0..50 {
            let rolled = city.roll_new_resource(&mut rng, &pool).unwrap();
            assert!(!city.supplies(rolled) && !city.demands(rolled));
            assert!(!pool.low.contains(&rolled));
        }
    }

    #[test]
    fn roll_fails_when_pool_is_exhausted() {
        let (resources, mut ids) = world();
        let pool = ResourcePool::from_resources(&resources);
        let config = CityConfig::default();
        let mut rng = GameRng::seed_from_u64(1);
        let supply = pool
            .medium
            .iter()
            .chain(&pool.high)
            .map(|r| SupplyEntry {
                resource: *r,
                amount: 1,
                available: 1,
            })
            .collect();
        let city = City::new(ids.insert(()), "Full", 6, Coords::new(0.0, 0.0), &config)
            .with_supply(supply);

        assert!(matches!(
            city.roll_new_resource(&mut rng, &pool),
            Err(NardisError::ResourcePoolExhausted(_))
        ));
    }

    #[test]
    fn refill_restores_supply_after_interval() {
        let (resources, mut ids) = world();
        let pool = ResourcePool::from_resources(&resources);
        let config = CityConfig::default();
        let mut rng = GameRng::seed_from_u64(2);
        let supply = pool
            .low
            .iter()
            .map(|r| SupplyEntry {
                resource: *r,
                amount: 2,
                available: 1,
            })
            .collect();
        let mut city = City::new(ids.insert(()), "Whitby", 2, Coords::new(0.0, 0.0), &config)
            .with_supply(supply)
            .with_rates(0.0, 2);

        for turn in 1..=3 {
            city.handle_turn(CityTurn {
                rng: &mut rng,
                pool: &pool,
                config: &config,
            })
            .unwrap();
            let expected = if turn == 3 { 2 } else { 1 };
            assert_eq!(city.supply[0].available, expected, "turn {turn}");
        }
        assert_eq!(city.size, 2);
    }

    #[test]
    fn growth_adds_resources_and_capacity() {
        let (resources, mut ids) = world();
        let pool = ResourcePool::from_resources(&resources);
        let config = CityConfig::default();
        let mut rng = GameRng::seed_from_u64(3);
        let mut city = City::new(ids.insert(()), "Leeds", 1, Coords::new(0.0, 0.0), &config)
            .with_rates(config.growth_decision_target, 3);
        city.fill_baskets(&mut rng, &pool, &config).unwrap();
        assert_eq!(city.supply.len(), config.resources_for_size(1));

        for _ in 0..40 {
            city.handle_turn(CityTurn {
                rng: &mut rng,
                pool: &pool,
                config: &config,
            })
            .unwrap();
            if city.size > 1 {
                break;
            }
        }

        assert_eq!(city.size, 2);
        assert_eq!(city.supply.len(), config.resources_for_size(2));
        assert_eq!(city.demand.len(), config.resources_for_size(2));
        assert_eq!(city.max_concurrent_routes, config.max_routes_for_size(2));
        for entry in &city.supply {
            assert!(!city.demands(entry.resource));
        }
    }

    #[test]
    fn route_slots_are_capped() {
        let mut ids: SlotMap<CityId, ()> = SlotMap::with_key();
        let config = CityConfig::default();
        let mut city = City::new(ids.insert(()), "Tiny", 1, Coords::new(0.0, 0.0), &config);
        assert!(city.add_route());
        assert!(!city.add_route());
        assert_eq!(city.current_route_count, 1);
        city.remove_route();
        city.remove_route();
        assert_eq!(city.current_route_count, 0);
    }

    #[test]
    fn distance_matches_known_pair() {
        let mut ids: SlotMap<CityId, ()> = SlotMap::with_key();
        let config = CityConfig::default();
        let whitby = City::new(ids.insert(()), "Whitby", 2, Coords::new(54.4863, 0.6133), &config);
        let carlisle = City::new(ids.insert(()), "Carlisle", 4, Coords::new(54.88, -2.93), &config);

        assert_eq!(whitby.distance_to(&carlisle, config.planet_radius_km), 232);
        assert_eq!(carlisle.distance_to(&whitby, config.planet_radius_km), 232);
        assert_eq!(whitby.distance_to(&whitby, config.planet_radius_km), SELF_DISTANCE);
    }
}
