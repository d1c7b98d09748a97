//! World generation: resource catalog, train models, upgrades and cities.
//!
//! Everything here is driven by the fixed tables below plus the game RNG, so
//! one seed always produces the same world.

use rand::seq::SliceRandom;

use crate::city::{City, SupplyEntry, supply_amount};
use crate::config::GameConfig;
use crate::error::NardisError;
use crate::random::{GameRng, NameGenerator, between, between_f64};
use crate::resource::Resource;
use crate::train::{Train, Upgrade};
use crate::types::{CityId, Coords, PlayerLevel, UpgradeType, YieldTier};
use crate::world::{GameData, ResourcePool};

// ============================================================================
// Tables
// ============================================================================

pub struct TierSpec {
    pub tier: YieldTier,
    pub names: &'static [&'static str],
    pub value: (i64, i64),
    pub bounds: (i64, i64),
    pub weight: u32,
    pub volatility: (f64, f64),
}

pub const RESOURCE_TIERS: [TierSpec; 3] = [
    TierSpec {
        tier: YieldTier::Low,
        names: &["Passengers", "Mail"],
        value: (30, 80),
        bounds: (20, 120),
        weight: 1,
        volatility: (0.05, 0.3),
    },
    TierSpec {
        tier: YieldTier::Medium,
        names: &[
            "Grain",
            "Timber",
            "Coal",
            "Wool",
            "Fish",
            "Iron Ore",
            "Livestock",
            "Textiles",
        ],
        value: (150, 400),
        bounds: (100, 600),
        weight: 2,
        volatility: (0.15, 0.5),
    },
    TierSpec {
        tier: YieldTier::High,
        names: &["Steel", "Machinery", "Silver", "Silk", "Spices", "Chemicals"],
        value: (600, 1500),
        bounds: (400, 2200),
        weight: 4,
        volatility: (0.3, 0.8),
    },
];

pub struct TrainModel {
    pub name: &'static str,
    pub level: PlayerLevel,
    pub cost: (i64, i64),
    pub upkeep: (i64, i64),
    pub speed: (i64, i64),
    pub cargo_space: (i64, i64),
}

pub const TRAIN_MODELS: [TrainModel; 6] = [
    TrainModel {
        name: "Rocket",
        level: PlayerLevel::Novice,
        cost: (12_000, 18_000),
        upkeep: (40, 60),
        speed: (40, 60),
        cargo_space: (8, 10),
    },
    TrainModel {
        name: "Pioneer",
        level: PlayerLevel::Novice,
        cost: (20_000, 26_000),
        upkeep: (60, 90),
        speed: (50, 70),
        cargo_space: (10, 14),
    },
    TrainModel {
        name: "Express",
        level: PlayerLevel::Intermediate,
        cost: (32_000, 40_000),
        upkeep: (90, 120),
        speed: (80, 100),
        cargo_space: (12, 16),
    },
    TrainModel {
        name: "Goliath",
        level: PlayerLevel::Intermediate,
        cost: (38_000, 46_000),
        upkeep: (110, 150),
        speed: (50, 70),
        cargo_space: (20, 26),
    },
    TrainModel {
        name: "Meteor",
        level: PlayerLevel::Advanced,
        cost: (60_000, 75_000),
        upkeep: (150, 200),
        speed: (110, 140),
        cargo_space: (18, 22),
    },
    TrainModel {
        name: "Titan",
        level: PlayerLevel::Master,
        cost: (90_000, 110_000),
        upkeep: (220, 300),
        speed: (120, 150),
        cargo_space: (28, 34),
    },
];

pub struct UpgradeSpec {
    pub name: &'static str,
    pub kind: UpgradeType,
    pub value: f64,
    pub level: PlayerLevel,
    pub cost: i64,
}

pub const UPGRADES: [UpgradeSpec; 8] = [
    UpgradeSpec {
        name: "Greased Axles",
        kind: UpgradeType::Speed,
        value: 0.05,
        level: PlayerLevel::Novice,
        cost: 8_000,
    },
    UpgradeSpec {
        name: "Coal Rationing",
        kind: UpgradeType::Upkeep,
        value: 0.05,
        level: PlayerLevel::Novice,
        cost: 6_000,
    },
    UpgradeSpec {
        name: "Steam Injectors",
        kind: UpgradeType::Speed,
        value: 0.1,
        level: PlayerLevel::Intermediate,
        cost: 20_000,
    },
    UpgradeSpec {
        name: "Depot Network",
        kind: UpgradeType::Upkeep,
        value: 0.1,
        level: PlayerLevel::Intermediate,
        cost: 18_000,
    },
    UpgradeSpec {
        name: "Superheaters",
        kind: UpgradeType::Speed,
        value: 0.15,
        level: PlayerLevel::Advanced,
        cost: 45_000,
    },
    UpgradeSpec {
        name: "Trained Crews",
        kind: UpgradeType::Upkeep,
        value: 0.15,
        level: PlayerLevel::Advanced,
        cost: 40_000,
    },
    UpgradeSpec {
        name: "Streamlining",
        kind: UpgradeType::Speed,
        value: 0.2,
        level: PlayerLevel::Master,
        cost: 90_000,
    },
    UpgradeSpec {
        name: "Automation",
        kind: UpgradeType::Upkeep,
        value: 0.2,
        level: PlayerLevel::Master,
        cost: 80_000,
    },
];

/// Town sites across Great Britain, (latitude, longitude).
pub const CITY_COORDINATES: [(f64, f64); 22] = [
    (54.4863, 0.6133),
    (54.88, -2.93),
    (53.4808, -2.2426),
    (53.8008, -1.5491),
    (52.4862, -1.8904),
    (51.5074, -0.1278),
    (51.4545, -2.5879),
    (50.3755, -4.1427),
    (52.6309, 1.2974),
    (52.2053, 0.1218),
    (51.752, -1.2577),
    (53.4084, -2.9916),
    (54.9783, -1.6178),
    (53.96, -1.0873),
    (55.9533, -3.1883),
    (55.8642, -4.2518),
    (56.462, -2.9707),
    (57.1497, -2.0943),
    (51.4816, -3.1791),
    (50.7184, -3.5339),
    (52.9548, -1.1581),
    (53.3811, -1.4701),
];

/// Starting sizes handed out one per city. Eight of them qualify as start
/// cities under the default config.
pub const CITY_SIZES: [u32; 22] = [1, 1, 2, 2, 2, 3, 3, 3, 4, 4, 4, 5, 5, 5, 6, 6, 7, 7, 8, 8, 9, 10];

// ============================================================================
// Generation
// ============================================================================

/// A freshly generated world, before any players are seated.
#[derive(Debug, Clone)]
pub struct World {
    pub data: GameData,
    pub pool: ResourcePool,
}

impl World {
    pub fn start_cities(&self) -> Vec<CityId> {
        self.data
            .cities
            .iter()
            .filter(|(_, city)| city.is_start_city)
            .map(|(id, _)| id)
            .collect()
    }

    /// Draw one distinct start city per player.
    pub fn pick_start_cities(&self, rng: &mut GameRng, players: usize) -> crate::Result<Vec<CityId>> {
        let mut candidates = self.start_cities();
        if candidates.len() < players {
            return Err(NardisError::InsufficientStartCities {
                needed: players,
                available: candidates.len(),
            });
        }
        candidates.shuffle(rng);
        candidates.truncate(players);
        Ok(candidates)
    }
}

pub fn generate_world(config: &GameConfig, rng: &mut GameRng, names: &mut NameGenerator) -> crate::Result<World> {
    let mut data = GameData::new();
    generate_resources(&mut data, rng, names);
    generate_trains(&mut data, rng, names);
    generate_upgrades(&mut data, names);

    let pool = ResourcePool::from_resources(&data.resources);
    generate_cities(&mut data, &pool, config, rng, names)?;

    Ok(World { data, pool })
}

fn generate_resources(data: &mut GameData, rng: &mut GameRng, names: &mut NameGenerator) {
    for spec in &RESOURCE_TIERS {
        for name in spec.names {
            names.reserve(*name);
            let value = between(rng, spec.value.0, spec.value.1);
            let volatility = between_f64(rng, spec.volatility.0, spec.volatility.1);
            data.resources.insert_with_key(|id| {
                Resource::new(id, *name, spec.tier, value, spec.bounds, spec.weight, volatility)
            });
        }
    }
}

fn generate_trains(data: &mut GameData, rng: &mut GameRng, names: &mut NameGenerator) {
    for model in &TRAIN_MODELS {
        names.reserve(model.name);
        let cost = between(rng, model.cost.0, model.cost.1);
        let upkeep = between(rng, model.upkeep.0, model.upkeep.1);
        let speed = between(rng, model.speed.0, model.speed.1) as u32;
        let cargo_space = between(rng, model.cargo_space.0, model.cargo_space.1) as u32;
        data.trains.insert_with_key(|id| Train {
            id,
            name: model.name.to_string(),
            cost,
            upkeep,
            speed,
            cargo_space,
            level_required: model.level,
        });
    }
}

fn generate_upgrades(data: &mut GameData, names: &mut NameGenerator) {
    for spec in &UPGRADES {
        names.reserve(spec.name);
        data.upgrades.insert_with_key(|id| Upgrade {
            id,
            name: spec.name.to_string(),
            kind: spec.kind,
            value: spec.value,
            level_required: spec.level,
            cost: spec.cost,
        });
    }
}

fn generate_cities(
    data: &mut GameData,
    pool: &ResourcePool,
    config: &GameConfig,
    rng: &mut GameRng,
    names: &mut NameGenerator,
) -> crate::Result<()> {
    let mut coordinates = CITY_COORDINATES;
    let mut sizes = CITY_SIZES;
    coordinates.shuffle(rng);
    sizes.shuffle(rng);

    for ((latitude, longitude), size) in coordinates.into_iter().zip(sizes) {
        let name = names.generate(rng);
        let growth_rate = between_f64(rng, config.city.growth_rate.0, config.city.growth_rate.1);
        let refill_rate = between(
            rng,
            i64::from(config.city.supply_refill_rate.0),
            i64::from(config.city.supply_refill_rate.1),
        ) as u32;

        // Every town ships both low-yield goods. Rolls fill the rest of the basket.
        let supply = pool
            .low
            .iter()
            .map(|resource| {
                let amount = supply_amount(YieldTier::Low, size, rng);
                SupplyEntry {
                    resource: *resource,
                    amount,
                    available: amount,
                }
            })
            .collect();
        let mut city = City::new(CityId::default(), name, size, Coords::new(latitude, longitude), &config.city)
            .with_rates(growth_rate, refill_rate)
            .with_supply(supply);
        city.fill_baskets(rng, pool, &config.city)?;

        data.cities.insert_with_key(|id| City { id, ..city });
    }
    Ok(())
}
