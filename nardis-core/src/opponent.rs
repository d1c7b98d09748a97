use serde::{Deserialize, Serialize};
use slotmap::{SecondaryMap, SlotMap};

use crate::city::{City, SupplyEntry};
use crate::config::GameConfig;
use crate::player::Player;
use crate::route::{CargoItem, RoutePlanCargo};
use crate::train::{Train, Upgrade, effective_speed, effective_upkeep};
use crate::types::{CityId, PlayerId, PlayerLevel, RouteId, TrainId, UpgradeId};
use crate::world::GameData;

// ============================================================================
// Constants for AI behavior
// ============================================================================

/// The lowest-value supply entries a city offers are used to top up spare
/// cargo space rather than chosen for profit.
pub const FILLER_COUNT: usize = 2;

/// Cargo space weights passed to the train ratio: `speed + 4 * cargo_space`
const CARGO_SPACE_WEIGHT: f64 = 4.0;

// ============================================================================
// Save state
// ============================================================================

/// What an opponent is hoarding gold for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "goal")]
pub enum SaveGoal {
    Buyout { target: PlayerId },
    Route,
}

/// A multi-turn pause on spending toward one goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveState {
    pub goal: SaveGoal,
    pub turn_initiated: u32,
    pub duration: u32,
}

impl SaveState {
    pub fn new(goal: SaveGoal, turn_initiated: u32, duration: u32) -> Self {
        Self {
            goal,
            turn_initiated,
            duration,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveStep {
    Waiting,
    Resume(SaveGoal),
}

pub fn save_step(state: &SaveState, turn: u32) -> SaveStep {
    if turn >= state.turn_initiated.saturating_add(state.duration) {
        SaveStep::Resume(state.goal)
    } else {
        SaveStep::Waiting
    }
}

// ============================================================================
// Decisions - Output of AI reasoning
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockDecision {
    Buy(PlayerId),
    Sell(PlayerId),
    Hold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuyoutDecision {
    Buyout(PlayerId),
    Save(PlayerId),
    Pass,
}

/// A route the AI could queue, already priced and scored.
#[derive(Debug, Clone)]
pub struct RouteCandidate {
    pub origin: CityId,
    pub destination: CityId,
    pub train: TrainId,
    pub plan: RoutePlanCargo,
    pub distance: i64,
    pub track_cost: i64,
    /// Track plus train
    pub total_cost: i64,
    /// Expected gold per turn over one revolution
    pub score: f64,
}

#[derive(Debug, Clone, Default)]
pub struct RoutePlan {
    pub picks: Vec<RouteCandidate>,
    /// Good candidates exist but none is affordable yet.
    pub start_saving: bool,
}

// ============================================================================
// AI Logic
// ============================================================================

/// Step 1: every unowned, unlocked upgrade the opponent can pay for, cheapest
/// first.
pub fn decide_upgrades(player: &Player, data: &GameData) -> Vec<UpgradeId> {
    let mut catalog: Vec<&Upgrade> = data
        .upgrades
        .values()
        .filter(|u| u.level_required <= player.level && !player.owns_upgrade(u.id))
        .collect();
    catalog.sort_by_key(|u| u.cost);

    let mut budget = player.finance.gold;
    let mut picks = Vec::new();
    for upgrade in catalog {
        if upgrade.cost <= budget {
            budget -= upgrade.cost;
            picks.push(upgrade.id);
        }
    }
    picks
}

/// Step 2: buy, sell or hold one share.
///
/// A broke and unprofitable opponent liquidates its most valuable rival
/// position. A profitable one buys the cheapest rival share it still has room
/// for.
pub fn decide_stock(
    player: &Player,
    players: &SlotMap<PlayerId, Player>,
    config: &GameConfig,
) -> StockDecision {
    let profitable = player.finance.is_profitable();
    let broke = player.finance.gold < config.opponent.broke_threshold;

    let rivals = || {
        players
            .values()
            .filter(move |p| p.id != player.id && p.is_active && p.stock.is_active)
    };

    if broke && !profitable {
        return rivals()
            .filter(|p| player.finance.shares_in(p.id) > 0)
            .max_by_key(|p| p.stock.get_sell_value())
            .map_or(StockDecision::Hold, |p| StockDecision::Sell(p.id));
    }

    if profitable {
        return rivals()
            .filter(|p| {
                !p.stock.is_fully_issued(&config.stock)
                    && player.finance.shares_in(p.id) < config.opponent.max_holdings_per_stock
                    && player.finance.gold - p.stock.get_buy_value(&config.stock)
                        >= config.opponent.stock_reserve
            })
            .min_by_key(|p| p.stock.get_buy_value(&config.stock))
            .map_or(StockDecision::Hold, |p| StockDecision::Buy(p.id));
    }

    StockDecision::Hold
}

/// Whether the opponent is in a position to buy more track this turn.
pub fn should_purchase_route(player: &Player, config: &GameConfig) -> bool {
    player.queue.len() < config.opponent.max_queue_length
        && player.finance.gold > config.opponent.route_reserve
}

/// Cheapest train per unit of `speed + 4 * cargo_space` among those the level
/// unlocks. Ties go to the bigger hold.
pub fn suggest_train(data: &GameData, level: PlayerLevel) -> Option<&Train> {
    let ratio = |t: &Train| {
        t.cost as f64 / (f64::from(t.speed) + CARGO_SPACE_WEIGHT * f64::from(t.cargo_space)).max(1.0)
    };
    data.trains
        .values()
        .filter(|t| t.level_required <= level)
        .min_by(|a, b| {
            ratio(a)
                .total_cmp(&ratio(b))
                .then_with(|| b.cargo_space.cmp(&a.cargo_space))
        })
}

/// Fill `capacity` with the most valuable supply the destination wants, then
/// pad with the origin's cheapest resources.
pub fn suggest_cargo(origin: &City, destination: &City, data: &GameData, capacity: u32) -> Vec<CargoItem> {
    let mut by_value: Vec<&SupplyEntry> = origin.supply.iter().collect();
    by_value.sort_by_key(|e| data.resource_value(e.resource));
    let (fillers, remainder) = by_value.split_at(by_value.len().min(FILLER_COUNT));

    let mut remaining = capacity;
    let mut cargo = Vec::new();
    let mut load = |entry: &SupplyEntry, remaining: &mut u32| {
        let weight = data.resources.get(entry.resource).map_or(1, |r| r.weight.max(1));
        let units = entry.available.min(*remaining / weight);
        if units > 0 {
            cargo.push(CargoItem::planned(entry.resource, units));
            *remaining -= units * weight;
        }
    };

    for entry in remainder.iter().rev().filter(|e| destination.demands(e.resource)) {
        load(*entry, &mut remaining);
    }
    for entry in fillers.iter().rev() {
        load(*entry, &mut remaining);
    }
    cargo
}

/// Gold a leg's cargo is worth on arrival at `destination`.
pub fn cargo_value(cargo: &[CargoItem], destination: &City, data: &GameData) -> i64 {
    cargo
        .iter()
        .filter(|item| destination.demands(item.resource))
        .map(|item| i64::from(item.target_amount) * data.resource_value(item.resource))
        .sum()
}

/// Every new connection out of a city the opponent already touches, scored by
/// expected gold per turn.
pub fn route_candidates(player: &Player, train: &Train, data: &GameData, config: &GameConfig) -> Vec<RouteCandidate> {
    let owned: Vec<&Upgrade> = player.owned_upgrades(data).collect();
    let speed = effective_speed(train, owned.iter().copied());
    let upkeep = effective_upkeep(train, owned.iter().copied());
    let radius = config.city.planet_radius_km;

    let mut candidates = Vec::new();
    for origin_id in player.touched_cities() {
        let Some(origin) = data.cities.get(origin_id) else {
            continue;
        };
        if origin.is_full() {
            continue;
        }

        for (destination_id, destination) in &data.cities {
            if destination_id == origin_id
                || destination.is_full()
                || player.has_route_between(origin_id, destination_id)
            {
                continue;
            }
            let distance = origin.distance_to(destination, radius);
            if distance <= 0 || distance > i64::from(player.range) {
                continue;
            }

            let plan = RoutePlanCargo {
                city_one: suggest_cargo(origin, destination, data, train.cargo_space),
                city_two: suggest_cargo(destination, origin, data, train.cargo_space),
            };
            let revenue = cargo_value(&plan.city_one, destination, data) + cargo_value(&plan.city_two, origin, data);
            let per_leg = (distance + i64::from(speed.max(1)) - 1) / i64::from(speed.max(1));
            let revolution = (2 * per_leg).max(2);
            let score = (revenue - upkeep * revolution) as f64 / revolution as f64;

            let track_cost = distance * config.route.track_cost_per_km;
            candidates.push(RouteCandidate {
                origin: origin_id,
                destination: destination_id,
                train: train.id,
                plan,
                distance,
                track_cost,
                total_cost: track_cost + train.cost,
                score,
            });
        }
    }
    candidates
}

/// Step 3: choose which candidates to queue this turn.
pub fn plan_routes(player: &Player, data: &GameData, config: &GameConfig) -> RoutePlan {
    let Some(train) = suggest_train(data, player.level) else {
        return RoutePlan::default();
    };

    let worthwhile: Vec<RouteCandidate> = route_candidates(player, train, data, config)
        .into_iter()
        .filter(|c| c.score > 0.0)
        .collect();

    let budget = player.finance.gold - config.opponent.route_reserve;
    let mut affordable: Vec<RouteCandidate> = worthwhile
        .iter()
        .filter(|c| c.total_cost <= budget)
        .cloned()
        .collect();
    if affordable.is_empty() {
        return RoutePlan {
            picks: Vec::new(),
            start_saving: !worthwhile.is_empty(),
        };
    }
    affordable.sort_by(|a, b| b.score.total_cmp(&a.score));

    let limit = (config.opponent.routes_per_turn_base + player.level.index())
        .min(config.opponent.max_queue_length.saturating_sub(player.queue.len()));

    let mut slots: SecondaryMap<CityId, u32> = SecondaryMap::new();
    for (id, city) in &data.cities {
        slots.insert(id, city.max_concurrent_routes.saturating_sub(city.current_route_count));
    }

    let mut spent = 0;
    let mut picks = Vec::new();
    for candidate in affordable {
        if picks.len() >= limit {
            break;
        }
        let free = |id: CityId| slots.get(id).copied().unwrap_or(0) > 0;
        if !free(candidate.origin) || !free(candidate.destination) || spent + candidate.total_cost > budget {
            continue;
        }
        for id in [candidate.origin, candidate.destination] {
            if let Some(left) = slots.get_mut(id) {
                *left -= 1;
            }
        }
        spent += candidate.total_cost;
        picks.push(candidate);
    }

    RoutePlan {
        picks,
        start_saving: false,
    }
}

/// Step 4: routes that have lost money for at least two full revolutions.
pub fn unprofitable_routes(player: &Player, data: &GameData, turn: u32) -> Vec<RouteId> {
    let owned: Vec<&Upgrade> = player.owned_upgrades(data).collect();
    player
        .routes
        .iter()
        .filter(|route| {
            let speed = data
                .trains
                .get(route.train)
                .map_or(1, |t| effective_speed(t, owned.iter().copied()));
            let age = turn.saturating_sub(route.purchased_on_turn);
            route.profit < 0 && age >= 2 * route.revolution_turns(speed)
        })
        .map(|route| route.id)
        .collect()
}

/// Gold `player` needs to take every share of `target` it does not hold.
pub fn buyout_cost(player: &Player, target: &Player) -> i64 {
    target
        .stock
        .supply
        .keys()
        .filter(|holder| *holder != player.id)
        .map(|holder| target.stock.buyout_value_for(holder))
        .sum()
}

/// Step 5: take over a rival now, start saving for one, or pass.
///
/// Only fully issued stocks can be bought out. Saving toward a buyout is
/// reserved for Advanced players and up.
pub fn decide_buyout(
    player: &Player,
    players: &SlotMap<PlayerId, Player>,
    config: &GameConfig,
) -> BuyoutDecision {
    let mut targets: Vec<(&Player, i64)> = players
        .values()
        .filter(|p| {
            p.id != player.id && p.is_active && p.stock.is_active && p.stock.is_fully_issued(&config.stock)
        })
        .map(|p| (p, buyout_cost(player, p)))
        .collect();
    targets.sort_by_key(|(_, cost)| *cost);

    if let Some((target, _)) = targets
        .iter()
        .find(|(_, cost)| player.finance.gold - cost >= config.opponent.buyout_reserve)
    {
        return BuyoutDecision::Buyout(target.id);
    }

    if player.level >= PlayerLevel::Advanced && player.save_state().is_none() {
        if let Some((target, _)) = targets
            .iter()
            .find(|(p, _)| player.finance.shares_in(p.id) > 0)
        {
            return BuyoutDecision::Save(target.id);
        }
    }

    BuyoutDecision::Pass
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::city::DemandEntry;
    use crate::player::PlayerKind;
    use crate::resource::Resource;
    use crate::types::{Coords, UpgradeType, YieldTier};

    fn train(data: &mut GameData, name: &str, cost: i64, speed: u32, cargo_space: u32, level: PlayerLevel) -> TrainId {
        data.trains.insert_with_key(|id| Train {
            id,
            name: name.into(),
            cost,
            upkeep: 40,
            speed,
            cargo_space,
            level_required: level,
        })
    }

    fn resource(data: &mut GameData, name: &str, value: i64, weight: u32) -> crate::types::ResourceId {
        data.resources
            .insert_with_key(|id| Resource::new(id, name, YieldTier::Medium, value, (1, 5000), weight, 0.1))
    }

    fn supply(resource: crate::types::ResourceId, available: u32) -> SupplyEntry {
        SupplyEntry {
            resource,
            amount: available,
            available,
        }
    }

    fn computer(players: &mut SlotMap<PlayerId, Player>, start: CityId, config: &GameConfig) -> PlayerId {
        players.insert_with_key(|id| Player::new(id, "Bot", PlayerKind::Computer { save: None }, start, config))
    }

    #[test]
    fn save_resumes_after_duration() {
        let state = SaveState::new(SaveGoal::Route, 10, 5);
        assert_eq!(save_step(&state, 10), SaveStep::Waiting);
        assert_eq!(save_step(&state, 14), SaveStep::Waiting);
        assert_eq!(save_step(&state, 15), SaveStep::Resume(SaveGoal::Route));
    }

    #[test]
    fn train_ratio_prefers_bigger_hold_on_ties() {
        let mut data = GameData::new();
        // 10_000 / (60 + 40) = 100
        train(&mut data, "Small", 10_000, 60, 10, PlayerLevel::Novice);
        // 12_000 / (40 + 80) = 100
        let big = train(&mut data, "Big", 12_000, 40, 20, PlayerLevel::Novice);
        // Better ratio, but locked
        train(&mut data, "Locked", 1_000, 100, 30, PlayerLevel::Master);

        assert_eq!(suggest_train(&data, PlayerLevel::Novice).map(|t| t.id), Some(big));
        assert_eq!(suggest_train(&data, PlayerLevel::Master).map(|t| t.name.as_str()), Some("Locked"));
    }

    #[test]
    fn cargo_fills_demanded_first_then_fillers() {
        let mut data = GameData::new();
        let config = GameConfig::default();
        let mail = resource(&mut data, "Mail", 20, 1);
        let grain = resource(&mut data, "Grain", 150, 2);
        let coal = resource(&mut data, "Coal", 300, 2);
        let steel = resource(&mut data, "Steel", 900, 4);
        let silk = resource(&mut data, "Silk", 1200, 4);

        let origin = data.cities.insert_with_key(|id| {
            City::new(id, "Here", 4, Coords::new(0.0, 0.0), &config.city).with_supply(vec![
                supply(mail, 10),
                supply(grain, 10),
                supply(coal, 10),
                supply(steel, 1),
                supply(silk, 5),
            ])
        });
        let destination = data.cities.insert_with_key(|id| {
            City::new(id, "There", 4, Coords::new(0.0, 1.0), &config.city)
                .with_demand(vec![DemandEntry { resource: steel }, DemandEntry { resource: coal }])
        });

        let cargo = suggest_cargo(&data.cities[origin], &data.cities[destination], &data, 12);
        // steel 1 (4 space), coal 4 (8 space); silk is not demanded
        assert_eq!(cargo, vec![CargoItem::planned(steel, 1), CargoItem::planned(coal, 4)]);

        let cargo = suggest_cargo(&data.cities[origin], &data.cities[destination], &data, 27);
        // 4 + 20 demanded, then grain 1 (2 space), then mail 1
        assert_eq!(
            cargo,
            vec![
                CargoItem::planned(steel, 1),
                CargoItem::planned(coal, 10),
                CargoItem::planned(grain, 1),
                CargoItem::planned(mail, 1),
            ]
        );
    }

    #[test]
    fn upgrades_respect_level_and_budget() {
        let mut data = GameData::new();
        let config = GameConfig::default();
        let mut upgrade = |cost, level| {
            data.upgrades.insert_with_key(|id| crate::train::Upgrade {
                id,
                name: "u".into(),
                kind: UpgradeType::Speed,
                value: 0.1,
                level_required: level,
                cost,
            })
        };
        let cheap = upgrade(50_000, PlayerLevel::Novice);
        let pricey = upgrade(120_000, PlayerLevel::Novice);
        let mid = upgrade(100_000, PlayerLevel::Novice);
        let _locked = upgrade(10, PlayerLevel::Master);
        let start = data
            .cities
            .insert_with_key(|id| City::new(id, "Home", 2, Coords::new(0.0, 0.0), &config.city));

        let mut players = SlotMap::with_key();
        let bot = computer(&mut players, start, &config);
        assert_eq!(decide_upgrades(&players[bot], &data), vec![cheap, mid]);

        players[bot].upgrades.push(cheap);
        assert_eq!(decide_upgrades(&players[bot], &data), vec![mid]);
        let _ = pricey;
    }

    #[test]
    fn stock_decisions_follow_finances() {
        use crate::types::{FinanceType, LedgerRef};

        let mut data = GameData::new();
        let config = GameConfig::default();
        let start = data
            .cities
            .insert_with_key(|id| City::new(id, "Home", 2, Coords::new(0.0, 0.0), &config.city));
        let mut players = SlotMap::with_key();
        let bot = computer(&mut players, start, &config);
        let rival = computer(&mut players, start, &config);

        // Neither profitable nor broke
        assert_eq!(decide_stock(&players[bot], &players, &config), StockDecision::Hold);

        let coal = resource(&mut data, "Coal", 300, 2);
        players[bot]
            .finance
            .add_to_finance_income(FinanceType::Cargo, LedgerRef::Resource(coal), 1, 900, 1);
        assert_eq!(decide_stock(&players[bot], &players, &config), StockDecision::Buy(rival));

        players[bot].finance = crate::finance::Finance::new(1_000);
        players[bot].finance.add_shares(rival, 1);
        assert_eq!(decide_stock(&players[bot], &players, &config), StockDecision::Sell(rival));
    }

    #[test]
    fn buyout_needs_full_issue() {
        let mut data = GameData::new();
        let config = GameConfig::default();
        let start = data
            .cities
            .insert_with_key(|id| City::new(id, "Home", 2, Coords::new(0.0, 0.0), &config.city));
        let mut players = SlotMap::with_key();
        let bot = computer(&mut players, start, &config);
        let rival = computer(&mut players, start, &config);

        assert_eq!(decide_buyout(&players[bot], &players, &config), BuyoutDecision::Pass);

        for _ in 0..6 {
            assert!(players[rival].stock.buy_stock(bot, &config.stock));
            players[bot].finance.add_shares(rival, 1);
        }
        // Only the owner's four shares need paying for
        let cost = buyout_cost(&players[bot], &players[rival]);
        assert_eq!(cost, 4 * players[rival].stock.get_sell_value());
        assert_eq!(decide_buyout(&players[bot], &players, &config), BuyoutDecision::Buyout(rival));

        players[bot].finance.gold = cost;
        assert_eq!(decide_buyout(&players[bot], &players, &config), BuyoutDecision::Pass);
        players[bot].level = PlayerLevel::Advanced;
        assert_eq!(decide_buyout(&players[bot], &players, &config), BuyoutDecision::Save(rival));
    }

    #[test]
    fn plan_routes_picks_best_affordable_and_signals_saving() {
        let mut data = GameData::new();
        let config = GameConfig::default();
        train(&mut data, "Rocket", 15_000, 100, 10, PlayerLevel::Novice);
        let coal = resource(&mut data, "Coal", 400, 2);
        let home = data.cities.insert_with_key(|id| {
            City::new(id, "Whitby", 3, Coords::new(54.4863, 0.6133), &config.city).with_supply(vec![supply(coal, 10)])
        });
        let near = data.cities.insert_with_key(|id| {
            City::new(id, "Carlisle", 3, Coords::new(54.88, -2.93), &config.city)
                .with_demand(vec![DemandEntry { resource: coal }])
        });
        // Beyond novice range
        data.cities.insert_with_key(|id| {
            City::new(id, "Plymouth", 3, Coords::new(50.3755, -4.1427), &config.city)
                .with_demand(vec![DemandEntry { resource: coal }])
        });

        let mut players = SlotMap::with_key();
        let bot = computer(&mut players, home, &config);
        let plan = plan_routes(&players[bot], &data, &config);
        assert_eq!(plan.picks.len(), 1);
        let pick = &plan.picks[0];
        assert_eq!((pick.origin, pick.destination), (home, near));
        assert_eq!(pick.distance, 232);
        assert_eq!(pick.total_cost, 232 * 30 + 15_000);
        assert!(!plan.start_saving);

        players[bot].finance.gold = config.opponent.route_reserve + 100;
        let plan = plan_routes(&players[bot], &data, &config);
        assert!(plan.picks.is_empty());
        assert!(plan.start_saving);
    }
}
