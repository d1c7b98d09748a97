use serde::{Deserialize, Serialize};
use tsify_next::Tsify;

use crate::game::Nardis;
use crate::player::Player;
use crate::route::{CargoItem, Route, RoutePlanCargo};
use crate::types::{
    Coords, KeyToU64, PlayerLevel, PlayerType, ResourceId, UpgradeType, YieldTier, key_from_u64,
};
use crate::world::GameData;

// ============================================================================
// Render snapshots (ids cross the boundary as u64)
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi)]
pub struct GameSnapshot {
    pub turn: u32,
    pub human: u64,
    pub game_over: bool,
    pub players: Vec<PlayerSnapshot>,
    pub cities: Vec<CitySnapshot>,
    pub resources: Vec<ResourceSnapshot>,
    pub trains: Vec<TrainSnapshot>,
    pub upgrades: Vec<UpgradeSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi)]
pub struct PlayerSnapshot {
    pub id: u64,
    pub name: String,
    pub player_type: PlayerType,
    pub level: PlayerLevel,
    pub range: u32,
    pub gold: i64,
    pub net_worth: i64,
    pub average_revenue: i64,
    pub average_expense: i64,
    pub total_profits: i64,
    pub start_city: u64,
    pub is_active: bool,
    pub routes: Vec<RouteSnapshot>,
    pub queue: Vec<QueuedRouteSnapshot>,
    pub upgrades: Vec<u64>,
    pub stock: StockSnapshot,
    /// Shares this player holds in each stock, by owner id.
    pub holdings: Vec<(u64, u32)>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi)]
pub struct StockSnapshot {
    pub value: i64,
    pub buy_value: i64,
    pub shares_outstanding: u32,
    pub holders: Vec<(u64, u32)>,
    pub history: Vec<(u32, i64)>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi)]
pub struct CargoSnapshot {
    pub resource: u64,
    pub target_amount: u32,
    pub actual_amount: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi)]
pub struct RouteSnapshot {
    pub id: u32,
    pub name: String,
    pub city_one: u64,
    pub city_two: u64,
    pub train: u64,
    pub distance: i64,
    pub cost: i64,
    pub profit: i64,
    pub kilometers_travelled: i64,
    pub purchased_on_turn: u32,
    pub destination: u64,
    pub distance_remaining: i64,
    pub has_arrived: bool,
    pub cargo: Vec<CargoSnapshot>,
    pub plan_city_one: Vec<CargoSnapshot>,
    pub plan_city_two: Vec<CargoSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi)]
pub struct QueuedRouteSnapshot {
    pub route: RouteSnapshot,
    pub turns_remaining: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi)]
pub struct SupplySnapshot {
    pub resource: u64,
    pub amount: u32,
    pub available: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi)]
pub struct CitySnapshot {
    pub id: u64,
    pub name: String,
    pub size: u32,
    pub coords: Coords,
    pub supply: Vec<SupplySnapshot>,
    pub demand: Vec<u64>,
    pub max_concurrent_routes: u32,
    pub current_route_count: u32,
    pub is_start_city: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi)]
pub struct ResourceSnapshot {
    pub id: u64,
    pub name: String,
    pub tier: YieldTier,
    pub value: i64,
    pub weight: u32,
    pub history: Vec<(u32, i64)>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi)]
pub struct TrainSnapshot {
    pub id: u64,
    pub name: String,
    pub cost: i64,
    pub upkeep: i64,
    pub speed: u32,
    pub cargo_space: u32,
    pub level_required: PlayerLevel,
}

#[derive(Debug, Clone, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi)]
pub struct UpgradeSnapshot {
    pub id: u64,
    pub name: String,
    pub kind: UpgradeType,
    pub value: f64,
    pub level_required: PlayerLevel,
    pub cost: i64,
}

// ============================================================================
// Command inputs
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Tsify)]
#[tsify(from_wasm_abi)]
pub struct CargoOrder {
    pub resource: u64,
    pub amount: u32,
}

/// What to load on each leg, as sent from the UI.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Tsify)]
#[tsify(from_wasm_abi)]
pub struct CargoPlanInput {
    pub city_one: Vec<CargoOrder>,
    pub city_two: Vec<CargoOrder>,
}

impl CargoPlanInput {
    pub fn into_plan(self) -> RoutePlanCargo {
        let leg = |orders: Vec<CargoOrder>| {
            orders
                .into_iter()
                .map(|o| CargoItem::planned(key_from_u64::<ResourceId>(o.resource), o.amount))
                .collect()
        };
        RoutePlanCargo {
            city_one: leg(self.city_one),
            city_two: leg(self.city_two),
        }
    }
}

// ============================================================================
// Builders
// ============================================================================

fn cargo(items: &[CargoItem]) -> Vec<CargoSnapshot> {
    items
        .iter()
        .map(|c| CargoSnapshot {
            resource: c.resource.to_u64(),
            target_amount: c.target_amount,
            actual_amount: c.actual_amount,
        })
        .collect()
}

pub fn route_snapshot(route: &Route) -> RouteSnapshot {
    RouteSnapshot {
        id: route.id.0,
        name: route.name.clone(),
        city_one: route.city_one.to_u64(),
        city_two: route.city_two.to_u64(),
        train: route.train.to_u64(),
        distance: route.distance,
        cost: route.cost,
        profit: route.profit,
        kilometers_travelled: route.kilometers_travelled,
        purchased_on_turn: route.purchased_on_turn,
        destination: route.route_state.destination.to_u64(),
        distance_remaining: route.route_state.distance,
        has_arrived: route.route_state.has_arrived,
        cargo: cargo(&route.route_state.cargo),
        plan_city_one: cargo(&route.route_plan_cargo.city_one),
        plan_city_two: cargo(&route.route_plan_cargo.city_two),
    }
}

fn player_snapshot(player: &Player, config: &crate::config::StockConfig) -> PlayerSnapshot {
    PlayerSnapshot {
        id: player.id.to_u64(),
        name: player.name.clone(),
        player_type: player.player_type(),
        level: player.level,
        range: player.range,
        gold: player.finance.gold,
        net_worth: player.finance.net_worth,
        average_revenue: player.finance.get_average_revenue(),
        average_expense: player.finance.get_average_expense(),
        total_profits: player.finance.total_profits,
        start_city: player.start_city.to_u64(),
        is_active: player.is_active,
        routes: player.routes.iter().map(route_snapshot).collect(),
        queue: player
            .queue
            .iter()
            .map(|q| QueuedRouteSnapshot {
                route: route_snapshot(&q.route),
                turns_remaining: q.turn_cost,
            })
            .collect(),
        upgrades: player.upgrades.iter().map(|u| u.to_u64()).collect(),
        stock: StockSnapshot {
            value: player.stock.value,
            buy_value: player.stock.get_buy_value(config),
            shares_outstanding: player.stock.shares_outstanding(),
            holders: player
                .stock
                .supply
                .iter()
                .map(|(holder, shares)| (holder.to_u64(), *shares))
                .collect(),
            history: player.stock.value_history.iter().map(|r| (r.turn, r.value)).collect(),
            is_active: player.stock.is_active,
        },
        holdings: player
            .finance
            .stocks
            .iter()
            .map(|(owner, shares)| (owner.to_u64(), *shares))
            .collect(),
    }
}

fn world_snapshot(data: &GameData) -> (Vec<CitySnapshot>, Vec<ResourceSnapshot>, Vec<TrainSnapshot>, Vec<UpgradeSnapshot>) {
    let cities = data
        .cities
        .iter()
        .map(|(id, c)| CitySnapshot {
            id: id.to_u64(),
            name: c.name.clone(),
            size: c.size,
            coords: c.coords,
            supply: c
                .supply
                .iter()
                .map(|s| SupplySnapshot {
                    resource: s.resource.to_u64(),
                    amount: s.amount,
                    available: s.available,
                })
                .collect(),
            demand: c.demand.iter().map(|d| d.resource.to_u64()).collect(),
            max_concurrent_routes: c.max_concurrent_routes,
            current_route_count: c.current_route_count,
            is_start_city: c.is_start_city,
        })
        .collect();

    let resources = data
        .resources
        .iter()
        .map(|(id, r)| ResourceSnapshot {
            id: id.to_u64(),
            name: r.name.clone(),
            tier: r.tier,
            value: r.value,
            weight: r.weight,
            history: r.value_history.iter().map(|h| (h.turn, h.value)).collect(),
        })
        .collect();

    let trains = data
        .trains
        .iter()
        .map(|(id, t)| TrainSnapshot {
            id: id.to_u64(),
            name: t.name.clone(),
            cost: t.cost,
            upkeep: t.upkeep,
            speed: t.speed,
            cargo_space: t.cargo_space,
            level_required: t.level_required,
        })
        .collect();

    let upgrades = data
        .upgrades
        .iter()
        .map(|(id, u)| UpgradeSnapshot {
            id: id.to_u64(),
            name: u.name.clone(),
            kind: u.kind,
            value: u.value,
            level_required: u.level_required,
            cost: u.cost,
        })
        .collect();

    (cities, resources, trains, upgrades)
}

impl Nardis {
    pub fn snapshot(&self) -> GameSnapshot {
        let (cities, resources, trains, upgrades) = world_snapshot(&self.data);
        GameSnapshot {
            turn: self.turn,
            human: self.human.to_u64(),
            game_over: self.is_game_over(),
            players: self
                .players
                .values()
                .map(|p| player_snapshot(p, &self.config.stock))
                .collect(),
            cities,
            resources,
            trains,
            upgrades,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;

    #[test]
    fn snapshot_mirrors_the_game() {
        let game = Nardis::new(GameConfig::default().with_seed(9), "Ada").unwrap();
        let snap = game.snapshot();
        assert_eq!(snap.turn, 1);
        assert_eq!(snap.players.len(), 4);
        assert_eq!(snap.cities.len(), game.data.cities.len());
        assert_eq!(snap.human, game.human.to_u64());
        let human = snap.players.iter().find(|p| p.id == snap.human).unwrap();
        assert_eq!(human.player_type, PlayerType::Human);
        assert_eq!(human.holdings, vec![(snap.human, 4)]);
        assert!(!snap.game_over);
    }

    #[test]
    fn cargo_plan_input_keeps_ids() {
        let game = Nardis::new(GameConfig::default().with_seed(9), "Ada").unwrap();
        let resource = game.data.resources.keys().next().unwrap();
        let plan = CargoPlanInput {
            city_one: vec![CargoOrder {
                resource: resource.to_u64(),
                amount: 5,
            }],
            city_two: Vec::new(),
        }
        .into_plan();
        assert_eq!(plan.city_one, vec![CargoItem::planned(resource, 5)]);
        assert!(plan.city_two.is_empty());
    }
}
