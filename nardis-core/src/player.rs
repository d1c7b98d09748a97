// Player type: gold, routes, upgrades and a stock, human or computer

use serde::{Deserialize, Serialize};

use crate::config::{GameConfig, LevelConfig, LogConfig};
use crate::error::NardisError;
use crate::finance::Finance;
use crate::opponent::SaveState;
use crate::route::{Route, RouteTurn};
use crate::stock::Stock;
use crate::train::{Upgrade, effective_speed};
use crate::types::{
    CityId, Identifiable, PlayerId, PlayerLevel, PlayerType, RouteId, TurnAdvanceable, UpgradeId,
};
use crate::world::GameData;

/// A route still under construction. It activates when `turn_cost` hits zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedRoute {
    pub route: Route,
    pub turn_cost: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PlayerKind {
    Human,
    Computer { save: Option<SaveState> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub start_gold: i64,
    pub kind: PlayerKind,
    pub start_city: CityId,
    pub finance: Finance,
    pub level: PlayerLevel,
    /// Longest route in km this player may build
    pub range: u32,
    pub queue: Vec<QueuedRoute>,
    pub routes: Vec<Route>,
    pub upgrades: Vec<UpgradeId>,
    pub is_active: bool,
    pub stock: Stock,
}

impl Player {
    pub fn new(
        id: PlayerId,
        name: impl Into<String>,
        kind: PlayerKind,
        start_city: CityId,
        config: &GameConfig,
    ) -> Self {
        let name = name.into();
        let stock = Stock::new(id, name.clone(), &config.stock);
        let mut finance = Finance::new(config.start_gold);
        finance.add_shares(id, stock.shares_held_by(id));
        Self {
            id,
            stock,
            name,
            start_gold: config.start_gold,
            kind,
            start_city,
            finance,
            level: PlayerLevel::Novice,
            range: config.level.range_for(PlayerLevel::Novice),
            queue: Vec::new(),
            routes: Vec::new(),
            upgrades: Vec::new(),
            is_active: true,
        }
    }

    pub fn player_type(&self) -> PlayerType {
        match self.kind {
            PlayerKind::Human => PlayerType::Human,
            PlayerKind::Computer { .. } => PlayerType::Computer,
        }
    }

    pub fn is_computer(&self) -> bool {
        matches!(self.kind, PlayerKind::Computer { .. })
    }

    pub fn save_state(&self) -> Option<&SaveState> {
        match &self.kind {
            PlayerKind::Computer { save } => save.as_ref(),
            PlayerKind::Human => None,
        }
    }

    pub fn set_save_state(&mut self, state: Option<SaveState>) {
        if let PlayerKind::Computer { save } = &mut self.kind {
            *save = state;
        }
    }

    pub fn owns_upgrade(&self, upgrade: UpgradeId) -> bool {
        self.upgrades.contains(&upgrade)
    }

    pub fn owned_upgrades<'a>(&'a self, data: &'a GameData) -> impl Iterator<Item = &'a Upgrade> + 'a {
        data.upgrades_from(&self.upgrades)
    }

    // === Routes ===

    pub fn route(&self, id: RouteId) -> Option<&Route> {
        self.routes.iter().find(|r| r.id == id)
    }

    pub fn route_mut(&mut self, id: RouteId) -> Option<&mut Route> {
        self.routes.iter_mut().find(|r| r.id == id)
    }

    pub fn queued(&self, id: RouteId) -> Option<&QueuedRoute> {
        self.queue.iter().find(|q| q.route.id == id)
    }

    /// Active routes followed by queued ones.
    pub fn all_routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter().chain(self.queue.iter().map(|q| &q.route))
    }

    /// Whether an active or queued route already links these two cities.
    pub fn has_route_between(&self, a: CityId, b: CityId) -> bool {
        self.all_routes().any(|r| r.connects(a, b))
    }

    /// Every city this player can currently build out from.
    pub fn touched_cities(&self) -> Vec<CityId> {
        let mut cities = vec![self.start_city];
        for route in self.all_routes() {
            for city in [route.city_one, route.city_two] {
                if !cities.contains(&city) {
                    cities.push(city);
                }
            }
        }
        cities
    }

    // === Levels ===

    /// Promote one rung if the next level's requirements are met.
    pub fn check_level_up(&mut self, config: &LevelConfig) -> Option<PlayerLevel> {
        let next = self.level.next()?;
        let requirement = config.requirement_for(next)?;
        let eligible = self.routes.len() >= requirement.routes
            && self.finance.get_average_revenue() >= requirement.average_revenue
            && self.finance.gold >= requirement.gold;
        if !eligible {
            return None;
        }
        self.level = next;
        self.range = config.range_for(next);
        Some(next)
    }

    // === Turn phases ===

    /// Tick construction and activate finished routes.
    fn process_queue(&mut self, data: &mut GameData) -> crate::Result<()> {
        let mut index = 0;
        while let Some(queued) = self.queue.get_mut(index) {
            queued.turn_cost = queued.turn_cost.saturating_sub(1);
            if queued.turn_cost > 0 {
                index += 1;
                continue;
            }
            // A failed departure leaves the route queued.
            queued.route.depart(&mut data.cities)?;
            let finished = self.queue.remove(index);
            self.routes.push(finished.route);
        }
        Ok(())
    }

    fn advance_routes(&mut self, data: &mut GameData) -> crate::Result<()> {
        let GameData {
            trains,
            upgrades,
            cities,
            ..
        } = data;
        let owned: Vec<&Upgrade> = self
            .upgrades
            .iter()
            .filter_map(|id| upgrades.get(*id))
            .collect();

        for route in &mut self.routes {
            let train = trains
                .get(route.train)
                .ok_or_else(|| NardisError::dangling(format!("route {}", route.name), "train"))?;
            let speed = effective_speed(train, owned.iter().copied());
            route.handle_turn(RouteTurn {
                cities: &mut *cities,
                speed,
            })?;
        }
        Ok(())
    }
}

pub struct PlayerTurn<'a> {
    pub data: &'a mut GameData,
    pub turn: u32,
    pub config: &'a GameConfig,
    pub log: &'a LogConfig,
}

impl TurnAdvanceable for Player {
    type Context<'a> = PlayerTurn<'a>;

    fn handle_turn(&mut self, ctx: PlayerTurn<'_>) -> crate::Result<()> {
        if !self.is_active {
            return Ok(());
        }

        if let Some(level) = self.check_level_up(&ctx.config.level) {
            if ctx.log.turns {
                tracing::info!(
                    target: "nardis::turn",
                    turn = ctx.turn,
                    player = %self.name,
                    level = ?level,
                    range = self.range,
                    "level up"
                );
            }
        }

        let activating = self.queue.iter().filter(|q| q.turn_cost <= 1).count();
        self.process_queue(ctx.data)?;
        self.advance_routes(ctx.data)?;

        let gold_before = self.finance.gold;
        self.finance
            .settle_turn(&mut self.routes, &self.upgrades, ctx.data, ctx.turn);

        if ctx.log.finance {
            tracing::info!(
                target: "nardis::finance",
                turn = ctx.turn,
                player = %self.name,
                gold = self.finance.gold,
                delta = self.finance.gold - gold_before,
                routes = self.routes.len(),
                activated = activating,
                "settled"
            );
        }
        Ok(())
    }
}

impl Identifiable for Player {
    type Id = PlayerId;

    fn id(&self) -> PlayerId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl PartialEq for Player {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::city::{City, DemandEntry, SupplyEntry};
    use crate::resource::Resource;
    use crate::route::{CargoItem, RoutePlanCargo};
    use crate::train::Train;
    use crate::types::{Coords, YieldTier};
    use slotmap::SlotMap;

    struct Fixture {
        data: GameData,
        player: Player,
        one: CityId,
        two: CityId,
        coal: crate::types::ResourceId,
        config: GameConfig,
    }

    fn fixture() -> Fixture {
        let config = GameConfig::default();
        let mut data = GameData::new();
        let coal = data
            .resources
            .insert_with_key(|id| Resource::new(id, "Coal", YieldTier::Medium, 200, (100, 600), 2, 0.2));
        data.trains.insert_with_key(|id| Train {
            id,
            name: "Rocket".into(),
            cost: 15_000,
            upkeep: 50,
            speed: 100,
            cargo_space: 10,
            level_required: PlayerLevel::Novice,
        });
        let one = data.cities.insert_with_key(|id| {
            City::new(id, "Whitby", 3, Coords::new(54.4863, 0.6133), &config.city).with_supply(vec![
                SupplyEntry {
                    resource: coal,
                    amount: 10,
                    available: 10,
                },
            ])
        });
        let two = data.cities.insert_with_key(|id| {
            City::new(id, "Carlisle", 3, Coords::new(54.88, -2.93), &config.city)
                .with_demand(vec![DemandEntry { resource: coal }])
        });

        let mut players: SlotMap<PlayerId, ()> = SlotMap::with_key();
        let player = Player::new(players.insert(()), "Ada", PlayerKind::Human, one, &config);
        Fixture {
            data,
            player,
            one,
            two,
            coal,
            config,
        }
    }

    fn queue_route(f: &mut Fixture, turn_cost: u32) {
        let train = f.data.trains.keys().next().unwrap();
        let plan = RoutePlanCargo {
            city_one: vec![CargoItem::planned(f.coal, 4)],
            city_two: Vec::new(),
        };
        let route = Route::new(RouteId::new(1), "Whitby - Carlisle", (f.one, f.two), train, plan, 200, 6000, 0);
        f.player.queue.push(QueuedRoute { route, turn_cost });
    }

    fn turn(f: &mut Fixture, turn: u32) {
        let log = LogConfig::default();
        f.player
            .handle_turn(PlayerTurn {
                data: &mut f.data,
                turn,
                config: &f.config,
                log: &log,
            })
            .unwrap();
    }

    #[test]
    fn queued_route_activates_then_earns() {
        let mut f = fixture();
        queue_route(&mut f, 2);

        turn(&mut f, 1);
        assert_eq!(f.player.queue.len(), 1);
        assert!(f.player.routes.is_empty());

        // Activates, loads 4 coal, travels 100 of 200 km
        turn(&mut f, 2);
        assert_eq!(f.player.routes.len(), 1);
        assert_eq!(f.data.cities[f.one].supply[0].available, 6);
        assert!(!f.player.routes[0].route_state.has_arrived);

        let gold = f.player.finance.gold;
        turn(&mut f, 3);
        let route = &f.player.routes[0];
        assert!(route.route_state.has_arrived);
        // 4 coal * 200 minus 50 upkeep
        assert_eq!(f.player.finance.gold, gold + 800 - 50);
        assert_eq!(route.profit, 800 - 100);
    }

    #[test]
    fn failed_departure_keeps_the_queue() {
        let mut f = fixture();
        queue_route(&mut f, 3);
        queue_route(&mut f, 1);
        f.data.cities[f.one].supply.clear();

        let log = LogConfig::default();
        let result = f.player.handle_turn(PlayerTurn {
            data: &mut f.data,
            turn: 1,
            config: &f.config,
            log: &log,
        });

        assert!(matches!(result, Err(NardisError::CorruptCargoPlan { resource, .. }) if resource == f.coal));
        assert_eq!(f.player.queue.len(), 2);
        assert_eq!(f.player.queue[0].turn_cost, 2);
        assert!(f.player.routes.is_empty());
    }

    #[test]
    fn level_up_needs_every_requirement() {
        use crate::types::{FinanceType, LedgerRef};

        let mut f = fixture();
        let config = LevelConfig::default();
        assert_eq!(f.player.check_level_up(&config), None);

        queue_route(&mut f, 1);
        let template = f.player.queue.remove(0).route;
        for _ in 0..3 {
            f.player.routes.push(template.clone());
        }
        // Routes and gold are enough, revenue is not
        assert_eq!(f.player.check_level_up(&config), None);

        for turn in 0..3 {
            if turn > 0 {
                f.player.finance.history.income.shift();
            }
            f.player
                .finance
                .add_to_finance_income(FinanceType::Cargo, LedgerRef::Resource(f.coal), 1, 2000, turn);
        }
        assert_eq!(f.player.finance.get_average_revenue(), 2000);

        assert_eq!(f.player.check_level_up(&config), Some(PlayerLevel::Intermediate));
        assert_eq!(f.player.range, config.range_for(PlayerLevel::Intermediate));
        // Advanced needs six routes
        assert_eq!(f.player.check_level_up(&config), None);
    }

    #[test]
    fn inactive_players_do_nothing() {
        let mut f = fixture();
        queue_route(&mut f, 1);
        f.player.is_active = false;
        turn(&mut f, 1);
        assert_eq!(f.player.queue.len(), 1);
        assert_eq!(f.player.finance.gold, f.config.start_gold);
    }
}
