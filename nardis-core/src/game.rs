// Game orchestration: player commands, turn sequencing, takeovers.

use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use slotmap::{SecondaryMap, SlotMap};
use tsify_next::Tsify;

use crate::city::{City, CityTurn};
use crate::config::GameConfig;
use crate::generator::generate_world;
use crate::opponent::{
    BuyoutDecision, SaveGoal, SaveState, SaveStep, StockDecision, decide_buyout, decide_stock,
    decide_upgrades, plan_routes, save_step, should_purchase_route, unprofitable_routes,
};
use crate::player::{Player, PlayerKind, PlayerTurn, QueuedRoute};
use crate::random::{GameRng, NameGenerator};
use crate::resource::ResourceTurn;
use crate::route::{CargoItem, Route, RoutePlanCargo};
use crate::save::{Storage, load_game, save_game};
use crate::types::{
    CityId, FinanceType, LedgerRef, PlayerId, RouteId, TrainId, TurnAdvanceable,
    UpgradeId,
};
use crate::world::{GameData, ResourcePool};

/// Price and build time of a prospective route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi)]
pub struct RouteQuote {
    pub distance: i64,
    pub track_cost: i64,
    pub train_cost: i64,
    pub total_cost: i64,
    pub build_turns: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Standing {
    pub player: PlayerId,
    pub name: String,
    pub net_worth: i64,
    pub is_human: bool,
}

/// Mix the base seed with a turn so a reload continues deterministically.
fn turn_seed(seed: u64, turn: u32) -> u64 {
    seed ^ u64::from(turn).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

pub struct Nardis {
    pub config: GameConfig,
    pub data: GameData,
    pub pool: ResourcePool,
    pub players: SlotMap<PlayerId, Player>,
    pub human: PlayerId,
    pub turn: u32,
    next_route_id: u32,
    rng: GameRng,
    names: NameGenerator,
    storage: Option<Box<dyn Storage>>,
}

impl Nardis {
    /// Generate a world and seat the human plus `config.opponents` computers.
    pub fn new(config: GameConfig, human_name: &str) -> crate::Result<Self> {
        let mut rng = GameRng::seed_from_u64(config.seed);
        let mut names = NameGenerator::new();
        names.reserve(human_name);

        let world = generate_world(&config, &mut rng, &mut names)?;
        let starts = world.pick_start_cities(&mut rng, config.opponents + 1)?;

        let mut players = SlotMap::with_key();
        let mut human = None;
        for (seat, start) in starts.into_iter().enumerate() {
            let (name, kind) = if seat == 0 {
                (human_name.to_string(), PlayerKind::Human)
            } else {
                (names.generate(&mut rng), PlayerKind::Computer { save: None })
            };
            let id = players.insert_with_key(|id| Player::new(id, name, kind, start, &config));
            human.get_or_insert(id);
        }
        let human = human.ok_or(crate::NardisError::InsufficientStartCities {
            needed: config.opponents + 1,
            available: 0,
        })?;

        let mut game = Self {
            config,
            data: world.data,
            pool: world.pool,
            players,
            human,
            turn: 1,
            next_route_id: 1,
            rng,
            names,
            storage: None,
        };
        game.update_net_worths();

        if game.config.log.turns {
            tracing::info!(
                target: "nardis::turn",
                seed = game.config.seed,
                players = game.players.len(),
                cities = game.data.cities.len(),
                "new game"
            );
        }
        Ok(game)
    }

    /// Reassemble a game from restored arenas.
    pub(crate) fn restore(
        config: GameConfig,
        data: GameData,
        players: SlotMap<PlayerId, Player>,
        human: PlayerId,
        turn: u32,
    ) -> Self {
        let mut names = NameGenerator::new();
        for name in data
            .resources
            .values()
            .map(|r| r.name.as_str())
            .chain(data.trains.values().map(|t| t.name.as_str()))
            .chain(data.upgrades.values().map(|u| u.name.as_str()))
            .chain(data.cities.values().map(|c| c.name.as_str()))
            .chain(players.values().map(|p| p.name.as_str()))
        {
            names.reserve(name);
        }
        let next_route_id = players
            .values()
            .flat_map(|p| p.all_routes())
            .map(|r| r.id.0)
            .max()
            .map_or(1, |max| max + 1);

        Self {
            rng: GameRng::seed_from_u64(turn_seed(config.seed, turn)),
            pool: ResourcePool::from_resources(&data.resources),
            config,
            data,
            players,
            human,
            turn,
            next_route_id,
            names,
            storage: None,
        }
    }

    /// Persist after every turn into `storage`.
    pub fn with_storage(mut self, storage: Box<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn set_storage(&mut self, storage: Box<dyn Storage>) {
        self.storage = Some(storage);
    }

    pub fn take_storage(&mut self) -> Option<Box<dyn Storage>> {
        self.storage.take()
    }

    pub fn storage(&self) -> Option<&dyn Storage> {
        self.storage.as_deref()
    }

    pub fn save(&self, storage: &mut dyn Storage) -> crate::Result<()> {
        save_game(self, storage)
    }

    pub fn load(storage: &dyn Storage, config: GameConfig) -> crate::Result<Self> {
        load_game(storage, config)
    }

    // ===== QUERIES =====

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(id)
    }

    pub fn human_player(&self) -> Option<&Player> {
        self.players.get(self.human)
    }

    pub fn computers(&self) -> impl Iterator<Item = &Player> {
        self.players.values().filter(|p| p.is_computer())
    }

    pub fn is_game_over(&self) -> bool {
        self.players.get(self.human).is_none_or(|p| !p.is_active)
    }

    /// Active players ranked by net worth, richest first.
    pub fn standings(&self) -> Vec<Standing> {
        let mut standings: Vec<Standing> = self
            .players
            .values()
            .filter(|p| p.is_active)
            .map(|p| Standing {
                player: p.id,
                name: p.name.clone(),
                net_worth: p.finance.net_worth,
                is_human: p.id == self.human,
            })
            .collect();
        standings.sort_by(|a, b| b.net_worth.cmp(&a.net_worth));
        standings
    }

    pub fn generate_name(&mut self) -> String {
        self.names.generate(&mut self.rng)
    }

    // ===== ROUTE COMMANDS =====

    pub fn quote_route(&self, player: PlayerId, from: CityId, to: CityId, train: TrainId) -> Option<RouteQuote> {
        let owner = self.players.get(player)?;
        let train = self.data.trains.get(train)?;
        if from == to || train.level_required > owner.level {
            return None;
        }
        let distance = self.data.distance(from, to, self.config.city.planet_radius_km)?;
        if distance <= 0 || distance > i64::from(owner.range) {
            return None;
        }
        let track_cost = distance * self.config.route.track_cost_per_km;
        Some(RouteQuote {
            distance,
            track_cost,
            train_cost: train.cost,
            total_cost: track_cost + train.cost,
            build_turns: self.config.route.build_turns(distance),
        })
    }

    /// Whether a leg's plan only loads what `origin` supplies and fits the hold.
    fn plan_fits(&self, origin: &City, plan: &[CargoItem], cargo_space: u32) -> bool {
        let mut weight: u64 = 0;
        for item in plan {
            if !origin.supplies(item.resource) {
                return false;
            }
            let unit = self.data.resources.get(item.resource).map_or(1, |r| r.weight);
            weight += u64::from(item.target_amount) * u64::from(unit);
            if weight > u64::from(cargo_space) {
                return false;
            }
        }
        true
    }

    fn route_plan_fits(&self, from: CityId, to: CityId, train: TrainId, plan: &RoutePlanCargo) -> bool {
        let (Some(one), Some(two), Some(train)) = (
            self.data.cities.get(from),
            self.data.cities.get(to),
            self.data.trains.get(train),
        ) else {
            return false;
        };
        self.plan_fits(one, &plan.city_one, train.cargo_space)
            && self.plan_fits(two, &plan.city_two, train.cargo_space)
    }

    /// Buy track and a train between two cities. The route is built over the
    /// next few turns and reserves a slot in both cities straight away.
    pub fn queue_route(
        &mut self,
        player: PlayerId,
        from: CityId,
        to: CityId,
        train: TrainId,
        plan: RoutePlanCargo,
    ) -> bool {
        let Some(quote) = self.quote_route(player, from, to, train) else {
            return false;
        };
        let Some(owner) = self.players.get(player) else {
            return false;
        };
        if !owner.is_active || owner.has_route_between(from, to) || !owner.finance.can_afford(quote.total_cost) {
            return false;
        }
        if !self.route_plan_fits(from, to, train, &plan) {
            return false;
        }
        let free = |id: CityId| self.data.cities.get(id).is_some_and(|c| !c.is_full());
        if !free(from) || !free(to) {
            return false;
        }

        for id in [from, to] {
            if let Some(city) = self.data.cities.get_mut(id) {
                city.add_route();
            }
        }

        let id = RouteId::new(self.next_route_id);
        self.next_route_id += 1;
        let name = format!("{} - {}", self.data.city_name(from), self.data.city_name(to));
        let route = Route::new(id, name, (from, to), train, plan, quote.distance, quote.track_cost, self.turn);

        let turn = self.turn;
        let Some(owner) = self.players.get_mut(player) else {
            return false;
        };
        owner
            .finance
            .add_to_finance_expense(FinanceType::Track, LedgerRef::Route(id), 1, quote.track_cost, turn);
        owner
            .finance
            .add_to_finance_expense(FinanceType::Train, LedgerRef::Route(id), 1, quote.train_cost, turn);
        owner.queue.push(QueuedRoute {
            route,
            turn_cost: quote.build_turns,
        });

        if self.config.log.finance {
            tracing::info!(
                target: "nardis::finance",
                turn,
                player = %owner.name,
                route = id.0,
                distance = quote.distance,
                cost = quote.total_cost,
                build_turns = quote.build_turns,
                "route queued"
            );
        }
        true
    }

    fn release_slots(&mut self, route: &Route) {
        for id in [route.city_one, route.city_two] {
            if let Some(city) = self.data.cities.get_mut(id) {
                city.remove_route();
            }
        }
    }

    /// Cancel a route still under construction, refunding what the ledger
    /// still holds for it.
    pub fn remove_route_from_queue(&mut self, player: PlayerId, route: RouteId) -> bool {
        let Some(owner) = self.players.get_mut(player) else {
            return false;
        };
        let Some(index) = owner.queue.iter().position(|q| q.route.id == route) else {
            return false;
        };
        let queued = owner.queue.remove(index);
        owner
            .finance
            .remove_from_finance_expense(FinanceType::Track, LedgerRef::Route(route));
        owner
            .finance
            .remove_from_finance_expense(FinanceType::Train, LedgerRef::Route(route));
        self.release_slots(&queued.route);
        true
    }

    /// Tear up an active route and recoup part of what it cost.
    pub fn delete_route(&mut self, player: PlayerId, route: RouteId) -> bool {
        let Some(owner) = self.players.get(player) else {
            return false;
        };
        let Some(index) = owner.routes.iter().position(|r| r.id == route) else {
            return false;
        };
        let train_cost = self
            .data
            .trains
            .get(owner.routes[index].train)
            .map_or(0, |t| t.cost);

        let turn = self.turn;
        let fraction = self.config.route.recoup_fraction;
        let Some(owner) = self.players.get_mut(player) else {
            return false;
        };
        let removed = owner.routes.remove(index);
        let recoup = (fraction * (removed.cost + train_cost) as f64).floor() as i64;
        owner
            .finance
            .add_to_finance_income(FinanceType::Recoup, LedgerRef::Route(route), 1, recoup, turn);

        if self.config.log.finance {
            tracing::info!(
                target: "nardis::finance",
                turn,
                player = %owner.name,
                route = route.0,
                profit = removed.profit,
                recoup,
                "route deleted"
            );
        }
        self.release_slots(&removed);
        true
    }

    /// Swap train and cargo plan on an active route. A different train is
    /// paid for in full.
    pub fn change_route(&mut self, player: PlayerId, route: RouteId, train: TrainId, plan: RoutePlanCargo) -> bool {
        let Some(owner) = self.players.get(player) else {
            return false;
        };
        let Some(current) = owner.route(route) else {
            return false;
        };
        let Some(new_train) = self.data.trains.get(train) else {
            return false;
        };
        if new_train.level_required > owner.level {
            return false;
        }
        let cost = if current.train == train { 0 } else { new_train.cost };
        if !owner.finance.can_afford(cost) || !self.route_plan_fits(current.city_one, current.city_two, train, &plan) {
            return false;
        }

        let turn = self.turn;
        let Some(owner) = self.players.get_mut(player) else {
            return false;
        };
        let Some(current) = owner.routes.iter_mut().find(|r| r.id == route) else {
            return false;
        };
        if current.change(train, plan, &mut self.data.cities).is_err() {
            return false;
        }
        if cost > 0 {
            owner
                .finance
                .add_to_finance_expense(FinanceType::Train, LedgerRef::Route(route), 1, cost, turn);
        }
        true
    }

    // ===== UPGRADE COMMANDS =====

    pub fn purchase_upgrade(&mut self, player: PlayerId, upgrade: UpgradeId) -> bool {
        let Some(item) = self.data.upgrades.get(upgrade) else {
            return false;
        };
        let turn = self.turn;
        let Some(owner) = self.players.get_mut(player) else {
            return false;
        };
        if !owner.is_active
            || owner.owns_upgrade(upgrade)
            || item.level_required > owner.level
            || !owner.finance.can_afford(item.cost)
        {
            return false;
        }
        owner
            .finance
            .add_to_finance_expense(FinanceType::Upgrade, LedgerRef::Upgrade(upgrade), 1, item.cost, turn);
        owner.upgrades.push(upgrade);

        if self.config.log.finance {
            tracing::info!(
                target: "nardis::finance",
                turn,
                player = %owner.name,
                upgrade = %item.name,
                cost = item.cost,
                "upgrade purchased"
            );
        }
        true
    }

    // ===== STOCK COMMANDS =====

    /// Buy one share of `owner`'s stock for `buyer` at the buy value.
    pub fn buy_stock(&mut self, buyer: PlayerId, owner: PlayerId) -> bool {
        let Some(gold) = self.players.get(buyer).filter(|p| p.is_active).map(|p| p.finance.gold) else {
            return false;
        };
        let Some(target) = self.players.get_mut(owner).filter(|p| p.is_active) else {
            return false;
        };
        let price = target.stock.get_buy_value(&self.config.stock);
        if gold < price || !target.stock.buy_stock(buyer, &self.config.stock) {
            return false;
        }

        let turn = self.turn;
        let Some(holder) = self.players.get_mut(buyer) else {
            return false;
        };
        holder
            .finance
            .add_to_finance_expense(FinanceType::Stock, LedgerRef::Player(owner), 1, price, turn);
        holder.finance.add_shares(owner, 1);

        if self.config.log.stocks {
            tracing::info!(target: "nardis::stock", turn, buyer = %holder.name, price, "share bought");
        }
        true
    }

    /// Sell one of `seller`'s shares in `owner`'s stock at the sell value.
    pub fn sell_stock(&mut self, seller: PlayerId, owner: PlayerId) -> bool {
        if !self.players.get(seller).is_some_and(|p| p.is_active) {
            return false;
        }
        let Some(target) = self.players.get_mut(owner).filter(|p| p.is_active) else {
            return false;
        };
        if !target.stock.sell_stock(seller) {
            return false;
        }
        let price = target.stock.get_sell_value();

        let turn = self.turn;
        let Some(holder) = self.players.get_mut(seller) else {
            return false;
        };
        holder
            .finance
            .add_to_finance_income(FinanceType::Stock, LedgerRef::Player(owner), 1, price, turn);
        holder.finance.remove_shares(owner, 1);

        if self.config.log.stocks {
            tracing::info!(target: "nardis::stock", turn, seller = %holder.name, price, "share sold");
        }
        true
    }

    /// Gold `acquirer` would pay every other holder to own all of `target`'s
    /// shares, or `None` when a buyout is not possible right now.
    pub fn buyout_cost(&self, acquirer: PlayerId, target: PlayerId) -> Option<i64> {
        let buyer = self.players.get(acquirer).filter(|p| p.is_active)?;
        let owner = self.players.get(target).filter(|p| p.is_active && p.stock.is_active)?;
        if !owner.stock.is_fully_issued(&self.config.stock) {
            return None;
        }
        Some(crate::opponent::buyout_cost(buyer, owner))
    }

    /// Acquire every outstanding share of `target`'s stock. Buying out a
    /// rival merges them into the acquirer. Buying out yourself just
    /// recovers your shares.
    pub fn buyout(&mut self, acquirer: PlayerId, target: PlayerId) -> bool {
        let Some(cost) = self.buyout_cost(acquirer, target) else {
            return false;
        };
        if !self.players.get(acquirer).is_some_and(|p| p.finance.can_afford(cost)) {
            return false;
        }

        let turn = self.turn;
        let Some(owner) = self.players.get(target) else {
            return false;
        };
        let price = owner.stock.get_sell_value();
        let payouts: Vec<(PlayerId, u32)> = owner
            .stock
            .supply
            .iter()
            .filter(|(holder, _)| *holder != acquirer)
            .map(|(holder, shares)| (holder, *shares))
            .collect();

        // Settle every holder before anything changes hands.
        let mut acquired = 0;
        for (holder, shares) in payouts {
            if let Some(buyer) = self.players.get_mut(acquirer) {
                buyer
                    .finance
                    .add_to_finance_expense(FinanceType::Buyout, LedgerRef::Player(target), shares, price, turn);
            }
            if let Some(seller) = self.players.get_mut(holder) {
                seller
                    .finance
                    .add_to_finance_income(FinanceType::Buyout, LedgerRef::Player(target), shares, price, turn);
                seller.finance.remove_shares(target, shares);
            }
            acquired += shares;
        }
        if let Some(buyer) = self.players.get_mut(acquirer) {
            buyer.finance.add_shares(target, acquired);
        }
        if let Some(owner) = self.players.get_mut(target) {
            owner.stock.consolidate(acquirer);
        }

        if self.config.log.stocks {
            tracing::info!(
                target: "nardis::stock",
                turn,
                acquirer = %self.players.get(acquirer).map_or("?", |p| p.name.as_str()),
                taken = %self.players.get(target).map_or("?", |p| p.name.as_str()),
                cost,
                "buyout"
            );
        }

        if acquirer != target {
            self.merge(acquirer, target);
        }
        true
    }

    /// Fold `target` into `acquirer` after a completed buyout.
    fn merge(&mut self, acquirer: PlayerId, target: PlayerId) {
        let turn = self.turn;
        let Some(loser) = self.players.get_mut(target) else {
            return;
        };
        let routes = std::mem::take(&mut loser.routes);
        let queue = std::mem::take(&mut loser.queue);
        let upgrades = std::mem::take(&mut loser.upgrades);
        let holdings: Vec<(PlayerId, u32)> = loser
            .finance
            .stocks
            .iter()
            .filter(|(owner, _)| *owner != target)
            .map(|(owner, shares)| (owner, *shares))
            .collect();
        loser.finance.stocks = SecondaryMap::new();
        let gold = std::mem::replace(&mut loser.finance.gold, 0);
        loser.is_active = false;
        loser.stock.is_active = false;

        for (owner, shares) in &holdings {
            if let Some(stock_owner) = self.players.get_mut(*owner) {
                let supply = &mut stock_owner.stock.supply;
                supply.remove(target);
                match supply.get_mut(acquirer) {
                    Some(held) => *held += shares,
                    None => {
                        supply.insert(acquirer, *shares);
                    }
                }
            }
        }

        let Some(winner) = self.players.get_mut(acquirer) else {
            return;
        };
        let moved_routes = routes.len() + queue.len();
        winner.routes.extend(routes);
        winner.queue.extend(queue);
        for upgrade in upgrades {
            if !winner.owns_upgrade(upgrade) {
                winner.upgrades.push(upgrade);
            }
        }
        for (owner, shares) in holdings {
            winner.finance.add_shares(owner, shares);
        }
        if gold > 0 {
            winner
                .finance
                .add_to_finance_income(FinanceType::Takeover, LedgerRef::Player(target), 1, gold, turn);
        } else if gold < 0 {
            winner
                .finance
                .add_to_finance_expense(FinanceType::Takeover, LedgerRef::Player(target), 1, -gold, turn);
        }

        if self.config.log.stocks {
            tracing::info!(
                target: "nardis::stock",
                turn,
                winner = %winner.name,
                routes = moved_routes,
                gold,
                "takeover"
            );
        }
    }

    // ===== TURN =====

    /// Advance the whole game by one turn.
    ///
    /// Players settle first (human, then computers in seat order, each
    /// computer deciding right after its own settlement), then the world
    /// moves on, then valuations refresh and the game is persisted.
    pub fn end_turn(&mut self) -> crate::Result<()> {
        let order: Vec<PlayerId> = std::iter::once(self.human)
            .chain(self.players.keys().filter(|id| *id != self.human))
            .collect();

        for id in order {
            self.settle_player(id)?;
            if self.players.get(id).is_some_and(|p| p.is_computer() && p.is_active) {
                self.run_opponent(id);
            }
        }

        for city in self.data.cities.values_mut() {
            city.handle_turn(CityTurn {
                rng: &mut self.rng,
                pool: &self.pool,
                config: &self.config.city,
            })?;
        }
        for resource in self.data.resources.values_mut() {
            resource.handle_turn(ResourceTurn {
                turn: self.turn,
                rng: &mut self.rng,
                config: &self.config.resource,
            })?;
        }

        self.turn += 1;
        self.update_stock_values();
        self.update_net_worths();

        if self.config.log.turns {
            tracing::info!(
                target: "nardis::turn",
                turn = self.turn,
                active_players = self.players.values().filter(|p| p.is_active).count(),
                game_over = self.is_game_over(),
                "turn ended"
            );
        }

        if let Some(mut storage) = self.storage.take() {
            let saved = save_game(self, storage.as_mut());
            self.storage = Some(storage);
            saved?;
        }
        Ok(())
    }

    fn settle_player(&mut self, id: PlayerId) -> crate::Result<()> {
        let Some(player) = self.players.get_mut(id) else {
            return Ok(());
        };
        player.handle_turn(PlayerTurn {
            data: &mut self.data,
            turn: self.turn,
            config: &self.config,
            log: &self.config.log,
        })
    }

    /// Run the five AI steps for one computer, in priority order.
    fn run_opponent(&mut self, id: PlayerId) {
        let turn = self.turn;
        let log = self.config.log.ai;

        let step = self
            .players
            .get(id)
            .and_then(|p| p.save_state())
            .map(|state| save_step(state, turn));
        if let Some(SaveStep::Resume(goal)) = step {
            if let Some(player) = self.players.get_mut(id) {
                player.set_save_state(None);
            }
            if log {
                tracing::info!(target: "nardis::ai", turn, goal = ?goal, "save resumed");
            }
        }
        let saving = matches!(step, Some(SaveStep::Waiting));

        // 1. Upgrades
        let upgrades = match self.players.get(id) {
            Some(player) => decide_upgrades(player, &self.data),
            None => return,
        };
        for upgrade in upgrades {
            let bought = self.purchase_upgrade(id, upgrade);
            if log {
                tracing::info!(target: "nardis::ai", turn, action = "upgrade", bought);
            }
        }

        // 2. Stock
        let decision = match self.players.get(id) {
            Some(player) => decide_stock(player, &self.players, &self.config),
            None => return,
        };
        let traded = match decision {
            StockDecision::Buy(owner) => self.buy_stock(id, owner),
            StockDecision::Sell(owner) => self.sell_stock(id, owner),
            StockDecision::Hold => false,
        };
        if log && decision != StockDecision::Hold {
            tracing::info!(target: "nardis::ai", turn, action = "stock", decision = ?decision, traded);
        }

        // 3. Routes
        let plan = match self.players.get(id) {
            Some(player) if !saving && should_purchase_route(player, &self.config) => {
                Some(plan_routes(player, &self.data, &self.config))
            }
            _ => None,
        };
        if let Some(plan) = plan {
            if plan.start_saving {
                let state = SaveState::new(SaveGoal::Route, turn, self.config.opponent.save_duration);
                if let Some(player) = self.players.get_mut(id) {
                    player.set_save_state(Some(state));
                }
                if log {
                    tracing::info!(target: "nardis::ai", turn, action = "save", goal = "route");
                }
            }
            for pick in plan.picks {
                let queued = self.queue_route(id, pick.origin, pick.destination, pick.train, pick.plan);
                if log {
                    tracing::info!(
                        target: "nardis::ai",
                        turn,
                        action = "route",
                        distance = pick.distance,
                        score = pick.score,
                        queued
                    );
                }
            }
        }

        // 4. Prune
        let losing = match self.players.get(id) {
            Some(player) => unprofitable_routes(player, &self.data, turn),
            None => return,
        };
        for route in losing {
            let deleted = self.delete_route(id, route);
            if log {
                tracing::info!(target: "nardis::ai", turn, action = "delete", route = route.0, deleted);
            }
        }

        // 5. Buyout or save
        if saving {
            return;
        }
        let decision = match self.players.get(id) {
            Some(player) => decide_buyout(player, &self.players, &self.config),
            None => return,
        };
        match decision {
            BuyoutDecision::Buyout(target) => {
                let done = self.buyout(id, target);
                if log {
                    tracing::info!(target: "nardis::ai", turn, action = "buyout", done);
                }
            }
            BuyoutDecision::Save(target) => {
                let state = SaveState::new(
                    SaveGoal::Buyout { target },
                    turn,
                    self.config.opponent.save_duration,
                );
                if let Some(player) = self.players.get_mut(id) {
                    player.set_save_state(Some(state));
                }
                if log {
                    tracing::info!(target: "nardis::ai", turn, action = "save", goal = "buyout");
                }
            }
            BuyoutDecision::Pass => {}
        }
    }

    // ===== VALUATION =====

    fn update_stock_values(&mut self) {
        let turn = self.turn;
        for player in self.players.values_mut().filter(|p| p.is_active) {
            let moved = player.stock.update_value(
                player.routes.len(),
                player.finance.get_average_revenue(),
                player.finance.total_profits,
                turn,
                &self.config.stock,
            );
            if moved && self.config.log.stocks {
                tracing::info!(
                    target: "nardis::stock",
                    turn,
                    owner = %player.name,
                    value = player.stock.value,
                    "stock revalued"
                );
            }
        }
    }

    fn update_net_worths(&mut self) {
        let share_values: SecondaryMap<PlayerId, i64> = self
            .players
            .iter()
            .map(|(id, p)| (id, if p.stock.is_active { p.stock.get_sell_value() } else { 0 }))
            .collect();

        for player in self.players.values_mut() {
            let Player {
                finance,
                routes,
                queue,
                upgrades,
                ..
            } = player;
            finance.calculate_net_worth(
                routes.iter().chain(queue.iter().map(|q| &q.route)),
                upgrades,
                &self.data,
                |owner| share_values.get(owner).copied().unwrap_or(0),
                &self.config.net_worth,
            );
        }
    }
}
