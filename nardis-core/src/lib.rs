use wasm_bindgen::prelude::*;

mod city;
mod config;
mod error;
mod finance;
mod game;
mod generator;
mod opponent;
mod player;
mod random;
mod resource;
mod route;
mod save;
mod snapshot;
mod stock;
mod train;
mod types;
mod world;

pub use city::*;
pub use config::*;
pub use error::*;
pub use finance::*;
pub use game::*;
pub use generator::*;
pub use opponent::*;
pub use player::*;
pub use random::*;
pub use resource::*;
pub use route::*;
pub use save::{MemoryStorage, Relink, Serializable, Storage, clear_game, has_active_game, keys, load_game, save_game};
pub use snapshot::*;
pub use stock::*;
pub use train::*;
pub use types::*;
pub use world::*;

#[cfg(feature = "instrument")]
pub use instrument;

fn js_error(err: impl std::fmt::Display) -> JsError {
    JsError::new(&err.to_string())
}

// ============================================================================
// WASM API - Storage adapter
// ============================================================================

/// Lets a JS `Map<string, string>` (or anything mirrored into one, such as
/// localStorage) back a save.
pub struct JsMapStorage<'a> {
    map: &'a js_sys::Map,
}

impl<'a> JsMapStorage<'a> {
    pub fn new(map: &'a js_sys::Map) -> Self {
        Self { map }
    }
}

impl Storage for JsMapStorage<'_> {
    fn get(&self, key: &str) -> Option<String> {
        self.map.get(&JsValue::from_str(key)).as_string()
    }

    fn set(&mut self, key: &str, value: String) {
        self.map.set(&JsValue::from_str(key), &JsValue::from(value));
    }

    fn remove(&mut self, key: &str) {
        self.map.delete(&JsValue::from_str(key));
    }
}

// ============================================================================
// WASM API - Game
// ============================================================================

/// Browser-facing handle. Every command acts on behalf of the human player.
#[wasm_bindgen]
pub struct NardisGame {
    game: Nardis,
}

#[wasm_bindgen]
impl NardisGame {
    /// Start a new game from a (possibly partial or empty) JSON config.
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: &str, human_name: &str) -> Result<NardisGame, JsError> {
        // Better panic messages in browser console
        console_error_panic_hook::set_once();

        let config = parse_config(config_json)?;
        let game = Nardis::new(config, human_name).map_err(js_error)?;
        Ok(Self { game })
    }

    /// Resume the game saved in `map`.
    #[wasm_bindgen]
    pub fn load_from(map: &js_sys::Map, config_json: &str) -> Result<NardisGame, JsError> {
        console_error_panic_hook::set_once();

        let config = parse_config(config_json)?;
        let game = load_game(&JsMapStorage::new(map), config).map_err(js_error)?;
        Ok(Self { game })
    }

    #[wasm_bindgen]
    pub fn has_saved_game(map: &js_sys::Map) -> bool {
        has_active_game(&JsMapStorage::new(map))
    }

    #[wasm_bindgen]
    pub fn clear_saved_game(map: &js_sys::Map) {
        clear_game(&mut JsMapStorage::new(map));
    }

    #[wasm_bindgen]
    pub fn save_to(&self, map: &js_sys::Map) -> Result<(), JsError> {
        self.game.save(&mut JsMapStorage::new(map)).map_err(js_error)
    }

    /// Advance every player and the world by one turn
    #[wasm_bindgen]
    pub fn end_turn(&mut self) -> Result<(), JsError> {
        self.game.end_turn().map_err(js_error)
    }

    #[wasm_bindgen]
    pub fn get_turn(&self) -> u32 {
        self.game.turn
    }

    #[wasm_bindgen]
    pub fn is_game_over(&self) -> bool {
        self.game.is_game_over()
    }

    /// Get a snapshot of the current state for rendering
    #[wasm_bindgen]
    pub fn get_state_snapshot(&self) -> GameSnapshot {
        self.game.snapshot()
    }

    /// Price of a prospective route, or `undefined` when it cannot be built.
    #[wasm_bindgen]
    pub fn quote_route(&self, from: u64, to: u64, train: u64) -> Result<JsValue, JsError> {
        let quote = self
            .game
            .quote_route(self.game.human, key_from_u64(from), key_from_u64(to), key_from_u64(train));
        serde_wasm_bindgen::to_value(&quote).map_err(js_error)
    }

    /// `plan` is a `CargoPlanInput`.
    #[wasm_bindgen]
    pub fn queue_route(&mut self, from: u64, to: u64, train: u64, plan: JsValue) -> Result<bool, JsError> {
        let plan = parse_plan(plan)?;
        Ok(self.game.queue_route(
            self.game.human,
            key_from_u64(from),
            key_from_u64(to),
            key_from_u64(train),
            plan,
        ))
    }

    #[wasm_bindgen]
    pub fn remove_route_from_queue(&mut self, route: u32) -> bool {
        self.game.remove_route_from_queue(self.game.human, RouteId::new(route))
    }

    #[wasm_bindgen]
    pub fn delete_route(&mut self, route: u32) -> bool {
        self.game.delete_route(self.game.human, RouteId::new(route))
    }

    #[wasm_bindgen]
    pub fn change_route(&mut self, route: u32, train: u64, plan: JsValue) -> Result<bool, JsError> {
        let plan = parse_plan(plan)?;
        Ok(self
            .game
            .change_route(self.game.human, RouteId::new(route), key_from_u64(train), plan))
    }

    #[wasm_bindgen]
    pub fn purchase_upgrade(&mut self, upgrade: u64) -> bool {
        self.game.purchase_upgrade(self.game.human, key_from_u64(upgrade))
    }

    #[wasm_bindgen]
    pub fn buy_stock(&mut self, owner: u64) -> bool {
        self.game.buy_stock(self.game.human, key_from_u64(owner))
    }

    #[wasm_bindgen]
    pub fn sell_stock(&mut self, owner: u64) -> bool {
        self.game.sell_stock(self.game.human, key_from_u64(owner))
    }

    #[wasm_bindgen]
    pub fn buyout_cost(&self, target: u64) -> Option<i64> {
        self.game.buyout_cost(self.game.human, key_from_u64(target))
    }

    #[wasm_bindgen]
    pub fn buyout(&mut self, target: u64) -> bool {
        self.game.buyout(self.game.human, key_from_u64(target))
    }

    /// Start collecting game events on this thread.
    #[cfg(feature = "instrument")]
    #[wasm_bindgen]
    pub fn record_events(&self) {
        instrument::clear();
        instrument::install_subscriber();
    }

    /// Everything collected since `record_events`, as JSON keyed by target.
    #[cfg(feature = "instrument")]
    #[wasm_bindgen]
    pub fn drain_events(&self) -> Result<String, JsError> {
        instrument::drain().to_json().map_err(js_error)
    }
}

fn parse_config(raw: &str) -> Result<GameConfig, JsError> {
    if raw.trim().is_empty() {
        return Ok(GameConfig::default());
    }
    GameConfig::from_json(raw).map_err(js_error)
}

fn parse_plan(plan: JsValue) -> Result<RoutePlanCargo, JsError> {
    let input: CargoPlanInput = serde_wasm_bindgen::from_value(plan).map_err(js_error)?;
    Ok(input.into_plan())
}
