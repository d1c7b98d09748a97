//! Persistence against a string key-value store.
//!
//! Each entity list is written as a JSON array of per-entity records, base64
//! encoded, under a fixed key. References between entities are stored as ids
//! only and re-resolved against the already-restored arenas on load, in
//! dependency order: resources, trains, upgrades, cities, then players (which
//! carry their routes).

use std::collections::HashMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use serde::de::DeserializeOwned;
use slotmap::{Key, SlotMap};

use crate::city::City;
use crate::config::GameConfig;
use crate::error::NardisError;
use crate::game::Nardis;
use crate::player::Player;
use crate::resource::Resource;
use crate::route::Route;
use crate::train::{Train, Upgrade};
use crate::types::{Identifiable, KeyToU64, PlayerId, key_from_u64};
use crate::world::GameData;

/// Storage keys. Stable across versions; renaming one orphans old saves.
pub mod keys {
    pub const TRAINS: &str = "nds.7f3a";
    pub const UPGRADES: &str = "nds.2c91";
    pub const RESOURCES: &str = "nds.b04e";
    pub const CITIES: &str = "nds.5d7c";
    pub const PLAYERS: &str = "nds.e8a2";
    pub const CURRENT_PLAYER: &str = "nds.41f6";
    pub const TURN: &str = "nds.93bd";
    pub const HAS_ACTIVE_GAME: &str = "nds.0a5e";

    pub const ALL: [&str; 8] = [
        TRAINS,
        UPGRADES,
        RESOURCES,
        CITIES,
        PLAYERS,
        CURRENT_PLAYER,
        TURN,
        HAS_ACTIVE_GAME,
    ];
}

// ============================================================================
// Storage
// ============================================================================

pub trait Storage {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: String);
    fn remove(&mut self, key: &str);
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: HashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) {
        self.entries.insert(key.to_string(), value);
    }

    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }
}

// ============================================================================
// Entity records
// ============================================================================

/// Checks that every id an entity holds resolves in the arena.
pub trait Relink {
    fn relink(&self, data: &GameData) -> crate::Result<()>;
}

/// Canonical string form of a single entity.
pub trait Serializable: Sized {
    fn deconstruct(&self) -> crate::Result<String>;
    fn reconstruct(raw: &str, data: &GameData) -> crate::Result<Self>;
}

impl<T> Serializable for T
where
    T: Serialize + DeserializeOwned + Relink,
{
    fn deconstruct(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    fn reconstruct(raw: &str, data: &GameData) -> crate::Result<Self> {
        let entity: T = serde_json::from_str(raw)?;
        entity.relink(data)?;
        Ok(entity)
    }
}

impl Relink for Resource {
    fn relink(&self, _data: &GameData) -> crate::Result<()> {
        Ok(())
    }
}

impl Relink for Train {
    fn relink(&self, _data: &GameData) -> crate::Result<()> {
        Ok(())
    }
}

impl Relink for Upgrade {
    fn relink(&self, _data: &GameData) -> crate::Result<()> {
        Ok(())
    }
}

impl Relink for City {
    fn relink(&self, data: &GameData) -> crate::Result<()> {
        let resources = self
            .supply
            .iter()
            .map(|s| s.resource)
            .chain(self.demand.iter().map(|d| d.resource));
        for resource in resources {
            if !data.resources.contains_key(resource) {
                return Err(NardisError::dangling(format!("city {}", self.name), "resource"));
            }
        }
        Ok(())
    }
}

impl Relink for Route {
    fn relink(&self, data: &GameData) -> crate::Result<()> {
        let owner = || format!("route {}", self.name);
        for city in [self.city_one, self.city_two, self.route_state.destination] {
            if !data.cities.contains_key(city) {
                return Err(NardisError::dangling(owner(), "city"));
            }
        }
        if !data.trains.contains_key(self.train) {
            return Err(NardisError::dangling(owner(), "train"));
        }
        let cargo = self
            .route_plan_cargo
            .city_one
            .iter()
            .chain(&self.route_plan_cargo.city_two)
            .chain(&self.route_state.cargo);
        for item in cargo {
            if !data.resources.contains_key(item.resource) {
                return Err(NardisError::dangling(owner(), "resource"));
            }
        }
        Ok(())
    }
}

impl Relink for Player {
    fn relink(&self, data: &GameData) -> crate::Result<()> {
        if !data.cities.contains_key(self.start_city) {
            return Err(NardisError::dangling(format!("player {}", self.name), "city"));
        }
        for upgrade in &self.upgrades {
            if !data.upgrades.contains_key(*upgrade) {
                return Err(NardisError::dangling(format!("player {}", self.name), "upgrade"));
            }
        }
        for route in self.all_routes() {
            route.relink(data)?;
        }
        if self.stock.owning_player != self.id {
            return Err(NardisError::IdMismatch(format!("stock of player {}", self.name)));
        }
        Ok(())
    }
}

// ============================================================================
// Save / load
// ============================================================================

fn encode(raw: &str) -> String {
    STANDARD.encode(raw)
}

fn decode(raw: &str) -> crate::Result<String> {
    Ok(String::from_utf8(STANDARD.decode(raw)?)?)
}

fn encode_list<'a, T: Serializable + 'a>(items: impl IntoIterator<Item = &'a T>) -> crate::Result<String> {
    let records = items
        .into_iter()
        .map(T::deconstruct)
        .collect::<crate::Result<Vec<String>>>()?;
    Ok(encode(&serde_json::to_string(&records)?))
}

fn read(storage: &dyn Storage, key: &'static str) -> crate::Result<String> {
    match storage.get(key) {
        Some(raw) if !raw.is_empty() => decode(&raw),
        _ => Err(NardisError::MissingSaveEntry(key)),
    }
}

/// Rebuild one arena. Entities are re-inserted in their saved order, which
/// hands them back their original keys; any drift is an error.
fn restore_list<K, T>(storage: &dyn Storage, key: &'static str, data: &GameData) -> crate::Result<SlotMap<K, T>>
where
    K: Key,
    T: Serializable + Identifiable<Id = K>,
{
    let records: Vec<String> = serde_json::from_str(&read(storage, key)?)?;
    let mut arena = SlotMap::with_capacity_and_key(records.len());
    for raw in records {
        let entity = T::reconstruct(&raw, data)?;
        let expected = entity.id();
        let name = entity.name().to_string();
        let slot = arena.insert(entity);
        if slot != expected {
            return Err(NardisError::IdMismatch(name));
        }
    }
    Ok(arena)
}

pub fn save_game(game: &Nardis, storage: &mut dyn Storage) -> crate::Result<()> {
    storage.set(keys::RESOURCES, encode_list(game.data.resources.values())?);
    storage.set(keys::TRAINS, encode_list(game.data.trains.values())?);
    storage.set(keys::UPGRADES, encode_list(game.data.upgrades.values())?);
    storage.set(keys::CITIES, encode_list(game.data.cities.values())?);
    storage.set(keys::PLAYERS, encode_list(game.players.values())?);
    storage.set(keys::CURRENT_PLAYER, encode(&game.human.to_u64().to_string()));
    storage.set(keys::TURN, encode(&game.turn.to_string()));
    storage.set(keys::HAS_ACTIVE_GAME, encode("true"));

    if game.config.log.persistence {
        tracing::info!(
            target: "nardis::save",
            turn = game.turn,
            players = game.players.len(),
            cities = game.data.cities.len(),
            "saved"
        );
    }
    Ok(())
}

pub fn has_active_game(storage: &dyn Storage) -> bool {
    matches!(read(storage, keys::HAS_ACTIVE_GAME).as_deref(), Ok("true"))
}

pub fn load_game(storage: &dyn Storage, config: GameConfig) -> crate::Result<Nardis> {
    if !has_active_game(storage) {
        return Err(NardisError::NoActiveGame);
    }

    let mut data = GameData::new();
    data.resources = restore_list(storage, keys::RESOURCES, &data)?;
    data.trains = restore_list(storage, keys::TRAINS, &data)?;
    data.upgrades = restore_list(storage, keys::UPGRADES, &data)?;
    data.cities = restore_list(storage, keys::CITIES, &data)?;
    let players: SlotMap<PlayerId, Player> = restore_list(storage, keys::PLAYERS, &data)?;

    for player in players.values() {
        let holders = player.finance.stocks.keys().chain(player.stock.supply.keys());
        for holder in holders {
            if !players.contains_key(holder) {
                return Err(NardisError::dangling(format!("player {}", player.name), "player"));
            }
        }
    }

    let human: PlayerId = read(storage, keys::CURRENT_PLAYER)?
        .parse::<u64>()
        .map(key_from_u64)
        .map_err(|_| NardisError::MissingSaveEntry(keys::CURRENT_PLAYER))?;
    if !players.contains_key(human) {
        return Err(NardisError::dangling("save", "player"));
    }
    let turn: u32 = read(storage, keys::TURN)?
        .parse()
        .map_err(|_| NardisError::MissingSaveEntry(keys::TURN))?;

    if config.log.persistence {
        tracing::info!(
            target: "nardis::save",
            turn,
            players = players.len(),
            cities = data.cities.len(),
            "loaded"
        );
    }
    Ok(Nardis::restore(config, data, players, human, turn))
}

/// Drop every save key.
pub fn clear_game(storage: &mut dyn Storage) {
    for key in keys::ALL {
        storage.remove(key);
    }
}
