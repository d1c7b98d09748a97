use serde::{Deserialize, Serialize};
use slotmap::{Key, new_key_type};
use tsify_next::Tsify;

// ============================================================================
// IDs - Using slotmap for generational indices
// ============================================================================

new_key_type! {
    pub struct ResourceId;
    pub struct CityId;
    pub struct TrainId;
    pub struct UpgradeId;
    pub struct PlayerId;
}

/// Trait for converting SlotMap keys to u64 for the WASM boundary
pub trait KeyToU64 {
    fn to_u64(self) -> u64;
}

impl<K: Key> KeyToU64 for K {
    fn to_u64(self) -> u64 {
        self.data().as_ffi()
    }
}

/// Rebuild a SlotMap key from its u64 form (as handed out by [`KeyToU64`]).
pub fn key_from_u64<K: From<slotmap::KeyData>>(raw: u64) -> K {
    K::from(slotmap::KeyData::from_ffi(raw))
}

/// Routes change owner on a takeover, so they are numbered by the game
/// rather than living in a per-player arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RouteId(pub u32);

impl RouteId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }
}

// ============================================================================
// Capability traits
// ============================================================================

/// Anything with a stable identity and a display name.
pub trait Identifiable {
    type Id: Copy + Eq;

    fn id(&self) -> Self::Id;
    fn name(&self) -> &str;

    fn same_as(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

/// A single per-turn update. Each entity declares the slice of the world it
/// needs to see while advancing.
pub trait TurnAdvanceable {
    type Context<'a>;

    fn handle_turn(&mut self, ctx: Self::Context<'_>) -> crate::Result<()>;
}

// ============================================================================
// Yield tiers
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub enum YieldTier {
    Low,
    Medium,
    High,
}

// ============================================================================
// Player ladder
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub enum PlayerLevel {
    Novice,
    Intermediate,
    Advanced,
    Master,
}

impl PlayerLevel {
    pub fn index(self) -> usize {
        match self {
            PlayerLevel::Novice => 0,
            PlayerLevel::Intermediate => 1,
            PlayerLevel::Advanced => 2,
            PlayerLevel::Master => 3,
        }
    }

    pub fn next(self) -> Option<PlayerLevel> {
        match self {
            PlayerLevel::Novice => Some(PlayerLevel::Intermediate),
            PlayerLevel::Intermediate => Some(PlayerLevel::Advanced),
            PlayerLevel::Advanced => Some(PlayerLevel::Master),
            PlayerLevel::Master => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub enum PlayerType {
    Human,
    Computer,
}

// ============================================================================
// Upgrades
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub enum UpgradeType {
    /// Multiplies train speed by `1 + value`
    Speed,
    /// Multiplies train upkeep by `1 - value`
    Upkeep,
}

// ============================================================================
// Finance categories
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub enum FinanceType {
    Track,
    Train,
    Upgrade,
    Cargo,
    Upkeep,
    Recoup,
    Stock,
    Buyout,
    Takeover,
}

/// The entity a ledger entry was recorded against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerRef {
    Route(RouteId),
    Train(TrainId),
    Upgrade(UpgradeId),
    Resource(ResourceId),
    Player(PlayerId),
}

// ============================================================================
// Geography
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct Coords {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coords {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}
