//! Error types for the simulation core.
//!
//! Only unrecoverable conditions are errors. Declined player actions (not
//! enough gold, unknown id, share cap reached) are reported as `false` by the
//! command methods on [`crate::Nardis`].

use thiserror::Error;

use crate::types::{CityId, ResourceId};

/// Result type alias using [`NardisError`].
pub type Result<T, E = NardisError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum NardisError {
    /// World generation could not seat every player.
    #[error("not enough start cities: need {needed}, generated {available}")]
    InsufficientStartCities { needed: usize, available: usize },

    /// A route plan asked for a resource its source city does not supply.
    #[error("cargo plan references resource {resource:?} which city {city:?} does not supply")]
    CorruptCargoPlan { city: CityId, resource: ResourceId },

    /// A growing city needed a new resource and none was left.
    #[error("no resource left to assign to city {0:?}")]
    ResourcePoolExhausted(CityId),

    /// Load was attempted without a saved game.
    #[error("storage holds no active game")]
    NoActiveGame,

    /// A save key was absent or empty.
    #[error("save entry '{0}' is missing")]
    MissingSaveEntry(&'static str),

    /// A reconstructed entity points at something that was not restored.
    #[error("{owner} references a {kind} that does not exist")]
    DanglingReference {
        owner: String,
        kind: &'static str,
    },

    /// An entity's stored id disagrees with the arena slot it was loaded into.
    #[error("{0} was restored under a different id")]
    IdMismatch(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Base64(#[from] base64::DecodeError),

    #[error(transparent)]
    Utf8(#[from] std::string::FromUtf8Error),
}

impl NardisError {
    pub(crate) fn dangling(owner: impl Into<String>, kind: &'static str) -> Self {
        NardisError::DanglingReference {
            owner: owner.into(),
            kind,
        }
    }
}
