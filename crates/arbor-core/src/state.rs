//! Load-state machine for child population.

use strum::Display;

/// Lifecycle of a node's child population.
///
/// Transitions: `NotLoaded -> Loading -> {Loaded, LoadedWithError,
/// Canceled}`. `Canceled` and `LoadedWithError` re-arm to `NotLoaded`
/// on the next access; `Loaded` is terminal until an external
/// invalidation (watch event, explicit reload) resets the node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum LoadState {
    /// Children have never been computed (or were discarded).
    #[default]
    NotLoaded,
    /// A population is in flight.
    Loading,
    /// Children are present and current.
    Loaded,
    /// Population ran and failed; the error is retained on the node.
    LoadedWithError,
    /// An in-flight population was cancelled.
    Canceled,
}

impl LoadState {
    /// Whether a new population may start from this state.
    pub fn can_begin_loading(self) -> bool {
        matches!(
            self,
            LoadState::NotLoaded | LoadState::Canceled | LoadState::LoadedWithError
        )
    }

    /// Whether a population reached an outcome (success, error or cancel).
    pub fn is_settled(self) -> bool {
        matches!(
            self,
            LoadState::Loaded | LoadState::LoadedWithError | LoadState::Canceled
        )
    }
}
