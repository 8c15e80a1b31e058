//! Domain model (ids, deferred requests, state, relay outcomes).

pub mod ids;
pub mod outcome;
pub mod request;
pub mod state;

pub use ids::RequestId;
pub use outcome::RelayOutcome;
pub use request::{CallDefinition, DEFAULT_RESTART_DELAY, DeferredRequest, RelayJob};
pub use state::RequestState;
