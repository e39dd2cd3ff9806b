//! The hearth sync engine.
//!
//! Keeps the local graph store and the remote CRM backend convergent: a
//! coalescing `sync()` loop runs watermark-bounded `syncDown` passes and
//! dirty-row `syncUp` pushes per entity, a realtime ingress applies row-change
//! and broadcast events as they arrive, and a resilience layer (in-flight
//! tracking, retry policy, circuit breaker, version gate) keeps the whole
//! thing calm when the network is not.

mod breaker;
mod compat;
mod handlers;
mod orchestrator;
mod queue;
mod realtime;
mod reconcile;
mod resolver;
mod status;

pub use breaker::{BreakerPhase, CircuitBreaker};
pub use compat::{AppCompatGate, CompatStatus};
pub use orchestrator::{Collaborators, EngineConfig, EngineMode, SyncEngine};
pub use resolver::{is_local_authoritative, ConflictResolver, InFlightKind};
pub use status::{ConnectionState, SyncActivity};
