//! Meeting session module.
//!
//! Owns the authoritative lifecycle of each meeting session
//! (lobby → active → ended), the process-wide registry of live sessions,
//! and the service facade the API surface calls into.

pub mod machine;
pub mod registry;
pub mod service;
pub mod state;

pub use machine::SessionMachine;
pub use registry::SessionRegistry;
pub use service::SessionService;
pub use state::{SessionPhase, SessionSnapshot, SessionState};
