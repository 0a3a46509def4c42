//! Agent dispatch module.
//!
//! Requests that an AI agent worker join a meeting as a synthetic
//! participant. The external dispatcher only promises "scheduled", not
//! "attached". The coordinator tracks the request, retries transient
//! failures, and reports the final outcome back to the owning session.

pub mod coordinator;
pub mod dispatcher;

pub use coordinator::{
    DispatchCoordinator, DispatchEvent, DispatchOutcome, DispatchPolicy, DispatchStatus,
};
pub use dispatcher::{AgentDispatcher, RestAgentDispatcher};
