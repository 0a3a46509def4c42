//! Media transport abstraction.
//!
//! The real-time media layer (signaling, codecs, networking) is an external
//! system. Huddle only needs three things from it: join a call, end a call,
//! and hear about involuntary disconnects. The first two are the [`Transport`]
//! trait; disconnects are pushed into the service through the HTTP surface
//! (`POST /transport/disconnect`).

pub mod rest;

use async_trait::async_trait;

use crate::error::TransportError;

pub use rest::RestTransport;

/// Join/leave capability supplied by the underlying video infrastructure.
///
/// Implementations are keyed by meeting id; one client serves every session
/// in the process.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Join the call for a meeting.
    async fn join(&self, meeting_id: &str) -> Result<(), TransportError>;

    /// End the call for a meeting.
    async fn end_call(&self, meeting_id: &str) -> Result<(), TransportError>;
}
