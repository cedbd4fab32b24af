//! Protocol-engine abstraction for the chatrelay gateway.
//!
//! The gateway never speaks the chat protocol itself. It drives sessions
//! through the [`EngineDriver`] / [`EngineConnection`] seam and persists
//! device identities through [`IdentityStore`]. The [`loopback`] driver is
//! the in-process implementation used for development and tests; a real
//! protocol binding implements the same traits.

pub mod driver;
pub mod event;
pub mod identity;
pub mod jid;
pub mod loopback;

pub use driver::{EngineConnection, EngineDriver, EngineSession, SendReceipt};
pub use event::{EngineEvent, PairingUpdate};
pub use identity::{DeviceIdentity, FileIdentityStore, IdentityStore};
pub use jid::Jid;
