//! Events pushed by a live engine connection.

use crate::jid::Jid;

/// Lifecycle and content events for one session, delivered in engine
/// order on the session's event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Transport established.
    Connected,
    /// Device authenticated (initial pairing completion or a late login).
    Authenticated { jid: Jid },
    /// Transport lost; the stream usually closes shortly after.
    Disconnected,
    /// Inbound text message.
    Message { from: Jid, text: String },
}

/// Updates on the pairing channel: zero or more codes, then either a
/// terminal [`PairingUpdate::Connected`] or the channel closing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingUpdate {
    /// A fresh pairing code to present to the user.
    Code(String),
    /// Stored credentials were accepted; no pairing needed.
    Connected,
}
