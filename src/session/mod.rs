//! Game session
//!
//! `messages` is the wire vocabulary, `session` the protocol state machine,
//! and `client` drives a session over a live channel.
mod client;
mod messages;
mod session;

pub use client::{command_channel, run, ClientCommand, ClientConfig, DEFAULT_IDENTITY_PATH, DEFAULT_PORT};
pub use messages::{DecodeError, GamePhase, Messages, PlayerSlot, Responses, Snapshot};
pub use session::{
    GameChannel, Session, SessionEvent, SessionState, Status, UserIntent, ROOM_FULL_SUBTITLE,
    WAITING_SUBTITLE,
};
