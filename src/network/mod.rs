//! Network Infrastructure
//!
//! `connection` turns a WebSocket into a pair of async channels,
//! `channel` owns the one connection to the server and reports its
//! lifecycle as events.
pub(crate) mod channel;
pub(crate) mod connection;
pub use channel::{Channel, ChannelError, ChannelEvent, ChannelState};
pub use connection::{connect, handle_connection, Conn, ConnectionError, Received};
