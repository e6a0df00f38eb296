pub mod game;
pub mod identity;
pub mod network;
pub mod session;

pub use game::*;
pub use identity::{get_or_create_identity, open_identity, ClientIdentity, Identity, IdentityOrigin};
pub use network::{Channel, ChannelEvent, ChannelState, Conn, ConnectionError, Received};
pub use session::*;

pub(crate) const CHANNEL_SIZE: usize = 5;
