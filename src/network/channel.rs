use crate::network::connection::{self, Conn, ConnectionError, Received};
use async_std::channel::TrySendError;
use futures::{future, StreamExt};
use log::{info, warn};
use std::collections::VecDeque;
use std::fmt::{Display, Formatter};
use std::time::Duration;

/// Lifecycle of the channel as seen by its owner.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelState {
    /// never connected
    Idle,
    Open,
    Closed,
}

/// Transitions and inbound messages, in the order they happened.
#[derive(Debug)]
pub enum ChannelEvent<Rsp> {
    Opened,
    Message(Rsp),
    Errored(ConnectionError),
    Closed,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChannelError {
    /// send while the channel is not open
    NotConnected,
    /// the writer is saturated, message dropped
    QueueFull,
    Connect(ConnectionError),
}

impl Display for ChannelError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelError::NotConnected => f.write_str("not connected"),
            ChannelError::QueueFull => f.write_str("send queue full"),
            ChannelError::Connect(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ChannelError {}

/// Owns the single message channel to the server.
///
/// The channel never reconnects by itself. After `Closed` every `send`
/// fails with `NotConnected` until `connect` succeeds again.
pub struct Channel<Msg, Rsp> {
    conn: Option<Conn<Msg, Rsp>>,
    state: ChannelState,
    events: VecDeque<ChannelEvent<Rsp>>,
    ping_interval: Option<Duration>,
    max_data_size: usize,
}

impl<Msg, Rsp> Channel<Msg, Rsp> {
    pub fn new(ping_interval: Option<Duration>, max_data_size: usize) -> Self {
        Self {
            conn: None,
            state: ChannelState::Idle,
            events: VecDeque::new(),
            ping_interval,
            max_data_size,
        }
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == ChannelState::Open
    }

    /// Queue `msg` for the writer without waiting.
    pub fn send(&self, msg: Msg) -> Result<(), ChannelError> {
        match &self.conn {
            Some(conn) if self.is_open() => conn.sender().try_send(msg).map_err(|e| match e {
                TrySendError::Full(_) => ChannelError::QueueFull,
                TrySendError::Closed(_) => ChannelError::NotConnected,
            }),
            _ => Err(ChannelError::NotConnected),
        }
    }

    /// Drop the connection. A `Closed` event follows if it was open.
    pub fn disconnect(&mut self) {
        if self.conn.take().is_some() && self.is_open() {
            self.events.push_back(ChannelEvent::Closed);
        }
        if self.state != ChannelState::Idle {
            self.state = ChannelState::Closed;
        }
    }

    /// Take over an established connection and report `Opened`.
    pub(crate) fn attach(&mut self, conn: Conn<Msg, Rsp>) {
        self.disconnect();
        self.conn = Some(conn);
        self.state = ChannelState::Open;
        self.events.push_back(ChannelEvent::Opened);
    }

    /// Wait for the next event.
    ///
    /// Never resolves while there is no connection and no queued event,
    /// so it can sit in a `select!` next to other sources.
    pub async fn next_event(&mut self) -> ChannelEvent<Rsp> {
        loop {
            if let Some(event) = self.events.pop_front() {
                return event;
            }
            let received = match self.conn.as_mut() {
                Some(conn) => conn.next().await,
                None => return future::pending().await,
            };
            match received {
                Some(Received::Response(rsp)) => return ChannelEvent::Message(rsp),
                Some(Received::Ping) => {}
                Some(Received::Error(e)) => {
                    warn!("connection error: {}", e);
                    return ChannelEvent::Errored(e);
                }
                Some(Received::RemoteError(e)) => {
                    warn!("remote connection error: {}", e);
                    return ChannelEvent::Errored(e);
                }
                None => {
                    info!("channel closed");
                    self.conn = None;
                    self.state = ChannelState::Closed;
                    return ChannelEvent::Closed;
                }
            }
        }
    }
}

impl<Msg, Rsp> Channel<Msg, Rsp>
where
    Msg: Send + 'static + Into<String>,
    Rsp: Send + 'static + TryFrom<String>,
    <Rsp as TryFrom<String>>::Error: Display,
{
    /// Open a connection to `endpoint`, replacing any current one.
    pub async fn connect(&mut self, endpoint: &str) -> Result<(), ChannelError> {
        match connection::connect(endpoint, self.ping_interval, self.max_data_size).await {
            Ok(conn) => {
                info!("connected to {}", endpoint);
                self.attach(conn);
                Ok(())
            }
            Err(e) => {
                warn!("cannot connect to {}: {}", endpoint, e);
                Err(ChannelError::Connect(e))
            }
        }
    }
}

#[cfg(test)]
impl<Msg, Rsp> Channel<Msg, Rsp> {
    /// An open channel whose far end is driven by the test.
    pub(crate) fn in_memory() -> (Self, connection::Peer<Msg, Rsp>) {
        let (conn, peer) = connection::in_memory();
        let mut channel = Channel::new(None, usize::MAX);
        channel.attach(conn);
        (channel, peer)
    }
}

#[cfg(test)]
mod test_channel {
    use super::*;
    use crate::network::connection;
    use futures::executor::block_on;

    #[test]
    fn test_send_before_connect() {
        let channel: Channel<String, String> = Channel::new(None, 1024);
        assert_eq!(channel.state(), ChannelState::Idle);
        assert_eq!(
            channel.send("hello".to_string()),
            Err(ChannelError::NotConnected)
        );
    }

    #[test]
    fn test_open_then_messages_in_order() {
        let (mut channel, peer) = Channel::<String, String>::in_memory();
        assert!(channel.is_open());
        channel.send("a".to_string()).unwrap();
        channel.send("b".to_string()).unwrap();
        assert_eq!(peer.sent(), vec!["a".to_string(), "b".to_string()]);

        peer.reply("1".to_string());
        peer.inbound.try_send(Received::Ping).unwrap();
        peer.reply("2".to_string());
        block_on(async {
            assert!(matches!(channel.next_event().await, ChannelEvent::Opened));
            assert!(matches!(channel.next_event().await, ChannelEvent::Message(m) if m == "1"));
            assert!(matches!(channel.next_event().await, ChannelEvent::Message(m) if m == "2"));
        });
    }

    #[test]
    fn test_remote_close() {
        let (mut channel, peer) = Channel::<String, String>::in_memory();
        drop(peer);
        block_on(async {
            assert!(matches!(channel.next_event().await, ChannelEvent::Opened));
            assert!(matches!(channel.next_event().await, ChannelEvent::Closed));
        });
        assert_eq!(channel.state(), ChannelState::Closed);
        assert_eq!(
            channel.send("late".to_string()),
            Err(ChannelError::NotConnected)
        );
    }

    #[test]
    fn test_errors_are_reported() {
        let (mut channel, peer) = Channel::<String, String>::in_memory();
        peer.inbound
            .try_send(Received::Error(ConnectionError::DecodeError("bad".to_string())))
            .unwrap();
        block_on(async {
            assert!(matches!(channel.next_event().await, ChannelEvent::Opened));
            assert!(matches!(
                channel.next_event().await,
                ChannelEvent::Errored(ConnectionError::DecodeError(_))
            ));
        });
        assert!(channel.is_open());
    }

    #[test]
    fn test_disconnect_and_reattach() {
        let (mut channel, _peer) = Channel::<String, String>::in_memory();
        channel.disconnect();
        assert_eq!(channel.state(), ChannelState::Closed);
        assert_eq!(channel.send("x".to_string()), Err(ChannelError::NotConnected));
        block_on(async {
            assert!(matches!(channel.next_event().await, ChannelEvent::Opened));
            assert!(matches!(channel.next_event().await, ChannelEvent::Closed));
        });

        let (conn, peer) = connection::in_memory();
        channel.attach(conn);
        channel.send("again".to_string()).unwrap();
        assert_eq!(peer.sent(), vec!["again".to_string()]);
        block_on(async {
            assert!(matches!(channel.next_event().await, ChannelEvent::Opened));
        });
    }

    #[test]
    fn test_writer_gone() {
        let (channel, peer) = Channel::<String, String>::in_memory();
        drop(peer);
        assert_eq!(channel.send("x".to_string()), Err(ChannelError::NotConnected));
    }
}
