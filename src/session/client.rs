use crate::identity::Identity;
use crate::session::session::{GameChannel, Session, SessionEvent, UserIntent};
use crate::CHANNEL_SIZE;
use anyhow::{Error, Result};
use async_std::channel::{bounded, Receiver, Sender};
use futures::{select, FutureExt, StreamExt};
use log::{info, warn};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 8765;
pub const DEFAULT_IDENTITY_PATH: &str = ".thaler-identity";
const PING_INTERVAL: Option<Duration> = Some(Duration::from_secs(5));
const MAX_DATA_SIZE: usize = 1024 * 64;

/// Where to connect and where to keep the identity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    /// `ws://host:port` or `wss://...`
    pub endpoint: String,
    pub identity_path: PathBuf,
}

impl ClientConfig {
    /// `<host[:port] | ws://url> [identity path]`, program name excluded.
    pub fn from_args<I: IntoIterator<Item = String>>(args: I) -> Result<Self> {
        let mut args = args.into_iter();
        let address = args.next().ok_or_else(|| {
            Error::msg("usage: ./thaler-client {server host[:port] | ws://url} {identity db path}")
        })?;
        let identity_path = args
            .next()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_IDENTITY_PATH));
        Ok(ClientConfig {
            endpoint: endpoint_url(&address)?,
            identity_path,
        })
    }
}

fn endpoint_url(address: &str) -> Result<String> {
    let address = address.trim();
    if address.is_empty() {
        return Err(Error::msg("empty server address"));
    }
    if address.starts_with("ws://") || address.starts_with("wss://") {
        return Ok(address.to_string());
    }
    if address.contains("://") {
        return Err(Error::msg(format!("unsupported scheme in `{}`", address)));
    }
    if address.rsplit_once(':').map_or(false, |(_, port)| !port.is_empty()) {
        Ok(format!("ws://{}", address))
    } else {
        Ok(format!("ws://{}:{}", address.trim_end_matches(':'), DEFAULT_PORT))
    }
}

/// Input from the player, in the order typed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClientCommand {
    Intent(UserIntent),
    /// open a fresh connection, the stored identity resumes the seat
    Reconnect,
    /// redraw without changing anything
    Render,
    Exit,
}

pub fn command_channel() -> (Sender<ClientCommand>, Receiver<ClientCommand>) {
    bounded(CHANNEL_SIZE)
}

enum NextStep {
    Continue,
    Exit,
}

enum Step<E, C> {
    Event(E),
    Command(C),
}

/// Drive one session until `Exit`, the command source closes, or the room is full.
///
/// `render` is called after every change of the session.
pub async fn run<F>(
    config: &ClientConfig,
    identity: Identity,
    commands: Receiver<ClientCommand>,
    mut render: F,
) -> Result<Session>
where
    F: FnMut(&Session),
{
    info!("player id {} ({:?})", identity.token, identity.origin);
    let mut session = Session::new(identity);
    let mut channel = GameChannel::new(PING_INTERVAL, MAX_DATA_SIZE);
    open(&mut channel, &config.endpoint).await;
    render(&session);
    let mut commands = commands.fuse();
    loop {
        let next = select! {
            event = channel.next_event().fuse() => Step::Event(event),
            cmd = commands.next() => Step::Command(cmd),
        };
        let next_step = match next {
            Step::Event(event) => {
                if let Some(event) = SessionEvent::from_channel(event) {
                    session.handle(event, &channel);
                    render(&session);
                }
                NextStep::Continue
            }
            Step::Command(cmd) => {
                handle_command(cmd, &mut session, &mut channel, &config.endpoint, &mut render)
                    .await
            }
        };
        if session.is_terminal() {
            info!("room full, leaving");
            channel.disconnect();
            break;
        }
        if let NextStep::Exit = next_step {
            channel.disconnect();
            break;
        }
    }
    Ok(session)
}

async fn handle_command<F>(
    cmd: Option<ClientCommand>,
    session: &mut Session,
    channel: &mut GameChannel,
    endpoint: &str,
    render: &mut F,
) -> NextStep
where
    F: FnMut(&Session),
{
    match cmd {
        Some(ClientCommand::Intent(intent)) => {
            session.handle(SessionEvent::Intent(intent), channel);
            render(session);
        }
        Some(ClientCommand::Reconnect) => {
            // the `Closed` for the old connection is queued ahead of `Opened`
            channel.disconnect();
            open(channel, endpoint).await;
        }
        Some(ClientCommand::Render) => render(session),
        Some(ClientCommand::Exit) | None => return NextStep::Exit,
    }
    NextStep::Continue
}

async fn open(channel: &mut GameChannel, endpoint: &str) {
    if let Err(e) = channel.connect(endpoint).await {
        warn!("offline: {}", e);
    }
}
