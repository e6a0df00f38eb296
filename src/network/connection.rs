//! A wrapper to convert a WebSocket into channel `Sender` and `Receiver`.
//!
//! ## feature:
//!
//! - Automatic disconnection handling: when the socket goes away, `next`
//!   eventually returns `None` and `Sender::send` starts failing.
//!
//! Messages travel as text frames. Outgoing messages are turned into text
//! with `Into<String>`, incoming text is turned into responses with
//! `TryFrom<String>`.
//!
//! The wrapper may repeatedly send `Ping` frames to check whether the
//! connection is still active. Any write failure stops the writer, so the
//! `Sender` starts returning errors.
//!
//! Dropping the `Conn` struct closes the connection: the writer sends a
//! close frame once all `Sender`s are gone, and the reader stops once the
//! `Receiver` is gone.
//!
//! Frames that cannot be decoded are reported as `Received::Error`,
//! and the connection stays up.
use async_std::channel::{bounded, Receiver, Sender};
use async_std::prelude::Stream;
use async_std::task;
use async_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use async_tungstenite::tungstenite::Message as Frame;
use async_tungstenite::WebSocketStream;
use futures::future;
use futures::stream::{self, BoxStream};
use futures::{AsyncRead, AsyncWrite, SinkExt, StreamExt};
use log::{debug, warn};
use std::fmt::{Debug, Display, Formatter};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

const NET_CHANNEL_SIZE: usize = 20;

/// Connection portal, returned by `handle_connection`.
///
/// The first type parameter is the type of messages sent,
/// the second type parameter is the type of responses received.
///
/// dropping this struct will close the connection
pub struct Conn<Msg, Rsp> {
    sender: Sender<Msg>,
    receiver: Receiver<Received<Rsp>>,
}

impl<Msg, Rsp> Conn<Msg, Rsp> {
    pub fn sender(&self) -> &Sender<Msg> {
        &self.sender
    }
}

impl<Msg, Rsp> Stream for Conn<Msg, Rsp> {
    type Item = Received<Rsp>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_next_unpin(cx)
    }
}

/// wrapper of responses received
pub enum Received<T> {
    /// normal message received
    Response(T),
    /// ping or pong frame
    Ping,
    /// local error: socket failure or undecodable frame
    Error(ConnectionError),
    /// remote closed the connection with an error
    RemoteError(ConnectionError),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectionError {
    /// WebSocket handshake failed
    ConnectFailed(String),
    /// read failure on an established socket
    Socket(String),
    /// attempting to send or receive an over-sized frame
    MaxDataLengthExceeded,
    /// `TryFrom<String>` returned error
    DecodeError(String),
    /// remote close frame with a non-normal code
    RemoteClosed(String),
}

impl Display for ConnectionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionError::ConnectFailed(e) => write!(f, "connect failed: {}", e),
            ConnectionError::Socket(e) => write!(f, "socket error: {}", e),
            ConnectionError::MaxDataLengthExceeded => f.write_str("max data length exceeded"),
            ConnectionError::DecodeError(e) => write!(f, "decode error: {}", e),
            ConnectionError::RemoteClosed(reason) => write!(f, "closed by remote: {}", reason),
        }
    }
}

impl std::error::Error for ConnectionError {}

/// Open a WebSocket to `url` and wrap it.
pub async fn connect<Msg, Rsp>(
    url: &str,
    ping_interval: Option<Duration>,
    max_data_size: usize,
) -> Result<Conn<Msg, Rsp>, ConnectionError>
where
    Msg: Send + 'static + Into<String>,
    Rsp: Send + 'static + TryFrom<String>,
    <Rsp as TryFrom<String>>::Error: Display,
{
    let (ws, _) = async_tungstenite::async_std::connect_async(url)
        .await
        .map_err(|e| ConnectionError::ConnectFailed(e.to_string()))?;
    Ok(handle_connection(ws, ping_interval, max_data_size))
}

pub fn handle_connection<S, Msg, Rsp>(
    ws: WebSocketStream<S>,
    ping_interval: Option<Duration>,
    max_data_size: usize,
) -> Conn<Msg, Rsp>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    Msg: Send + 'static + Into<String>,
    Rsp: Send + 'static + TryFrom<String>,
    <Rsp as TryFrom<String>>::Error: Display,
{
    let (msg_sender, msg_receiver) = bounded(NET_CHANNEL_SIZE);
    let (rsp_sender, rsp_receiver) = bounded(NET_CHANNEL_SIZE);
    let (sink, stream) = ws.split();
    send_messages(sink, msg_receiver, ping_interval, max_data_size);
    retrieve_messages(stream, rsp_sender, max_data_size);
    Conn {
        sender: msg_sender,
        receiver: rsp_receiver,
    }
}

enum MessageType<Msg> {
    Data(Msg),
    Ping,
    /// every `Sender<Msg>` is gone
    Close,
}

/// This function takes the ownership of the only instance of `Sender<Rsp>`.
///
/// Dropping the receiver of responses stops reading.
fn retrieve_messages<S, Rsp>(
    mut stream: stream::SplitStream<WebSocketStream<S>>,
    rsp_sender: Sender<Received<Rsp>>,
    max_data_size: usize,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    Rsp: Send + 'static + TryFrom<String>,
    <Rsp as TryFrom<String>>::Error: Display,
{
    task::spawn(async move {
        while let Some(frame) = stream.next().await {
            let received = match frame {
                Ok(Frame::Text(text)) => read_rsp(text, max_data_size),
                Ok(Frame::Binary(bytes)) => match String::from_utf8(bytes) {
                    Ok(text) => read_rsp(text, max_data_size),
                    Err(e) => Received::Error(ConnectionError::DecodeError(e.to_string())),
                },
                Ok(Frame::Ping(_)) | Ok(Frame::Pong(_)) => Received::Ping,
                Ok(Frame::Close(Some(close))) if close.code != CloseCode::Normal => {
                    Received::RemoteError(ConnectionError::RemoteClosed(close.reason.to_string()))
                }
                // the stream ends right after the close handshake
                Ok(Frame::Close(_)) | Ok(Frame::Frame(_)) => continue,
                Err(e) => {
                    let _ = rsp_sender
                        .send(Received::Error(ConnectionError::Socket(e.to_string())))
                        .await;
                    break;
                }
            };
            if rsp_sender.send(received).await.is_err() {
                break;
            }
        }
        debug!("websocket reader stopped");
    });
}

/// This function takes the ownership of `Receiver<Msg>`.
///
/// ## Closing Connection:
/// Drop all instances of `Sender<Msg>`, and this function sends a close
/// frame.
///
/// ## Error Handling:
/// On write error, this function stops and drops `Receiver<Msg>`.
fn send_messages<S, Msg>(
    mut sink: stream::SplitSink<WebSocketStream<S>, Frame>,
    msg_receiver: Receiver<Msg>,
    ping_interval: Option<Duration>,
    max_data_size: usize,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    Msg: Send + 'static + Into<String>,
{
    let data = msg_receiver
        .map(MessageType::Data)
        .chain(stream::once(future::ready(MessageType::Close)));
    let pings: BoxStream<'static, MessageType<Msg>> = match ping_interval {
        Some(interval) => stream::unfold((), move |_| async move {
            task::sleep(interval).await;
            Some((MessageType::Ping, ()))
        })
        .boxed(),
        None => stream::pending().boxed(),
    };
    task::spawn(async move {
        let mut outgoing = stream::select(data, pings);
        while let Some(msg) = outgoing.next().await {
            let frame = match msg {
                MessageType::Data(msg) => match wrap_data_payload(msg.into(), max_data_size) {
                    Ok(frame) => frame,
                    Err(e) => {
                        warn!("message not sent: {}", e);
                        continue;
                    }
                },
                MessageType::Ping => Frame::Ping(Vec::new()),
                MessageType::Close => break,
            };
            if let Err(e) = sink.send(frame).await {
                debug!("websocket write failed: {}", e);
                return;
            }
        }
        let _ = sink.close().await;
    });
}

fn read_rsp<Rsp>(text: String, max_data_size: usize) -> Received<Rsp>
where
    Rsp: TryFrom<String>,
    <Rsp as TryFrom<String>>::Error: Display,
{
    if text.len() > max_data_size {
        return Received::Error(ConnectionError::MaxDataLengthExceeded);
    }
    match Rsp::try_from(text) {
        Ok(rsp) => Received::Response(rsp),
        Err(e) => Received::Error(ConnectionError::DecodeError(e.to_string())),
    }
}

#[inline]
fn wrap_data_payload(payload: String, max_data_size: usize) -> Result<Frame, ConnectionError> {
    if payload.len() > max_data_size {
        Err(ConnectionError::MaxDataLengthExceeded)
    } else {
        Ok(Frame::Text(payload))
    }
}

/// The far end of an in-memory `Conn`.
#[cfg(test)]
pub(crate) struct Peer<Msg, Rsp> {
    pub(crate) outbound: Receiver<Msg>,
    pub(crate) inbound: Sender<Received<Rsp>>,
}

#[cfg(test)]
impl<Msg, Rsp> Peer<Msg, Rsp> {
    /// Everything sent so far, without waiting.
    pub(crate) fn sent(&self) -> Vec<Msg> {
        let mut sent = Vec::new();
        while let Ok(msg) = self.outbound.try_recv() {
            sent.push(msg);
        }
        sent
    }

    pub(crate) fn reply(&self, rsp: Rsp) {
        self.inbound
            .try_send(Received::Response(rsp))
            .unwrap_or_else(|_| panic!("peer inbound queue full or closed"));
    }
}

/// A `Conn` wired to channels instead of a socket.
#[cfg(test)]
pub(crate) fn in_memory<Msg, Rsp>() -> (Conn<Msg, Rsp>, Peer<Msg, Rsp>) {
    let (msg_sender, msg_receiver) = bounded(NET_CHANNEL_SIZE);
    let (rsp_sender, rsp_receiver) = bounded(NET_CHANNEL_SIZE);
    (
        Conn {
            sender: msg_sender,
            receiver: rsp_receiver,
        },
        Peer {
            outbound: msg_receiver,
            inbound: rsp_sender,
        },
    )
}

impl<T> Debug for Received<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Received::Response(_) => f.write_str("Received::Response"),
            Received::Ping => f.write_str("Received::Ping"),
            Received::Error(e) => write!(f, "Received::Error({})", e),
            Received::RemoteError(e) => write!(f, "Received::RemoteError({})", e),
        }
    }
}
