//! WebSocket framing for the shell socket.
//!
//! One WebSocket message carries one JSON [`TerminalMessage`]. The channel
//! is split into a reader half with a single owner and a cloneable writer
//! half whose sends are serialised by a mutex, so concurrent writers never
//! interleave frames.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::error::ProtocolError;
use tokio_tungstenite::tungstenite::http::header::{HeaderValue, AUTHORIZATION, USER_AGENT};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

use srep_core::codec;
use srep_core::context::CallContext;
use srep_core::error::{SrepError, SrepResult};
use srep_core::messages::TerminalMessage;

use super::{ShellTarget, STATUS_TOO_EARLY};

/// How long [`MessageWriter::close`] waits for a peer that stopped reading.
pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// The byte stream under a client connection.
pub type WsStream = MaybeTlsStream<TcpStream>;

/// An established shell socket, before it is split between tasks.
pub struct MessageChannel<S> {
    ws: WebSocketStream<S>,
}

impl<S> MessageChannel<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(ws: WebSocketStream<S>) -> Self {
        Self { ws }
    }

    /// Split into the single reader and the shared writer.
    pub fn split(self) -> (MessageReader<S>, MessageWriter<S>) {
        let (sink, stream) = self.ws.split();
        (
            MessageReader { stream },
            MessageWriter {
                sink: Arc::new(Mutex::new(sink)),
                closed: Arc::new(AtomicBool::new(false)),
            },
        )
    }
}

/// Receiving half. Not `Clone`: exactly one task reads.
pub struct MessageReader<S> {
    stream: SplitStream<WebSocketStream<S>>,
}

impl<S> MessageReader<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wait for the next message.
    ///
    /// Returns `Ok(None)` on a normal close. A close with any other code, or
    /// the stream ending without a close frame, is
    /// [`SrepError::UnexpectedClose`]. Cancel-safe.
    pub async fn read(&mut self) -> SrepResult<Option<TerminalMessage>> {
        loop {
            let frame = match self.stream.next().await {
                Some(Ok(frame)) => frame,
                Some(Err(e)) => return classify_read_error(e),
                None => return Err(SrepError::UnexpectedClose { code: None }),
            };

            match frame {
                Message::Text(text) => return codec::decode(text.as_bytes()).map(Some),
                Message::Binary(data) => return codec::decode(&data).map(Some),
                Message::Close(None) => {
                    debug!("close frame without code");
                    return Ok(None);
                }
                Message::Close(Some(close)) if close.code == CloseCode::Normal => {
                    debug!(reason = %close.reason, "normal close");
                    return Ok(None);
                }
                Message::Close(Some(close)) => {
                    debug!(code = u16::from(close.code), reason = %close.reason, "abnormal close");
                    return Err(SrepError::UnexpectedClose {
                        code: Some(u16::from(close.code)),
                    });
                }
                // Transport-level ping/pong is answered by tungstenite itself.
                _ => continue,
            }
        }
    }
}

fn classify_read_error(e: WsError) -> SrepResult<Option<TerminalMessage>> {
    match e {
        WsError::ConnectionClosed | WsError::AlreadyClosed => Ok(None),
        WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake) => {
            Err(SrepError::UnexpectedClose { code: None })
        }
        WsError::Io(io)
            if matches!(
                io.kind(),
                std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::UnexpectedEof
            ) =>
        {
            Err(SrepError::UnexpectedClose { code: None })
        }
        WsError::Io(io) => Err(SrepError::Io(io)),
        other => Err(SrepError::Transport(format!("WS read error: {other}"))),
    }
}

/// Sending half, shared by every task that writes.
pub struct MessageWriter<S> {
    sink: Arc<Mutex<SplitSink<WebSocketStream<S>, Message>>>,
    closed: Arc<AtomicBool>,
}

impl<S> Clone for MessageWriter<S> {
    fn clone(&self) -> Self {
        Self {
            sink: self.sink.clone(),
            closed: self.closed.clone(),
        }
    }
}

impl<S> MessageWriter<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Encode and send one message. The whole frame goes out under the lock.
    pub async fn write(&self, msg: &TerminalMessage) -> SrepResult<()> {
        if self.is_closed() {
            return Err(SrepError::Transport("WS write after close".into()));
        }
        let text = codec::encode(msg)?;
        let mut sink = self.sink.lock().await;
        sink.send(Message::Text(text))
            .await
            .map_err(|e| SrepError::Transport(format!("WS write error: {e}")))
    }

    /// [`write`](Self::write), abandoned as soon as `ctx` is done.
    ///
    /// A frame is either queued whole or not at all, so giving up while the
    /// peer is not draining the socket never leaves a partial frame behind.
    pub async fn write_until(&self, ctx: &CallContext, msg: &TerminalMessage) -> SrepResult<()> {
        tokio::select! {
            biased;
            interrupted = ctx.done() => Err(interrupted.into()),
            result = self.write(msg) => result,
        }
    }

    /// Send a close frame. Only the first call does anything; it gives up
    /// after [`CLOSE_TIMEOUT`].
    pub async fn close(&self) -> SrepResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let closing = async {
            let mut sink = self.sink.lock().await;
            sink.close().await
        };
        match tokio::time::timeout(CLOSE_TIMEOUT, closing).await {
            Ok(Ok(())) | Ok(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) => Ok(()),
            Ok(Err(e)) => Err(SrepError::Transport(format!("WS close error: {e}"))),
            Err(_) => Err(SrepError::Transport("WS close timed out".into())),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Open the shell socket: one attempt, bearer auth, no retry.
///
/// A 425 answer becomes [`SrepError::TooEarly`] so callers can compose the
/// attempt with [`crate::retry`].
pub async fn connect(target: &ShellTarget) -> SrepResult<MessageChannel<WsStream>> {
    let mut request = target
        .url
        .as_str()
        .into_client_request()
        .map_err(|e| SrepError::Connect {
            status: None,
            reason: format!("invalid shell URL {}: {e}", target.url),
        })?;

    let bearer = HeaderValue::from_str(&format!("Bearer {}", target.token))
        .map_err(|_| SrepError::InvalidConfig("token contains invalid header characters".into()))?;
    let headers = request.headers_mut();
    headers.insert(AUTHORIZATION, bearer);
    headers.insert(USER_AGENT, HeaderValue::from_static(super::USER_AGENT));

    debug!(url = %target.url, rows = target.rows, cols = target.cols, "opening shell socket");

    match connect_async(request).await {
        Ok((ws, _response)) => {
            info!(url = %target.url, "shell socket connected");
            Ok(MessageChannel::new(ws))
        }
        Err(WsError::Http(response)) => {
            let status = response.status().as_u16();
            if status == STATUS_TOO_EARLY {
                debug!(url = %target.url, "shell not provisioned yet");
                return Err(SrepError::TooEarly);
            }
            Err(SrepError::Connect {
                status: Some(status),
                reason: response
                    .status()
                    .canonical_reason()
                    .unwrap_or("upgrade rejected")
                    .to_string(),
            })
        }
        Err(e) => Err(SrepError::Connect {
            status: None,
            reason: e.to_string(),
        }),
    }
}
