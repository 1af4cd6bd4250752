//! Shell relay: keeps one play shell alive and pipes bytes both ways.
//!
//! Three tasks share one socket and one session-scoped cancellation:
//!
//! - the reader answers every `ping` with a `pong` before it reads again and
//!   writes everything else to the output sink;
//! - the resize watcher polls the local terminal size and sends a `resize`
//!   whenever it changes (always once at start);
//! - the input forwarder sends local input as `input` messages.
//!
//! The reader's exit ends the session. It cancels the session scope, the
//! three tasks are joined, and the socket is closed once before [`run`]
//! returns. Results of the other two tasks are reported in [`ShellOutcome`]
//! but never change how the session ended.

use std::io;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

use srep_core::codec::Utf8Decoder;
use srep_core::context::CallContext;
use srep_core::error::{SrepError, SrepResult};
use srep_core::messages::{Dimensions, MessageType, TerminalMessage};

use crate::transport::{MessageChannel, MessageReader, MessageWriter};

/// Local input is read in chunks of this size.
pub const INPUT_CHUNK_SIZE: usize = 1024;

/// How often the local terminal size is polled.
pub const RESIZE_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct ShellOptions {
    pub resize_interval: Duration,
    pub input_chunk_size: usize,
}

impl Default for ShellOptions {
    fn default() -> Self {
        Self {
            resize_interval: RESIZE_INTERVAL,
            input_chunk_size: INPUT_CHUNK_SIZE,
        }
    }
}

/// Source of the local terminal's current size.
pub trait TerminalSize {
    fn dimensions(&self) -> io::Result<Dimensions>;
}

impl<F> TerminalSize for F
where
    F: Fn() -> io::Result<Dimensions>,
{
    fn dimensions(&self) -> io::Result<Dimensions> {
        self()
    }
}

/// How the session ended, as seen by the reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellExit {
    /// The remote closed the socket normally.
    Closed,
    /// The remote went away without a normal close.
    Disconnected { code: Option<u16> },
    /// The caller cancelled the session or its deadline passed.
    Cancelled,
}

/// Why the input forwarder stopped without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEnd {
    /// The local input source reached end of input.
    Eof,
    /// The session ended first.
    Cancelled,
}

#[derive(Debug)]
pub struct ShellOutcome {
    pub exit: ShellExit,
    pub input: SrepResult<InputEnd>,
    pub resize: SrepResult<()>,
}

/// Relay a shell session until the remote closes it or `ctx` is cancelled.
///
/// Returns `Err` only when the reader fails: a malformed frame, a transport
/// error, or a failed write to `output`.
pub async fn run<S, I, O, T>(
    channel: MessageChannel<S>,
    input: I,
    output: O,
    size: T,
    opts: &ShellOptions,
    ctx: &CallContext,
) -> SrepResult<ShellOutcome>
where
    S: AsyncRead + AsyncWrite + Unpin,
    I: AsyncRead + Unpin,
    O: AsyncWrite + Unpin,
    T: TerminalSize,
{
    let session = ctx.child();
    let (reader, writer) = channel.split();
    info!("shell session active");

    let (exit, resize, input) = tokio::join!(
        read_loop(reader, writer.clone(), output, session.clone()),
        watch_resize(writer.clone(), size, opts.resize_interval, session.clone()),
        forward_input(writer.clone(), input, opts.input_chunk_size.max(1), session.clone()),
    );

    if let Err(e) = writer.close().await {
        debug!(error = %e, "closing shell socket failed");
    }

    if let Err(e) = &resize {
        warn!(error = %e, "resize watcher stopped");
    }
    if let Err(e) = &input {
        warn!(error = %e, "input forwarder stopped");
    }

    let exit = exit?;
    info!(exit = ?exit, "shell session terminated");
    Ok(ShellOutcome {
        exit,
        input,
        resize,
    })
}

async fn read_loop<S, O>(
    mut reader: MessageReader<S>,
    writer: MessageWriter<S>,
    mut output: O,
    session: CallContext,
) -> SrepResult<ShellExit>
where
    S: AsyncRead + AsyncWrite + Unpin,
    O: AsyncWrite + Unpin,
{
    // Whatever way the reader leaves, the other tasks stop with it.
    let _stop = session.token().clone().drop_guard();

    loop {
        let next = tokio::select! {
            biased;
            _ = session.done() => return Ok(ShellExit::Cancelled),
            next = reader.read() => next,
        };

        let msg = match next {
            Ok(Some(msg)) => msg,
            Ok(None) => {
                debug!("remote closed the shell");
                return Ok(ShellExit::Closed);
            }
            Err(SrepError::UnexpectedClose { code }) => {
                warn!(code = ?code, "shell connection closed unexpectedly");
                return Ok(ShellExit::Disconnected { code });
            }
            Err(e) => return Err(e),
        };

        match msg.kind {
            MessageType::Ping => {
                match writer.write_until(&session, &TerminalMessage::pong()).await {
                    Err(e) if e.is_interrupted() => return Ok(ShellExit::Cancelled),
                    other => other?,
                }
                trace!("answered ping");
            }
            kind => {
                if kind == MessageType::PlayFinished {
                    info!("play finished");
                }
                if !msg.content.is_empty() {
                    tokio::select! {
                        biased;
                        _ = session.done() => return Ok(ShellExit::Cancelled),
                        written = write_output(&mut output, &msg.content) => written?,
                    }
                }
            }
        }
    }
}

async fn write_output<O>(output: &mut O, content: &str) -> io::Result<()>
where
    O: AsyncWrite + Unpin,
{
    output.write_all(content.as_bytes()).await?;
    output.flush().await
}

async fn watch_resize<S, T>(
    writer: MessageWriter<S>,
    size: T,
    every: Duration,
    session: CallContext,
) -> SrepResult<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
    T: TerminalSize,
{
    let mut last: Option<Dimensions> = None;
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = session.done() => return Ok(()),
            _ = ticker.tick() => {}
        }

        let dims = match size.dimensions() {
            Ok(dims) => dims,
            Err(e) => {
                debug!(error = %e, "terminal size unavailable");
                continue;
            }
        };
        if last == Some(dims) {
            continue;
        }

        match writer.write_until(&session, &TerminalMessage::resize(dims)).await {
            Err(e) if e.is_interrupted() => return Ok(()),
            other => other?,
        }
        debug!(rows = dims.rows, cols = dims.cols, "sent resize");
        last = Some(dims);
    }
}

async fn forward_input<S, I>(
    writer: MessageWriter<S>,
    mut input: I,
    chunk_size: usize,
    session: CallContext,
) -> SrepResult<InputEnd>
where
    S: AsyncRead + AsyncWrite + Unpin,
    I: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; chunk_size];
    let mut decoder = Utf8Decoder::new();

    loop {
        let n = tokio::select! {
            biased;
            _ = session.done() => return Ok(InputEnd::Cancelled),
            n = input.read(&mut buf) => n?,
        };

        if n == 0 {
            let tail = decoder.finish();
            if !tail.is_empty() {
                match writer.write_until(&session, &TerminalMessage::input(tail)).await {
                    Err(e) if e.is_interrupted() => return Ok(InputEnd::Cancelled),
                    other => other?,
                }
            }
            debug!("local input reached end of input");
            return Ok(InputEnd::Eof);
        }

        let text = decoder.feed(&buf[..n]);
        if text.is_empty() {
            continue;
        }
        match writer.write_until(&session, &TerminalMessage::input(text)).await {
            Err(e) if e.is_interrupted() => return Ok(InputEnd::Cancelled),
            other => other?,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use futures_util::{SinkExt, StreamExt};
    use srep_core::codec;
    use tokio::io::DuplexStream;
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
    use tokio_tungstenite::tungstenite::protocol::CloseFrame;
    use tokio_tungstenite::tungstenite::Message;
    use tokio_tungstenite::WebSocketStream;

    use super::*;
    use crate::transport::websocket::testing::duplex_pair;

    fn fast() -> ShellOptions {
        ShellOptions {
            resize_interval: Duration::from_millis(10),
            input_chunk_size: INPUT_CHUNK_SIZE,
        }
    }

    fn fixed(rows: u16, cols: u16) -> impl Fn() -> io::Result<Dimensions> {
        move || Ok(Dimensions::new(rows, cols))
    }

    async fn send(server: &mut WebSocketStream<DuplexStream>, msg: TerminalMessage) {
        let text = codec::encode(&msg).unwrap();
        server.send(Message::Text(text)).await.unwrap();
    }

    /// Next application message from the client, skipping `skip` kinds.
    async fn recv_skipping(
        server: &mut WebSocketStream<DuplexStream>,
        skip: &[MessageType],
    ) -> Option<TerminalMessage> {
        while let Some(frame) = server.next().await {
            match frame.unwrap() {
                Message::Text(text) => {
                    let msg = codec::decode(text.as_bytes()).unwrap();
                    if !skip.contains(&msg.kind) {
                        return Some(msg);
                    }
                }
                Message::Close(_) => return None,
                _ => {}
            }
        }
        None
    }

    async fn close_normally(server: &mut WebSocketStream<DuplexStream>) {
        server
            .send(Message::Close(Some(CloseFrame {
                code: CloseCode::Normal,
                reason: "".into(),
            })))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn ping_is_answered_before_next_read() {
        let (channel, mut server) = duplex_pair().await;
        let (_in_tx, in_rx) = tokio::io::duplex(64);
        let ctx = CallContext::new();

        let remote = tokio::spawn(async move {
            for _ in 0..3 {
                send(&mut server, TerminalMessage::new(MessageType::Ping, "")).await;
                // Nothing else is sent until the pong arrives.
                let reply = recv_skipping(&mut server, &[MessageType::Resize]).await.unwrap();
                assert_eq!(reply.kind, MessageType::Pong);
            }
            close_normally(&mut server).await;
            server
        });

        let outcome = run(channel, in_rx, tokio::io::sink(), fixed(24, 80), &fast(), &ctx)
            .await
            .unwrap();
        assert_eq!(outcome.exit, ShellExit::Closed);
        remote.await.unwrap();
    }

    #[tokio::test]
    async fn exactly_one_pong_per_ping() {
        let (channel, mut server) = duplex_pair().await;
        let (_in_tx, in_rx) = tokio::io::duplex(64);
        let ctx = CallContext::new();

        let remote = tokio::spawn(async move {
            for _ in 0..5 {
                send(&mut server, TerminalMessage::new(MessageType::Ping, "")).await;
            }
            send(&mut server, TerminalMessage::new(MessageType::Output, "done")).await;
            close_normally(&mut server).await;

            let mut pongs = 0;
            while let Some(msg) = recv_skipping(&mut server, &[MessageType::Resize]).await {
                assert_eq!(msg.kind, MessageType::Pong);
                pongs += 1;
            }
            pongs
        });

        let (out_tx, mut out_rx) = tokio::io::duplex(1024);
        let outcome = run(channel, in_rx, out_tx, fixed(24, 80), &fast(), &ctx)
            .await
            .unwrap();
        assert_eq!(outcome.exit, ShellExit::Closed);
        assert_eq!(remote.await.unwrap(), 5);

        let mut out = String::new();
        out_rx.read_to_string(&mut out).await.unwrap();
        assert_eq!(out, "done");
    }

    #[tokio::test]
    async fn output_is_written_in_order() {
        let (channel, mut server) = duplex_pair().await;
        let (_in_tx, in_rx) = tokio::io::duplex(64);
        let ctx = CallContext::new();

        tokio::spawn(async move {
            send(&mut server, TerminalMessage::new(MessageType::Output, "$ ")).await;
            send(&mut server, TerminalMessage::new(MessageType::Ping, "")).await;
            send(&mut server, TerminalMessage::new(MessageType::Output, "ls\r\n")).await;
            send(&mut server, TerminalMessage::new(MessageType::PlayFinished, "bye\r\n")).await;
            close_normally(&mut server).await;
            // Keep the socket open until the client has closed its side.
            while recv_skipping(&mut server, &[]).await.is_some() {}
        });

        let (out_tx, mut out_rx) = tokio::io::duplex(1024);
        let outcome = run(channel, in_rx, out_tx, fixed(24, 80), &fast(), &ctx)
            .await
            .unwrap();
        assert_eq!(outcome.exit, ShellExit::Closed);

        let mut out = String::new();
        out_rx.read_to_string(&mut out).await.unwrap();
        assert_eq!(out, "$ ls\r\nbye\r\n");
    }

    #[tokio::test]
    async fn resize_sent_first_then_only_on_change() {
        let (channel, mut server) = duplex_pair().await;
        let (_in_tx, in_rx) = tokio::io::duplex(64);
        let ctx = CallContext::new();

        let polls = Arc::new(AtomicUsize::new(0));
        let size = {
            let polls = polls.clone();
            move || {
                let n = polls.fetch_add(1, Ordering::SeqCst);
                match n {
                    0..=2 => Ok(Dimensions::new(24, 80)),
                    3 => Err(io::Error::other("not a tty")),
                    _ => Ok(Dimensions::new(50, 132)),
                }
            }
        };

        let remote = tokio::spawn(async move {
            let first = recv_skipping(&mut server, &[]).await.unwrap();
            let second = recv_skipping(&mut server, &[]).await.unwrap();
            close_normally(&mut server).await;
            (first, second)
        });

        let outcome = run(channel, in_rx, tokio::io::sink(), size, &fast(), &ctx)
            .await
            .unwrap();
        let (first, second) = remote.await.unwrap();

        assert_eq!(first, TerminalMessage::resize(Dimensions::new(24, 80)));
        assert_eq!(second, TerminalMessage::resize(Dimensions::new(50, 132)));
        assert!(polls.load(Ordering::SeqCst) >= 5);
        for msg in [&first, &second] {
            let (rows, cols) = msg.content.split_once(',').unwrap();
            assert!(rows.bytes().all(|b| b.is_ascii_digit()) && !rows.is_empty());
            assert!(cols.bytes().all(|b| b.is_ascii_digit()) && !cols.is_empty());
        }
        assert!(outcome.resize.is_ok());
    }

    #[tokio::test]
    async fn input_is_forwarded_and_eof_keeps_session() {
        let (channel, mut server) = duplex_pair().await;
        let (mut in_tx, in_rx) = tokio::io::duplex(64);
        let ctx = CallContext::new();

        let remote = tokio::spawn(async move {
            let mut typed = String::new();
            while typed != "ls -la\r" {
                let msg = recv_skipping(&mut server, &[MessageType::Resize]).await.unwrap();
                assert_eq!(msg.kind, MessageType::Input);
                typed.push_str(&msg.content);
            }
            // Input is closed now, yet output still flows.
            tokio::time::sleep(Duration::from_millis(30)).await;
            send(&mut server, TerminalMessage::new(MessageType::Output, "total 0\r\n")).await;
            close_normally(&mut server).await;
        });

        in_tx.write_all("ls ".as_bytes()).await.unwrap();
        in_tx.write_all("-la\r".as_bytes()).await.unwrap();
        drop(in_tx);

        let (out_tx, mut out_rx) = tokio::io::duplex(1024);
        let outcome = run(channel, in_rx, out_tx, fixed(24, 80), &fast(), &ctx)
            .await
            .unwrap();
        remote.await.unwrap();

        assert_eq!(outcome.exit, ShellExit::Closed);
        assert_eq!(outcome.input.unwrap(), InputEnd::Eof);
        let mut out = String::new();
        out_rx.read_to_string(&mut out).await.unwrap();
        assert_eq!(out, "total 0\r\n");
    }

    #[tokio::test]
    async fn split_utf8_input_is_sent_whole() {
        let (channel, mut server) = duplex_pair().await;
        let (mut in_tx, in_rx) = tokio::io::duplex(64);
        let ctx = CallContext::new();
        let opts = ShellOptions {
            input_chunk_size: 1,
            ..fast()
        };

        let remote = tokio::spawn(async move {
            let mut typed = String::new();
            while typed != "é✓" {
                let msg = recv_skipping(&mut server, &[MessageType::Resize]).await.unwrap();
                assert!(!msg.content.contains('\u{fffd}'));
                typed.push_str(&msg.content);
            }
            close_normally(&mut server).await;
        });

        in_tx.write_all("é✓".as_bytes()).await.unwrap();
        let outcome = run(channel, in_rx, tokio::io::sink(), fixed(24, 80), &opts, &ctx)
            .await
            .unwrap();
        remote.await.unwrap();
        assert_eq!(outcome.exit, ShellExit::Closed);
        assert_eq!(outcome.input.unwrap(), InputEnd::Cancelled);
    }

    #[tokio::test]
    async fn cancellation_stops_all_tasks_and_closes_once() {
        let (channel, mut server) = duplex_pair().await;
        let (_in_tx, in_rx) = tokio::io::duplex(64);
        let ctx = CallContext::new();

        let remote = tokio::spawn(async move {
            let mut closes = 0;
            while let Some(frame) = server.next().await {
                if let Ok(Message::Close(_)) = frame {
                    closes += 1;
                }
            }
            closes
        });

        let canceller = {
            let ctx = ctx.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(30)).await;
                ctx.cancel();
                ctx.cancel();
            })
        };

        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            run(channel, in_rx, tokio::io::sink(), fixed(24, 80), &fast(), &ctx),
        )
        .await
        .expect("relay must return after cancellation")
        .unwrap();
        canceller.await.unwrap();

        assert_eq!(outcome.exit, ShellExit::Cancelled);
        assert_eq!(outcome.input.unwrap(), InputEnd::Cancelled);
        assert!(outcome.resize.is_ok());
        assert_eq!(remote.await.unwrap(), 1);
    }

    #[tokio::test]
    async fn decode_error_ends_session_with_error() {
        let (channel, mut server) = duplex_pair().await;
        let (_in_tx, in_rx) = tokio::io::duplex(64);
        let ctx = CallContext::new();

        tokio::spawn(async move {
            server.send(Message::Text("{oops".into())).await.unwrap();
            while recv_skipping(&mut server, &[]).await.is_some() {}
        });

        let result = run(channel, in_rx, tokio::io::sink(), fixed(24, 80), &fast(), &ctx).await;
        assert!(matches!(result, Err(SrepError::Decode(_))));
        // The caller's context is untouched; only the session scope ended.
        assert!(ctx.interrupted().is_none());
    }

    #[tokio::test]
    async fn abnormal_close_is_disconnected() {
        let (channel, mut server) = duplex_pair().await;
        let (_in_tx, in_rx) = tokio::io::duplex(64);
        let ctx = CallContext::new();

        tokio::spawn(async move {
            server
                .send(Message::Close(Some(CloseFrame {
                    code: CloseCode::Error,
                    reason: "container died".into(),
                })))
                .await
                .unwrap();
            while recv_skipping(&mut server, &[]).await.is_some() {}
        });

        let outcome = run(channel, in_rx, tokio::io::sink(), fixed(24, 80), &fast(), &ctx)
            .await
            .unwrap();
        assert_eq!(outcome.exit, ShellExit::Disconnected { code: Some(1011) });
    }

    #[tokio::test]
    async fn cancellation_reaches_tasks_blocked_on_a_stalled_peer() {
        // The server end stays open but is never read, so every write blocks
        // once the pipe is full.
        let (channel, _server) = duplex_pair().await;
        let ctx = CallContext::new();

        let canceller = {
            let ctx = ctx.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(300)).await;
                ctx.cancel();
            })
        };

        let outcome = tokio::time::timeout(
            Duration::from_secs(3),
            run(
                channel,
                tokio::io::repeat(b'a'),
                tokio::io::sink(),
                fixed(24, 80),
                &fast(),
                &ctx,
            ),
        )
        .await
        .expect("relay must return after cancellation")
        .unwrap();
        canceller.await.unwrap();

        assert_eq!(outcome.exit, ShellExit::Cancelled);
        assert_eq!(outcome.input.unwrap(), InputEnd::Cancelled);
        assert!(outcome.resize.is_ok());
    }

    #[tokio::test]
    async fn failing_output_ends_session_with_error_and_closes_once() {
        struct Broken;
        impl AsyncWrite for Broken {
            fn poll_write(
                self: std::pin::Pin<&mut Self>,
                _cx: &mut std::task::Context<'_>,
                _buf: &[u8],
            ) -> std::task::Poll<io::Result<usize>> {
                std::task::Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "stdout gone")))
            }
            fn poll_flush(
                self: std::pin::Pin<&mut Self>,
                _cx: &mut std::task::Context<'_>,
            ) -> std::task::Poll<io::Result<()>> {
                std::task::Poll::Ready(Ok(()))
            }
            fn poll_shutdown(
                self: std::pin::Pin<&mut Self>,
                _cx: &mut std::task::Context<'_>,
            ) -> std::task::Poll<io::Result<()>> {
                std::task::Poll::Ready(Ok(()))
            }
        }

        let (channel, mut server) = duplex_pair().await;
        let (_in_tx, in_rx) = tokio::io::duplex(64);
        let ctx = CallContext::new();

        let remote = tokio::spawn(async move {
            send(&mut server, TerminalMessage::new(MessageType::Output, "hello")).await;
            let mut closes = 0;
            while let Some(frame) = server.next().await {
                if let Ok(Message::Close(_)) = frame {
                    closes += 1;
                }
            }
            closes
        });

        let result = run(channel, in_rx, Broken, fixed(24, 80), &fast(), &ctx).await;
        assert!(matches!(result, Err(SrepError::Io(_))));
        assert!(ctx.interrupted().is_none());
        assert_eq!(remote.await.unwrap(), 1);
    }

    #[tokio::test]
    async fn input_error_does_not_end_session() {
        struct Broken;
        impl AsyncRead for Broken {
            fn poll_read(
                self: std::pin::Pin<&mut Self>,
                _cx: &mut std::task::Context<'_>,
                _buf: &mut tokio::io::ReadBuf<'_>,
            ) -> std::task::Poll<io::Result<()>> {
                std::task::Poll::Ready(Err(io::Error::other("stdin gone")))
            }
        }

        let (channel, mut server) = duplex_pair().await;
        let ctx = CallContext::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let remote = {
            let seen = seen.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(30)).await;
                send(&mut server, TerminalMessage::new(MessageType::Output, "still here")).await;
                close_normally(&mut server).await;
                while let Some(msg) = recv_skipping(&mut server, &[]).await {
                    seen.lock().unwrap().push(msg.kind);
                }
            })
        };

        let (out_tx, mut out_rx) = tokio::io::duplex(1024);
        let outcome = run(channel, Broken, out_tx, fixed(24, 80), &fast(), &ctx)
            .await
            .unwrap();
        remote.await.unwrap();

        assert_eq!(outcome.exit, ShellExit::Closed);
        assert!(matches!(outcome.input, Err(SrepError::Io(_))));
        assert!(!seen.lock().unwrap().contains(&MessageType::Input));

        let mut out = String::new();
        out_rx.read_to_string(&mut out).await.unwrap();
        assert_eq!(out, "still here");
    }
}
