//! Line ingestion context.
//!
//! Reads the serial line protocol from any `BufRead`, parses each line and
//! routes the result: ordinary commands are enqueued on the shared channel
//! (blocking while it is full), urgent commands bypass the queue entirely.
//! Malformed lines are logged and ignored without touching any state.
//!
//! The transport is pumped on a dedicated thread so the ingestion side can
//! interleave blocking reads with poll-interval work: the handshake keeps
//! emitting `OK` heartbeats while the peer stays silent, and `shutdown` is
//! rechecked once per poll interval even when no line arrives.

use std::io::{BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use quake_common::command::{Command, UrgentSignal};
use quake_common::config::DispatcherConfig;
use tracing::{debug, info, warn};

use crate::command::parse::{Request, parse_line};
use crate::context::DriveContext;

/// One pumped transport event: a trimmed line or a read error.
type LineEvent = std::io::Result<String>;

/// Reads, parses and routes protocol lines.
pub struct Ingestor<W: Write> {
    ctx: Arc<DriveContext>,
    lines: Receiver<LineEvent>,
    writer: W,
    poll: Duration,
}

/// Forward one event per transport line until EOF, a read error, or the
/// receiving ingestor going away.
fn pump_lines(mut reader: impl BufRead, events: Sender<LineEvent>) {
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line) {
            // EOF: dropping the sender disconnects the receiver.
            Ok(0) => return,
            Ok(_) => {
                if events.send(Ok(line.trim().to_string())).is_err() {
                    return;
                }
            }
            Err(error) => {
                let _ = events.send(Err(error));
                return;
            }
        }
    }
}

impl<W: Write> Ingestor<W> {
    /// Build an ingestor over the shared context and a line transport.
    ///
    /// `reader` moves onto a pump thread; the thread exits when the
    /// transport closes or fails, or when the ingestor is dropped.
    pub fn new<R>(ctx: Arc<DriveContext>, reader: R, writer: W, config: &DispatcherConfig) -> Self
    where
        R: BufRead + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || pump_lines(reader, tx));
        Self {
            ctx,
            lines: rx,
            writer,
            poll: Duration::from_millis(config.handshake_poll_ms),
        }
    }

    /// Announce readiness until the peer confirms.
    ///
    /// Writes `OK` once per poll interval and returns once a `CONF` line
    /// arrives, or with `false` when the transport closes or `shutdown`
    /// is set first. A silent peer keeps receiving heartbeats.
    pub fn handshake(&mut self, shutdown: &AtomicBool) -> std::io::Result<bool> {
        info!("awaiting handshake");
        while !shutdown.load(Ordering::SeqCst) {
            self.writer.write_all(b"OK\n")?;
            self.writer.flush()?;
            match self.lines.recv_timeout(self.poll) {
                Ok(Ok(line)) if line == "CONF" => {
                    info!("handshake confirmed");
                    return Ok(true);
                }
                Ok(Ok(line)) => debug!(line = line.as_str(), "ignoring non-handshake line"),
                Ok(Err(error)) => return Err(error),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    warn!("transport closed during handshake");
                    return Ok(false);
                }
            }
        }
        Ok(false)
    }

    /// Run the ingestion loop until the transport closes or `shutdown`
    /// is set.
    pub fn run(&mut self, shutdown: &AtomicBool) -> std::io::Result<()> {
        while !shutdown.load(Ordering::SeqCst) {
            let line = match self.lines.recv_timeout(self.poll) {
                Ok(Ok(line)) => line,
                Ok(Err(error)) => return Err(error),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    info!("transport closed, ingestion stopping");
                    return Ok(());
                }
            };
            if line.is_empty() {
                continue;
            }
            debug!(line = line.as_str(), "received");
            match parse_line(&line) {
                Ok(request) => self.route(request),
                Err(error) => warn!(%error, line = line.as_str(), "malformed line ignored"),
            }
        }
        Ok(())
    }

    /// Route one parsed request to the queue or the urgent path.
    fn route(&self, request: Request) {
        match request {
            Request::Move(movement) => {
                self.ctx.channel.push(Command::Move(movement));
            }
            Request::Manual { forward, backward } => {
                self.ctx.channel.push(Command::Manual { forward, backward });
            }
            Request::Stop => {
                // Halt promptly even if the dispatcher is mid-movement; it
                // will still see the urgent signal and flush the queue.
                self.ctx.stop_flag().set();
                self.ctx.urgent.post(UrgentSignal::Stop);
            }
            Request::Reset => {
                self.ctx.urgent.post(UrgentSignal::Reset);
            }
            Request::BatchSize(capacity) => {
                let discarded = self.ctx.channel.resize(capacity);
                if discarded > 0 {
                    warn!(capacity, discarded, "channel resized, queued commands discarded");
                } else {
                    info!(capacity, "channel resized");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufReader, Cursor};

    use quake_common::config::DriveConfig;
    use quake_common::movement::{Direction, Movement};

    /// Never yields a byte; models a peer that connected but says nothing.
    struct SilentReader;

    impl std::io::Read for SilentReader {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            loop {
                std::thread::sleep(Duration::from_secs(60));
            }
        }
    }

    /// Counts heartbeat writes and raises `shutdown` once `limit` is hit.
    struct TrippingWriter {
        heartbeats: usize,
        limit: usize,
        shutdown: Arc<AtomicBool>,
    }

    impl Write for TrippingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.heartbeats += 1;
            if self.heartbeats >= self.limit {
                self.shutdown.store(true, Ordering::SeqCst);
            }
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn run_lines(input: &str) -> (Arc<DriveContext>, Vec<u8>) {
        let config = DriveConfig::default();
        let ctx = DriveContext::new(&config);
        let mut output = Vec::new();
        {
            let mut ingestor = Ingestor::new(
                ctx.clone(),
                Cursor::new(input.to_string()),
                &mut output,
                &config.dispatcher,
            );
            ingestor
                .run(&AtomicBool::new(false))
                .expect("in-memory transport cannot fail");
        }
        (ctx, output)
    }

    #[test]
    fn handshake_waits_for_conf() {
        let config = DriveConfig::default();
        let ctx = DriveContext::new(&config);
        let mut output = Vec::new();
        let mut ingestor = Ingestor::new(
            ctx,
            Cursor::new("hello\nCONF\n".to_string()),
            &mut output,
            &config.dispatcher,
        );
        assert!(ingestor.handshake(&AtomicBool::new(false)).unwrap());
        // One OK per received line: the ignored one and the CONF.
        assert_eq!(String::from_utf8(output).unwrap(), "OK\nOK\n");
    }

    #[test]
    fn handshake_heartbeats_a_silent_peer_until_shutdown() {
        let config = DriveConfig {
            dispatcher: DispatcherConfig {
                idle_poll_ms: 10,
                handshake_poll_ms: 1,
            },
            ..DriveConfig::default()
        };
        let ctx = DriveContext::new(&config);
        let shutdown = Arc::new(AtomicBool::new(false));
        let writer = TrippingWriter {
            heartbeats: 0,
            limit: 3,
            shutdown: shutdown.clone(),
        };
        let mut ingestor =
            Ingestor::new(ctx, BufReader::new(SilentReader), writer, &config.dispatcher);
        assert!(!ingestor.handshake(&shutdown).unwrap());
        assert_eq!(ingestor.writer.heartbeats, 3);
    }

    #[test]
    fn handshake_reports_closed_transport() {
        let config = DriveConfig::default();
        let ctx = DriveContext::new(&config);
        let mut output = Vec::new();
        let mut ingestor =
            Ingestor::new(ctx, Cursor::new(String::new()), &mut output, &config.dispatcher);
        assert!(!ingestor.handshake(&AtomicBool::new(false)).unwrap());
    }

    #[test]
    fn moves_are_enqueued_in_order() {
        let (ctx, _) = run_lines("MOVE 2000 500 6000 1\nMOVE 800 0 50 0\n");
        assert_eq!(
            ctx.channel.try_pop(),
            Some(Command::Move(Movement::new(2_000, 500, 6_000, Direction::Forward)))
        );
        assert_eq!(
            ctx.channel.try_pop(),
            Some(Command::Move(Movement::new(800, 0, 50, Direction::Backward)))
        );
        assert_eq!(ctx.channel.try_pop(), None);
    }

    #[test]
    fn stop_bypasses_the_queue_and_raises_the_flag() {
        let (ctx, _) = run_lines("STOP\n");
        assert!(ctx.channel.is_empty());
        assert!(ctx.stop_flag().is_set());
        assert_eq!(ctx.urgent.take(), Some(UrgentSignal::Stop));
    }

    #[test]
    fn reset_posts_urgently_without_raising_the_flag() {
        let (ctx, _) = run_lines("RESET\n");
        assert!(ctx.channel.is_empty());
        assert!(!ctx.stop_flag().is_set());
        assert_eq!(ctx.urgent.take(), Some(UrgentSignal::Reset));
    }

    #[test]
    fn batch_size_resizes_and_discards() {
        let (ctx, _) = run_lines("MOVE 800 0 10 1\nBATCH_SIZE 16\n");
        assert_eq!(ctx.channel.capacity(), 16);
        assert!(ctx.channel.is_empty());
    }

    #[test]
    fn malformed_and_empty_lines_are_skipped() {
        let (ctx, _) = run_lines("\nJUMP\nMOVE too few\nMOVE 800 0 10 1\n");
        assert_eq!(ctx.channel.len(), 1);
        assert_eq!(ctx.urgent.take(), None);
    }
}
