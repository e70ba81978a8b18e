//! GUI input with a single-slot handshake.
//!
//! A reader thread hands one line at a time to the bridge and blocks until
//! the bridge reports the line as processed. The bridge therefore never
//! sees two unconsumed lines, and the GUI's writes are never reordered
//! relative to the bridge's reaction. A closed channel means the GUI went
//! away and is handled like `quit`.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::io::{self, BufRead};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// How long [`InputChannel::poll`] may block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wait {
    NoWait,
    Timeout(Duration),
    Forever,
}

/// The bridge stopped listening.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("input channel closed")]
pub struct InputClosed;

/// Producer half, owned by the reader thread.
pub struct InputFeeder {
    line_tx: Sender<String>,
    ack_rx: Receiver<()>,
}

/// Consumer half, owned by the bridge.
pub struct InputChannel {
    line_rx: Receiver<String>,
    ack_tx: Sender<()>,
    pending: Option<String>,
    closed: bool,
}

/// Create a connected feeder/channel pair.
pub fn channel() -> (InputFeeder, InputChannel) {
    let (line_tx, line_rx) = bounded(1);
    let (ack_tx, ack_rx) = bounded(1);
    (
        InputFeeder { line_tx, ack_rx },
        InputChannel {
            line_rx,
            ack_tx,
            pending: None,
            closed: false,
        },
    )
}

impl InputFeeder {
    /// Offer a line without waiting. Fails when the previous line has not
    /// been taken yet or the bridge is gone.
    pub fn submit(&self, line: impl Into<String>) -> Result<(), InputClosed> {
        self.line_tx.try_send(line.into()).map_err(|_| InputClosed)
    }

    /// Hand a line over and block until the bridge has parsed it.
    pub fn send_and_wait(&self, line: impl Into<String>) -> Result<(), InputClosed> {
        self.line_tx.send(line.into()).map_err(|_| InputClosed)?;
        self.ack_rx.recv().map_err(|_| InputClosed)
    }

    /// Consume a processed signal if one is waiting.
    pub fn try_processed(&self) -> bool {
        self.ack_rx.try_recv().is_ok()
    }
}

impl InputChannel {
    /// The line awaiting processing, fetching one if none is held.
    pub fn poll(&mut self, wait: Wait) -> Option<&str> {
        if self.pending.is_none() && !self.closed {
            let received = match wait {
                Wait::NoWait => self.line_rx.try_recv().map_err(|e| match e {
                    TryRecvError::Empty => false,
                    TryRecvError::Disconnected => true,
                }),
                Wait::Timeout(timeout) => self.line_rx.recv_timeout(timeout).map_err(|e| match e {
                    RecvTimeoutError::Timeout => false,
                    RecvTimeoutError::Disconnected => true,
                }),
                Wait::Forever => self.line_rx.recv().map_err(|_| true),
            };
            match received {
                Ok(line) => self.pending = Some(line),
                Err(disconnected) => self.closed = disconnected,
            }
        }
        self.pending.as_deref()
    }

    /// No line is held and the feeder is gone.
    pub fn is_closed(&self) -> bool {
        self.closed && self.pending.is_none()
    }

    /// Release the held line and let the reader continue.
    pub fn processed(&mut self) {
        if self.pending.take().is_some() && self.ack_tx.try_send(()).is_err() {
            log::debug!("input ack dropped, reader gone");
        }
    }
}

/// Spawn the stdin reader thread.
pub fn spawn_stdin_reader(feeder: InputFeeder) -> JoinHandle<()> {
    thread::spawn(move || {
        let stdin = io::stdin();
        read_lines(stdin.lock(), &feeder);
    })
}

/// Spawn a reader thread over any line source.
pub fn spawn_reader<R>(reader: R, feeder: InputFeeder) -> JoinHandle<()>
where
    R: BufRead + Send + 'static,
{
    thread::spawn(move || read_lines(reader, &feeder))
}

fn read_lines<R: BufRead>(reader: R, feeder: &InputFeeder) {
    for line in reader.lines() {
        match line {
            Ok(line) => {
                let line = line.trim_end_matches(['\r', '\n']);
                if line.trim().is_empty() {
                    continue;
                }
                log::debug!("Received: {line}");
                if feeder.send_and_wait(line).is_err() {
                    log::debug!("Bridge stopped listening, exiting input reader");
                    return;
                }
            }
            Err(e) => {
                match e.kind() {
                    io::ErrorKind::UnexpectedEof | io::ErrorKind::BrokenPipe => {
                        log::info!("Stdin closed (EOF or broken pipe)");
                    }
                    io::ErrorKind::Interrupted => {
                        log::warn!("Stdin read interrupted, shutting down");
                    }
                    _ => log::error!("Stdin read error: {e}"),
                }
                break;
            }
        }
    }
    // The caller drops the feeder, which closes the channel; the bridge
    // treats that as quit.
    log::debug!("Input reader thread exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_slot_holds_one_line_until_processed() {
        let (feeder, mut input) = channel();
        feeder.submit("new").unwrap();
        assert!(feeder.submit("go").is_err());

        assert_eq!(input.poll(Wait::NoWait), Some("new"));
        // Still held: polling again returns the same line.
        assert_eq!(input.poll(Wait::NoWait), Some("new"));
        assert!(!feeder.try_processed());

        input.processed();
        assert!(feeder.try_processed());
        assert_eq!(input.poll(Wait::NoWait), None);
        assert!(!input.is_closed());
    }

    #[test]
    fn test_dropped_feeder_closes_channel() {
        let (feeder, mut input) = channel();
        feeder.submit("quit").unwrap();
        drop(feeder);
        assert_eq!(input.poll(Wait::NoWait), Some("quit"));
        assert!(!input.is_closed());
        input.processed();
        assert_eq!(input.poll(Wait::Forever), None);
        assert!(input.is_closed());
    }

    #[test]
    fn test_reader_thread_waits_for_each_ack() {
        let (feeder, mut input) = channel();
        let handle = spawn_reader(Cursor::new("xboard\n\nprotover 2\r\n"), feeder);

        let mut seen = Vec::new();
        loop {
            match input.poll(Wait::Timeout(Duration::from_secs(5))).map(str::to_string) {
                Some(line) => {
                    seen.push(line.to_string());
                    input.processed();
                }
                None if input.is_closed() => break,
                None => panic!("reader stalled"),
            }
        }
        handle.join().unwrap();
        assert_eq!(seen, vec!["xboard", "protover 2"]);
    }
}
