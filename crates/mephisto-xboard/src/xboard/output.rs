//! CECP output formatting and the GUI writer

use crate::telemetry::PostInfo;
use crate::transcript::Transcript;
use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

/// Lines sent to the GUI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XboardResponse {
    /// Feature negotiation after `protover`
    Features { name: String },

    /// Answer to `ping N`
    Pong(String),

    /// The device's move
    Move(String),

    /// The device announces it is mated
    Resign,

    /// The device claims a draw
    Draw,

    /// Thinking output
    Post(PostInfo),

    /// Operator message, ignored by GUIs
    Comment(String),
}

impl fmt::Display for XboardResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            XboardResponse::Features { name } => write!(
                f,
                "feature sigint=0 ping=1 setboard=1 color=0 myname=\"{name}\" done=1"
            ),
            XboardResponse::Pong(id) => write!(f, "pong {id}"),
            XboardResponse::Move(mv) => write!(f, "move {mv}"),
            XboardResponse::Resign => write!(f, "resign"),
            XboardResponse::Draw => write!(f, "1/2-1/2"),
            XboardResponse::Post(info) => write!(f, "{info}"),
            XboardResponse::Comment(msg) => write!(f, "# {msg}"),
        }
    }
}

/// Error types for GUI output
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("Broken pipe detected, GUI disconnected")]
    BrokenPipe,

    #[error("Failed to write to GUI: {0}")]
    Io(#[from] io::Error),
}

/// Line writer towards the GUI. Every line is flushed immediately and
/// mirrored into the transcript when one is attached.
pub struct GuiWriter {
    out: Box<dyn Write + Send>,
    transcript: Option<Transcript>,
}

impl GuiWriter {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            out,
            transcript: None,
        }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(io::stdout()))
    }

    pub fn with_transcript(mut self, transcript: Transcript) -> Self {
        self.transcript = Some(transcript);
        self
    }

    pub fn send(&mut self, response: XboardResponse) -> Result<(), OutputError> {
        let line = response.to_string();
        log::debug!("Sending: {line}");
        if let Some(transcript) = self.transcript.as_mut() {
            transcript.record_output(&line);
        }
        writeln!(self.out, "{line}")
            .and_then(|()| self.out.flush())
            .map_err(|e| match e.kind() {
                io::ErrorKind::BrokenPipe => OutputError::BrokenPipe,
                _ => OutputError::Io(e),
            })
    }

    /// Send a `# ` comment line.
    pub fn operator(&mut self, message: impl Into<String>) -> Result<(), OutputError> {
        self.send(XboardResponse::Comment(message.into()))
    }

    /// Mirror a GUI line into the transcript.
    pub fn record_input(&mut self, line: &str) {
        if let Some(transcript) = self.transcript.as_mut() {
            transcript.record_input(line);
        }
    }
}

/// In-memory sink that can be read while a [`GuiWriter`] owns a clone.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far.
    pub fn contents(&self) -> String {
        let bytes = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&bytes).into_owned()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }

    /// Return and clear the captured lines.
    pub fn take_lines(&self) -> Vec<String> {
        let mut bytes = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        let text = String::from_utf8_lossy(&bytes).into_owned();
        bytes.clear();
        text.lines().map(str::to_string).collect()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
