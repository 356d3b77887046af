//! Start-marking sequence
//!
//! `GO` is the one command whose reply spans several lines with arbitrary
//! time between them: an acknowledgment, unsolicited progress lines, then one
//! terminal line. The whole exchange must run inside a single held
//! transaction because any other command sent meanwhile would have its reply
//! interleaved with the marking stream.

use super::commands::Command;
use super::error_decoder::check_reply;
use crate::communication::{LineChannel, ReadLimit};
use gravokit_core::{Error, MarkingOutcome, Result};

/// Acknowledgment marker sent once marking has started
pub const ACK_MARKER: &str = "GO M";

/// State of a running sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkingState {
    /// `GO` sent, waiting for the acknowledgment
    AwaitingAck,
    /// Acknowledged, waiting for a terminal line
    Marking,
}

/// Drives one `GO` exchange to its terminal line
#[derive(Debug)]
pub struct MarkingSequence {
    state: MarkingState,
    progress_limit: ReadLimit,
    progress_lines: usize,
}

impl MarkingSequence {
    /// Create a sequence; `progress_limit` bounds each read once marking runs
    pub fn new(progress_limit: ReadLimit) -> Self {
        Self {
            state: MarkingState::AwaitingAck,
            progress_limit,
            progress_lines: 0,
        }
    }

    pub fn state(&self) -> MarkingState {
        self.state
    }

    /// Progress lines skipped while waiting for the terminal line
    pub fn progress_lines(&self) -> usize {
        self.progress_lines
    }

    /// Send `GO` and read until the marking cycle reaches a terminal state
    ///
    /// The caller must hold the transaction lock for the whole call. An `ER`
    /// line at any point ends the sequence as [`Error::Machine`]; a first
    /// line that is neither an error nor the acknowledgment is an
    /// [`Error::Protocol`].
    pub async fn run<C>(&mut self, channel: &mut C) -> Result<MarkingOutcome>
    where
        C: LineChannel + ?Sized,
    {
        self.state = MarkingState::AwaitingAck;
        self.progress_lines = 0;

        channel
            .send_command(Command::start_marking().as_str())
            .await?;

        loop {
            match self.state {
                MarkingState::AwaitingAck => {
                    let line = check_reply(channel.receive_line(ReadLimit::Default).await?)?;
                    if !line.contains(ACK_MARKER) {
                        tracing::error!(reply = %line, "Unexpected reply to start marking");
                        return Err(Error::protocol(format!(
                            "expected '{}', got '{}'",
                            ACK_MARKER, line
                        )));
                    }
                    tracing::info!("Marking started");
                    self.state = MarkingState::Marking;
                }
                MarkingState::Marking => {
                    let line = check_reply(channel.receive_line(self.progress_limit).await?)?;
                    if let Some(outcome) = MarkingOutcome::from_line(&line) {
                        tracing::info!(
                            outcome = %outcome,
                            progress_lines = self.progress_lines,
                            "Marking cycle ended"
                        );
                        return Ok(outcome);
                    }
                    self.progress_lines += 1;
                    tracing::debug!(line = %line, "Marking progress");
                }
            }
        }
    }
}
