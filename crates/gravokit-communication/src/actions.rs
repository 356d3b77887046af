//! Action facade
//!
//! Named machine operations. Each builds its wire command, runs it through
//! the [`Dispatcher`] and decodes the reply; a decoded `ER` line comes back
//! as [`Error::Machine`](gravokit_core::Error::Machine).

use crate::communication::{Dispatcher, ReadLimit};
use crate::protocol::{check_reply, Command, MarkingSequence};
use gravokit_core::{Error, LoadMode, MachineStatus, MarkingOutcome, Result};
use std::sync::Arc;

/// Operations available on a connected machine
#[derive(Debug, Clone)]
pub struct Actions {
    dispatcher: Arc<Dispatcher>,
}

impl Actions {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    async fn send(&self, command: Command) -> Result<String> {
        tracing::debug!(command = %command, "Sending command");
        let reply = self.dispatcher.write(command.as_str()).await?;
        tracing::debug!(command = %command, reply = %reply, "Received reply");
        check_reply(reply)
    }

    /// Acknowledge and clear the current fault
    pub async fn acknowledge_fault(&self) -> Result<String> {
        self.send(Command::acknowledge_fault()).await
    }

    /// Stop the marking in progress
    pub async fn stop_marking(&self) -> Result<String> {
        self.send(Command::stop_marking()).await
    }

    /// Start marking the loaded file and wait for the cycle to end
    ///
    /// Holds the transaction lock for the whole marking duration; every
    /// other caller waits until the terminal line has been read. A decoded
    /// `ER` line ends the exchange cleanly; any other failure abandons the
    /// connection, which the next call replaces.
    pub async fn start_marking(&self) -> Result<MarkingOutcome> {
        let progress_limit = ReadLimit::from_option(self.dispatcher.settings().marking_timeout);
        let mut txn = self.dispatcher.lock().await;
        let result = MarkingSequence::new(progress_limit).run(&mut txn).await;

        match &result {
            Ok(_) | Err(Error::Machine(_)) => txn.settle(),
            Err(e) => {
                tracing::error!(error = %e, "Marking sequence failed, abandoning connection");
                txn.abandon().await;
            }
        }
        result
    }

    /// Query whether this session holds the master role
    pub async fn connection_role(&self) -> Result<String> {
        self.send(Command::query_role()).await
    }

    /// Load a marking file; a `count` of 0 marks indefinitely
    pub async fn load_file(&self, name: &str, count: u32, mode: LoadMode) -> Result<String> {
        self.send(Command::load_file(name, count, mode)?).await
    }

    /// List stored files, optionally filtered by `mask`
    ///
    /// The reply is the count line followed by one file name per line.
    pub async fn list_files(&self, mask: Option<&str>) -> Result<String> {
        self.send(Command::list_files(mask)?).await
    }

    /// Upload `data` as file `name`
    pub async fn push_file(&self, name: &str, data: &[u8]) -> Result<String> {
        self.send(Command::push_file(name, data)?).await
    }

    /// Delete stored files matching `mask`, or all files
    pub async fn remove_files(&self, mask: Option<&str>) -> Result<String> {
        self.send(Command::remove_files(mask)?).await
    }

    /// Request (`true`) or release (`false`) the master role
    pub async fn set_role(&self, master: bool) -> Result<String> {
        self.send(Command::set_role(master)).await
    }

    /// Raw `ST` reply
    pub async fn status(&self) -> Result<String> {
        self.send(Command::status()).await
    }

    /// `ST` reply parsed into its fields
    pub async fn machine_status(&self) -> Result<MachineStatus> {
        MachineStatus::parse(&self.status().await?)
    }

    pub async fn get_variable(&self, index: u8) -> Result<String> {
        self.send(Command::get_variable(index)).await
    }

    pub async fn set_variable(&self, index: u8, text: &str) -> Result<String> {
        self.send(Command::set_variable(index, text)?).await
    }
}
