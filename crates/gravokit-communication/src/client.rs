//! Client handle owning the single shared machine connection

use crate::actions::Actions;
use crate::communication::{ConnectionSettings, Dispatcher};
use gravokit_core::Result;
use std::sync::Arc;

/// A Gravotech marking machine
///
/// Constructing the handle opens nothing; call [`connect`](Self::connect)
/// first. Clones of [`actions`](Self::actions) share the same connection.
#[derive(Debug)]
pub struct Gravotech {
    dispatcher: Arc<Dispatcher>,
    actions: Actions,
}

impl Gravotech {
    pub fn new(settings: ConnectionSettings) -> Self {
        let dispatcher = Arc::new(Dispatcher::new(settings));
        let actions = Actions::new(Arc::clone(&dispatcher));
        Self {
            dispatcher,
            actions,
        }
    }

    pub fn settings(&self) -> &ConnectionSettings {
        self.dispatcher.settings()
    }

    pub async fn connect(&self) -> Result<()> {
        self.dispatcher.connect().await
    }

    /// Release the connection; safe to call when already closed
    pub async fn close(&self) {
        self.dispatcher.close().await
    }

    pub async fn is_connected(&self) -> bool {
        self.dispatcher.is_connected().await
    }

    pub fn actions(&self) -> &Actions {
        &self.actions
    }

    /// The underlying dispatcher, for raw commands
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }
}
