// Application state module
// Holds configuration, the handler table and the command dispatcher

use std::sync::Arc;
use tokio::sync::Notify;

use super::types::Config;
use crate::handler::HandlerTable;
use crate::portal::{Dispatcher, RegistryBuildError, RequestBuffer};

/// Application state shared by every connection
pub struct AppState {
    pub config: Config,
    pub handlers: HandlerTable,
    pub dispatcher: Dispatcher,
    pub buffer: RequestBuffer,
    pub shutdown: Arc<Notify>,
}

impl AppState {
    /// Build state and the command registry.
    ///
    /// Fails when the registry cannot be built; the server must not start
    /// with an entry path that can never route.
    pub fn new(config: Config, handlers: HandlerTable) -> Result<Self, RegistryBuildError> {
        let portal = &config.portal;
        let dispatcher = Dispatcher::new(
            portal.entry_path.clone(),
            portal.command_field.clone(),
            portal.ambiguity,
            &handlers,
        )?;
        let buffer = RequestBuffer::new(portal.entry_path.clone(), portal.max_body_size);

        Ok(Self {
            config,
            handlers,
            dispatcher,
            buffer,
            shutdown: Arc::new(Notify::new()),
        })
    }

    pub fn request_shutdown(&self) {
        // notify_one keeps a permit if the accept loop is not waiting yet
        self.shutdown.notify_one();
    }
}
