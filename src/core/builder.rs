use std::sync::Arc;

use super::launch::{JavaLauncher, Launcher};
use super::supervisor::ServerSupervisor;
use crate::config::SupervisorConfig;
use crate::events::Channels;
use crate::status::QueryRef;
use crate::subscribers::{Listen, ListenerSet};

/// Builder for a [`ServerSupervisor`] with optional listeners and a custom launcher.
pub struct SupervisorBuilder {
    cfg: SupervisorConfig,
    query: QueryRef,
    launcher: Arc<dyn Launcher>,
    listeners: Vec<Arc<dyn Listen>>,
}

impl SupervisorBuilder {
    /// Creates a builder that launches the server with [`JavaLauncher`].
    pub fn new(cfg: SupervisorConfig, query: QueryRef) -> Self {
        Self {
            cfg,
            query,
            launcher: Arc::new(JavaLauncher),
            listeners: Vec::new(),
        }
    }

    /// Replaces the process launcher.
    pub fn with_launcher(mut self, launcher: Arc<dyn Launcher>) -> Self {
        self.launcher = launcher;
        self
    }

    /// Sets event listeners.
    ///
    /// Each listener gets its own worker and bounded queue, fed from the
    /// status and player channels.
    pub fn with_listeners(mut self, listeners: Vec<Arc<dyn Listen>>) -> Self {
        self.listeners = listeners;
        self
    }

    /// Builds the supervisor in the `Down` state.
    ///
    /// Must be called inside a Tokio runtime when listeners are set.
    pub fn build(self) -> ServerSupervisor {
        let channels = Channels::new(self.cfg.channel_capacity);
        let listeners = (!self.listeners.is_empty()).then(|| {
            let set = Arc::new(ListenerSet::new(self.listeners));
            set.attach(&channels);
            set
        });
        ServerSupervisor::from_parts(self.cfg, self.query, self.launcher, channels, listeners)
    }
}

impl std::fmt::Debug for SupervisorBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupervisorBuilder")
            .field("cfg", &self.cfg)
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}
