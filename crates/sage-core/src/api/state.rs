//! Application state

use std::sync::Arc;

use crate::agents::AgentContext;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    agents: AgentContext,
}

impl AppState {
    pub fn new(agents: AgentContext) -> Self {
        Self {
            inner: Arc::new(AppStateInner { agents }),
        }
    }

    /// Dependencies used to build agents for each request
    pub fn agents(&self) -> &AgentContext {
        &self.inner.agents
    }
}
