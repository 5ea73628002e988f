use session_orchestrator::SessionManager;

#[derive(Clone)]
pub struct AppState {
    pub manager: SessionManager,
}

impl AppState {
    pub fn new(manager: SessionManager) -> Self {
        Self { manager }
    }
}
