use std::sync::Arc;

use crate::auth::IdentityProvider;
use crate::config::Config;
use crate::session::SessionStore;
use crate::upload::UploadCoordinator;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub sessions: SessionStore,
    /// Verifies sign-in credentials. Google in production, a fake in tests.
    pub identity: Arc<dyn IdentityProvider>,
    pub coordinator: UploadCoordinator,
}
