use axum::extract::FromRef;

use crate::analytics::AnalyticsStore;
use crate::music::ReleaseStore;
use crate::publishing::{ReleasePublisher, TriggerAuthenticator};
use std::sync::Arc;
use std::time::Instant;

use super::ServerConfig;

pub type GuardedReleaseStore = Arc<dyn ReleaseStore>;
pub type GuardedAnalyticsStore = Arc<dyn AnalyticsStore>;
pub type GuardedPublisher = Arc<ReleasePublisher>;
pub type GuardedAuthenticator = Arc<TriggerAuthenticator>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub hash: String,
    pub release_store: GuardedReleaseStore,
    pub analytics_store: GuardedAnalyticsStore,
    pub publisher: GuardedPublisher,
    pub authenticator: GuardedAuthenticator,
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}

impl FromRef<ServerState> for GuardedReleaseStore {
    fn from_ref(input: &ServerState) -> Self {
        input.release_store.clone()
    }
}

impl FromRef<ServerState> for GuardedAnalyticsStore {
    fn from_ref(input: &ServerState) -> Self {
        input.analytics_store.clone()
    }
}

impl FromRef<ServerState> for GuardedPublisher {
    fn from_ref(input: &ServerState) -> Self {
        input.publisher.clone()
    }
}

impl FromRef<ServerState> for GuardedAuthenticator {
    fn from_ref(input: &ServerState) -> Self {
        input.authenticator.clone()
    }
}
