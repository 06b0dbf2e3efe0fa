//! Dashboard state and the operations that populate it.
//!
//! `Dashboard` plays the role of the web client's stores: it keeps the last
//! known configuration list, status snapshot, rate limits and schedulers, and
//! owns the recurring work (list polling, status stream) registered with the
//! session so it stops when the session expires.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::api::{endpoints, ApiClient, NO_QUERY};
use crate::config::Config;
use crate::models::{
    ConfigStatusSnapshot, InterfaceScheduler, PeerRateLimit, SchedulerType, WireguardConfiguration,
};
use crate::navigation::Route;
use crate::session::{IntervalHandle, IntervalId};
use crate::stream;

#[derive(Debug, Clone, Default)]
pub struct DashboardState {
    pub dashboard_configuration: Option<Value>,
    pub configurations: Option<Vec<WireguardConfiguration>>,
    pub config_statuses: ConfigStatusSnapshot,
    pub peer_rate_limits: HashMap<String, PeerRateLimit>,
    pub interface_schedulers: HashMap<String, InterfaceScheduler>,
    pub fetching_rate_limit: bool,
    pub rate_limit_error: Option<String>,
}

/// Interval ids of the recurring work this dashboard started.
#[derive(Debug, Default)]
struct Background {
    configuration_poll: Option<IntervalId>,
    status_stream: Option<IntervalId>,
}

#[derive(Clone)]
pub struct Dashboard {
    client: ApiClient,
    state: Arc<RwLock<DashboardState>>,
    background: Arc<Mutex<Background>>,
}

impl Dashboard {
    pub fn new(client: ApiClient) -> Self {
        let background = Arc::new(Mutex::new(Background::default()));

        // The registry cancels our intervals on expiry; forget their ids with them
        let hook_background = Arc::clone(&background);
        client.session().register_cleanup_hook(move || {
            let mut bg = hook_background.lock().unwrap_or_else(|e| e.into_inner());
            bg.configuration_poll = None;
            bg.status_stream = None;
        });

        Self {
            client,
            state: Arc::new(RwLock::new(DashboardState::default())),
            background,
        }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> DashboardState {
        self.read().clone()
    }

    // ===== Configurations =====

    /// Fetch the dashboard's own settings.
    pub async fn get_configuration(&self) -> Result<Value> {
        let response = self
            .client
            .get(endpoints::DASHBOARD_CONFIGURATION, NO_QUERY)
            .await;
        let data: Value = response
            .into_data()
            .context("Failed to fetch dashboard configuration")?;
        self.write().dashboard_configuration = Some(data.clone());
        Ok(data)
    }

    /// Fetch the list of interface configurations, replacing the stored list.
    pub async fn get_configurations(&self) -> Result<Vec<WireguardConfiguration>> {
        let response = self.client.get(endpoints::CONFIGURATIONS, NO_QUERY).await;
        let configurations: Vec<WireguardConfiguration> = response
            .into_data()
            .context("Failed to fetch configurations")?;
        debug!(count = configurations.len(), "Configurations refreshed");
        self.write().configurations = Some(configurations.clone());
        Ok(configurations)
    }

    /// Refresh the configuration list every `period`, replacing any running poll.
    pub fn start_configuration_polling(&self, period: Duration) -> IntervalId {
        self.stop_configuration_polling();

        let dashboard = self.clone();
        let id = self.client.session().spawn_polling(period, move || {
            let dashboard = dashboard.clone();
            async move {
                if let Err(e) = dashboard.get_configurations().await {
                    debug!(error = %e, "Configuration poll failed");
                }
            }
        });
        if self.client.session().intervals().contains(id) {
            self.background().configuration_poll = Some(id);
        }
        id
    }

    pub fn stop_configuration_polling(&self) -> bool {
        let id = self.background().configuration_poll.take();
        id.map(|id| self.client.session().stop_interval(id))
            .unwrap_or(false)
    }

    // ===== Status stream =====

    /// Open the status stream in the background. Each event replaces the
    /// stored status map.
    pub fn start_status_stream(&self) -> IntervalId {
        self.stop_status_stream();

        let client = self.client.clone();
        let state = Arc::clone(&self.state);
        let task = tokio::spawn(async move {
            stream::run_status_stream(&client, |snapshot| {
                let mut state = state.write().unwrap_or_else(|e| e.into_inner());
                state.config_statuses = snapshot;
            })
            .await;
        });

        let id = self
            .client
            .session()
            .register_interval(IntervalHandle::from_abort(task.abort_handle()));
        if self.client.session().intervals().contains(id) {
            self.background().status_stream = Some(id);
        }
        id
    }

    pub fn stop_status_stream(&self) -> bool {
        let id = self.background().status_stream.take();
        id.map(|id| self.client.session().stop_interval(id))
            .unwrap_or(false)
    }

    // ===== Peers =====

    /// Fetch a peer's settings as the server reports them.
    pub async fn get_peer_settings(&self, interface: &str, peer_key: &str) -> Result<Value> {
        let query = [("interface", interface), ("peer_key", peer_key)];
        let response = self.client.get(endpoints::GET_PEER_SETTINGS, &query).await;
        if !response.status {
            anyhow::bail!("{}", response.message_or("Failed to fetch peer settings"));
        }
        Ok(response.data.unwrap_or(Value::Null))
    }

    // ===== Peer rate limits =====

    /// Fetch a peer's rate limit. Failures are recorded in `rate_limit_error`
    /// and the peer falls back to an unlimited HTB entry.
    pub async fn fetch_peer_rate_limit(&self, interface: &str, peer_key: &str) -> PeerRateLimit {
        {
            let mut state = self.write();
            state.fetching_rate_limit = true;
            state.rate_limit_error = None;
        }

        let query = [("interface", interface), ("peer_key", peer_key)];
        let response = self.client.get(endpoints::GET_PEER_RATE_LIMIT, &query).await;
        let result = response
            .into_data::<Option<PeerRateLimit>>()
            .map(Option::unwrap_or_default);

        let mut state = self.write();
        state.fetching_rate_limit = false;
        let limit = match result {
            Ok(limit) => limit,
            Err(e) => {
                warn!(interface, error = %e, "Failed to fetch rate limits");
                state.rate_limit_error = Some(e.to_string());
                PeerRateLimit::default()
            }
        };
        state.peer_rate_limits.insert(peer_key.to_string(), limit);
        limit
    }

    pub async fn set_peer_rate_limit(
        &self,
        interface: &str,
        peer_key: &str,
        upload_rate: f64,
        download_rate: f64,
        scheduler_type: SchedulerType,
    ) -> Result<()> {
        let body = json!({
            "interface": interface,
            "peer_key": peer_key,
            "upload_rate": upload_rate,
            "download_rate": download_rate,
            "scheduler_type": scheduler_type,
        });
        let response = self.client.post(endpoints::SET_PEER_RATE_LIMIT, &body).await;
        if !response.status {
            anyhow::bail!("{}", response.message_or("Failed to set rate limits"));
        }

        self.write().peer_rate_limits.insert(
            peer_key.to_string(),
            PeerRateLimit {
                upload_rate,
                download_rate,
                scheduler_type,
            },
        );
        Ok(())
    }

    pub async fn remove_peer_rate_limit(&self, interface: &str, peer_key: &str) -> Result<()> {
        let body = json!({
            "interface": interface,
            "peer_key": peer_key,
        });
        let response = self.client.post(endpoints::REMOVE_PEER_RATE_LIMIT, &body).await;
        if !response.status {
            anyhow::bail!("{}", response.message_or("Failed to remove rate limit"));
        }

        self.write()
            .peer_rate_limits
            .insert(peer_key.to_string(), PeerRateLimit::default());
        Ok(())
    }

    // ===== Interface scheduler =====

    pub async fn get_interface_scheduler(&self, interface: &str) -> Result<InterfaceScheduler> {
        let query = [("interface", interface)];
        let response = self.client.get(endpoints::INTERFACE_SCHEDULER, &query).await;
        let scheduler = response
            .into_data::<Option<InterfaceScheduler>>()
            .context("Failed to fetch interface scheduler")?
            .unwrap_or_default();

        self.write()
            .interface_schedulers
            .insert(interface.to_string(), scheduler);
        Ok(scheduler)
    }

    // ===== Sign out =====

    /// Sign out, then drop the token, stop all polling, deactivate the
    /// cross-server target and return to the sign-in view. The local cleanup
    /// happens whatever the server answers.
    pub async fn sign_out(&self, config: &mut Config) {
        let response = self.client.get(endpoints::SIGN_OUT, NO_QUERY).await;
        if !response.status {
            debug!(message = response.message_or(""), "Sign out request did not succeed");
        }

        self.client.clear_token();
        let stopped = self.client.session().stop_all_intervals();
        config.remove_active_cross_server();
        self.client.set_remote(None);
        self.client.navigator().navigate(Route::SignIn);
        info!(stopped_intervals = stopped, "Signed out");
    }

    fn read(&self) -> RwLockReadGuard<'_, DashboardState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, DashboardState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    fn background(&self) -> MutexGuard<'_, Background> {
        self.background.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for Dashboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dashboard")
            .field("client", &self.client)
            .field("background", &*self.background())
            .finish()
    }
}
