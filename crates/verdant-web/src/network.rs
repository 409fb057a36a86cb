//! Backend communication: snapshot fetch and actuator control

use std::future::Future;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use bevy::prelude::*;
use verdant_core::{ApiClient, ControlAck, ControlCommand, ControlError, GreenhouseSnapshot};

use crate::twin::TwinViewer;

/// localStorage key holding the dashboard's bearer token
#[cfg(target_arch = "wasm32")]
const TOKEN_KEY: &str = "smart_greenhouse_token";

pub struct NetworkPlugin;

impl Plugin for NetworkPlugin {
    fn build(&self, app: &mut App) {
        // Initialize backend config from browser URL
        let backend = BackendConfig::from_browser();

        app.insert_resource(backend)
            .init_resource::<FetchState>()
            .init_resource::<PendingSnapshot>()
            .init_resource::<PendingControl>()
            .init_resource::<ControlFeedback>()
            .add_systems(Startup, fetch_initial_snapshot)
            .add_systems(Update, (process_snapshot, process_control_outcomes));
    }
}

/// Resource storing where the greenhouse API lives
#[derive(Resource, Debug, Clone, PartialEq)]
pub struct BackendConfig {
    /// API root including its path prefix (e.g., "http://10.0.0.5:8080/api")
    pub api_url: String,
    /// Greenhouse to display; the first one listed when unset
    pub greenhouse_id: Option<String>,
    pub token: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8080/api".to_string(),
            greenhouse_id: None,
            token: None,
        }
    }
}

impl BackendConfig {
    /// Create config from URL query parameters or same-origin fallback
    #[cfg(target_arch = "wasm32")]
    pub fn from_browser() -> Self {
        let Some(window) = web_sys::window() else {
            return Self::default();
        };
        let location = window.location();
        let search = location.search().unwrap_or_default();

        let api_url = match parse_query_param(&search, "api") {
            Some(api) => {
                tracing::info!("Using API from URL parameter: {}", api);
                normalize_api_url(&api)
            }
            None => {
                let origin = location
                    .origin()
                    .unwrap_or_else(|_| "http://localhost:8080".to_string());
                format!("{}/api", origin)
            }
        };

        let token = window
            .local_storage()
            .ok()
            .flatten()
            .and_then(|storage| storage.get_item(TOKEN_KEY).ok().flatten());

        Self {
            api_url,
            greenhouse_id: parse_query_param(&search, "greenhouse"),
            token,
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn from_browser() -> Self {
        Self::default()
    }

    pub fn client(&self) -> ApiClient {
        let client = ApiClient::new(self.api_url.as_str());
        match &self.token {
            Some(token) => client.with_token(token.as_str()),
            None => client,
        }
    }
}

/// Accept "host:port/api" as well as full URLs
#[cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]
fn normalize_api_url(addr: &str) -> String {
    let addr = addr.trim_end_matches('/');
    if addr.starts_with("https://") || addr.starts_with("http://") {
        addr.to_string()
    } else {
        format!("http://{}", addr)
    }
}

/// Parse a query parameter from a search string
#[cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]
fn parse_query_param(search: &str, param: &str) -> Option<String> {
    let search = search.trim_start_matches('?');
    for pair in search.split('&') {
        let mut parts = pair.splitn(2, '=');
        if let (Some(key), Some(value)) = (parts.next(), parts.next()) {
            if key == param && !value.is_empty() {
                // URL decode the value
                return Some(value.replace("%3A", ":").replace("%2F", "/"));
            }
        }
    }
    None
}

/// Snapshot fetch progress, shown in the toolbar
#[derive(Resource, Debug, Clone, Default, PartialEq)]
pub enum FetchState {
    #[default]
    Idle,
    Loading,
    Loaded {
        greenhouse_id: String,
        zones: usize,
    },
    Failed(String),
}

/// Snapshot result handed back from the async fetch
#[derive(Resource, Default)]
pub struct PendingSnapshot(pub Arc<Mutex<Option<Result<GreenhouseSnapshot, String>>>>);

pub struct ControlOutcome {
    pub command: ControlCommand,
    pub result: Result<ControlAck, ControlError>,
}

/// Finished control commands waiting to be reported
#[derive(Resource, Default)]
pub struct PendingControl(pub Arc<Mutex<Vec<ControlOutcome>>>);

/// Last control result shown in the detail panel
#[derive(Resource, Debug, Clone, Default)]
pub struct ControlFeedback {
    pub in_flight: usize,
    pub message: Option<String>,
}

#[cfg(target_arch = "wasm32")]
fn spawn_task<F, Fut>(make: F)
where
    F: FnOnce() -> Fut + 'static,
    Fut: Future<Output = ()> + 'static,
{
    wasm_bindgen_futures::spawn_local(make());
}

/// Native builds run each request on its own current-thread runtime
#[cfg(not(target_arch = "wasm32"))]
fn spawn_task<F, Fut>(make: F)
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + 'static,
{
    std::thread::spawn(move || {
        match tokio::runtime::Builder::new_current_thread().enable_all().build() {
            Ok(runtime) => runtime.block_on(make()),
            Err(e) => tracing::error!("Failed to start async runtime: {}", e),
        }
    });
}

async fn fetch_snapshot(client: &ApiClient, greenhouse_id: Option<&str>) -> anyhow::Result<GreenhouseSnapshot> {
    let greenhouse_id = match greenhouse_id {
        Some(id) => id.to_string(),
        None => {
            let greenhouses = client.greenhouses().await.context("listing greenhouses")?;
            match greenhouses.into_iter().next() {
                Some(greenhouse) => greenhouse.id,
                // Nothing to show is the empty dataset, not an error
                None => {
                    return Ok(GreenhouseSnapshot {
                        greenhouse_id: String::new(),
                        zones: Vec::new(),
                    })
                }
            }
        }
    };
    client
        .snapshot(&greenhouse_id)
        .await
        .with_context(|| format!("loading greenhouse {}", greenhouse_id))
}

/// Start a full snapshot fetch; the result lands in `pending`
pub fn request_snapshot(backend: &BackendConfig, pending: &PendingSnapshot, state: &mut FetchState) {
    *state = FetchState::Loading;
    let client = backend.client();
    let greenhouse_id = backend.greenhouse_id.clone();
    let slot = pending.0.clone();

    spawn_task(move || async move {
        tracing::info!("Fetching snapshot from: {}", client.base_url());
        let result = fetch_snapshot(&client, greenhouse_id.as_deref())
            .await
            .map_err(|e| format!("{:#}", e));
        if let Ok(mut slot) = slot.lock() {
            *slot = Some(result);
        }
    });
}

/// Send a validated command; the outcome lands in `pending`
pub fn send_control(backend: &BackendConfig, pending: &PendingControl, command: ControlCommand) {
    let client = backend.client();
    let queue = pending.0.clone();

    spawn_task(move || async move {
        let result = verdant_scene::issue_control(&client, &command).await;
        if let Ok(mut queue) = queue.lock() {
            queue.push(ControlOutcome { command, result });
        }
    });
}

fn fetch_initial_snapshot(
    backend: Res<BackendConfig>,
    pending: Res<PendingSnapshot>,
    mut state: ResMut<FetchState>,
) {
    request_snapshot(&backend, &pending, &mut state);
}

fn process_snapshot(
    pending: Res<PendingSnapshot>,
    mut state: ResMut<FetchState>,
    mut twin: NonSendMut<TwinViewer>,
) {
    let result = match pending.0.lock() {
        Ok(mut slot) => slot.take(),
        Err(_) => None,
    };
    let Some(result) = result else {
        return;
    };

    match result {
        Ok(snapshot) => {
            *state = FetchState::Loaded {
                greenhouse_id: snapshot.greenhouse_id.clone(),
                zones: snapshot.zones.len(),
            };
            twin.viewer.apply_snapshot(snapshot);
        }
        Err(e) => {
            tracing::warn!("Snapshot fetch failed: {}", e);
            *state = FetchState::Failed(e);
        }
    }
}

/// Report finished commands; a successful one refetches the snapshot so the
/// scene shows the actuator's new state
fn process_control_outcomes(
    pending: Res<PendingControl>,
    backend: Res<BackendConfig>,
    snapshot: Res<PendingSnapshot>,
    mut state: ResMut<FetchState>,
    mut feedback: ResMut<ControlFeedback>,
) {
    let outcomes = match pending.0.lock() {
        Ok(mut queue) => std::mem::take(&mut *queue),
        Err(_) => Vec::new(),
    };
    if outcomes.is_empty() {
        return;
    }

    let mut refetch = false;
    for outcome in outcomes {
        feedback.in_flight = feedback.in_flight.saturating_sub(1);
        feedback.message = Some(match outcome.result {
            Ok(ack) => {
                refetch = true;
                if ack.message.is_empty() {
                    format!("{} sent to {}", outcome.command.action.label(), ack.actuator_id)
                } else {
                    ack.message
                }
            }
            Err(e) => format!("{} failed: {}", outcome.command.action.label(), e),
        });
    }

    if refetch {
        request_snapshot(&backend, &snapshot, &mut state);
    }
}
