//! In-memory catalog of tools discovered across tool servers.
//!
//! The registry is shared read-mostly state. Each server's descriptor
//! list is an immutable `Arc<Vec<_>>` snapshot; a refresh builds a new
//! vector and swaps it in under a brief write lock, so lookups never
//! observe a half-updated catalog and never wait on network work.
//!
//! Refresh is per-server and partial: a server that fails to answer keeps
//! its last-known descriptors, marked stale, until it answers again.
//! Duplicate tool names across servers resolve by configuration order and
//! the conflict is logged once per (name, losing server) pair.

use crate::tp::{ToolProtocolClient, ToolSpec};
use crate::types::ToolDescriptor;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

/// Catalog entry for one server.
#[derive(Clone)]
struct ServerCatalog {
    tools: Arc<Vec<ToolDescriptor>>,
    /// True when the last refresh attempt failed and `tools` is the
    /// previous snapshot
    stale: bool,
    refreshed_at: DateTime<Utc>,
}

/// Tool catalog across all configured servers.
pub struct ToolRegistry {
    tpc: Arc<ToolProtocolClient>,
    /// Server ids in configuration (= precedence) order
    server_order: Vec<String>,
    catalogs: RwLock<HashMap<String, ServerCatalog>>,
    /// (tool_name, losing server) pairs already reported
    logged_conflicts: Mutex<HashSet<(String, String)>>,
    refresh_interval: Duration,
    refresh_requested: Notify,
}

impl ToolRegistry {
    pub fn new(tpc: Arc<ToolProtocolClient>, refresh_interval: Duration) -> Self {
        let server_order = tpc.servers().iter().map(|s| s.id.clone()).collect();
        Self {
            tpc,
            server_order,
            catalogs: RwLock::new(HashMap::new()),
            logged_conflicts: Mutex::new(HashSet::new()),
            refresh_interval,
            refresh_requested: Notify::new(),
        }
    }

    /// Refresh all servers concurrently, swapping each server's snapshot
    /// independently. A failing server keeps its previous descriptors,
    /// marked stale.
    pub async fn refresh(&self) {
        let listings = join_all(
            self.server_order
                .iter()
                .map(|id| async move { (id.clone(), self.tpc.list_tools(id).await) }),
        )
        .await;

        for (server_id, listing) in listings {
            match listing {
                Ok(specs) => {
                    let now = Utc::now();
                    let tools: Vec<ToolDescriptor> = specs
                        .into_iter()
                        .map(|spec| spec_to_descriptor(&server_id, spec, now))
                        .collect();
                    let count = tools.len();
                    let mut catalogs = self.catalogs.write().expect("registry lock poisoned");
                    catalogs.insert(
                        server_id.clone(),
                        ServerCatalog {
                            tools: Arc::new(tools),
                            stale: false,
                            refreshed_at: now,
                        },
                    );
                    debug!(
                        component = "registry",
                        event = "refresh",
                        server_id = %server_id,
                        tool_count = count,
                        "server catalog refreshed"
                    );
                }
                Err(err) => {
                    let mut catalogs = self.catalogs.write().expect("registry lock poisoned");
                    match catalogs.get_mut(&server_id) {
                        Some(catalog) => {
                            catalog.stale = true;
                            warn!(
                                component = "registry",
                                event = "refresh_failed",
                                server_id = %server_id,
                                error_kind = err.kind().map(|k| k.as_str()).unwrap_or("internal"),
                                "keeping stale catalog: {}", err
                            );
                        }
                        None => {
                            warn!(
                                component = "registry",
                                event = "refresh_failed",
                                server_id = %server_id,
                                error_kind = err.kind().map(|k| k.as_str()).unwrap_or("internal"),
                                "server has no catalog yet: {}", err
                            );
                        }
                    }
                }
            }
        }
    }

    /// Look up a tool by name across servers in configuration order.
    ///
    /// On duplicate names the first configured server wins; the shadowed
    /// server is reported once at warn level.
    pub fn lookup(&self, tool_name: &str) -> Option<ToolDescriptor> {
        let catalogs = self.catalogs.read().expect("registry lock poisoned");
        let mut winner: Option<&ToolDescriptor> = None;
        let mut shadowed: Vec<String> = Vec::new();

        for server_id in &self.server_order {
            let Some(catalog) = catalogs.get(server_id) else {
                continue;
            };
            if let Some(descriptor) = catalog.tools.iter().find(|t| t.tool_name == tool_name) {
                if winner.is_none() {
                    winner = Some(descriptor);
                } else {
                    shadowed.push(descriptor.server_id.clone());
                }
            }
        }

        let found = winner.cloned();
        drop(catalogs);

        if let Some(descriptor) = &found {
            let mut logged = self.logged_conflicts.lock().expect("conflict lock poisoned");
            for loser in shadowed {
                if logged.insert((tool_name.to_string(), loser.clone())) {
                    warn!(
                        component = "registry",
                        event = "tool_conflict",
                        tool_name = %tool_name,
                        winner = %descriptor.server_id,
                        shadowed = %loser,
                        "duplicate tool name; first configured server wins"
                    );
                }
            }
        }
        found
    }

    /// Snapshot of every known descriptor, precedence order, duplicates
    /// shadowed. Safe to enumerate without holding any lock.
    pub fn all_tools(&self) -> Vec<ToolDescriptor> {
        let catalogs = self.catalogs.read().expect("registry lock poisoned");
        let mut seen: HashSet<&str> = HashSet::new();
        let mut tools = Vec::new();
        for server_id in &self.server_order {
            let Some(catalog) = catalogs.get(server_id) else {
                continue;
            };
            for descriptor in catalog.tools.iter() {
                if seen.insert(descriptor.tool_name.as_str()) {
                    tools.push(descriptor.clone());
                }
            }
        }
        tools
    }

    /// Names of every visible tool, for plan validation.
    pub fn tool_names(&self) -> HashSet<String> {
        self.all_tools()
            .into_iter()
            .map(|t| t.tool_name)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        let catalogs = self.catalogs.read().expect("registry lock poisoned");
        catalogs.values().all(|c| c.tools.is_empty())
    }

    /// Whether a server's catalog is currently stale. `None` when the
    /// server has never refreshed.
    pub fn is_stale(&self, server_id: &str) -> Option<bool> {
        let catalogs = self.catalogs.read().expect("registry lock poisoned");
        catalogs.get(server_id).map(|c| c.stale)
    }

    /// When a server's catalog was last refreshed successfully.
    pub fn refreshed_at(&self, server_id: &str) -> Option<DateTime<Utc>> {
        let catalogs = self.catalogs.read().expect("registry lock poisoned");
        catalogs.get(server_id).map(|c| c.refreshed_at)
    }

    /// Ask the background task for an out-of-cadence refresh, e.g. after
    /// a `ServerUnreachable` on a tool call. Non-blocking.
    pub fn request_refresh(&self) {
        self.refresh_requested.notify_one();
    }

    /// Run the periodic refresh loop: refresh now, then every
    /// `refresh_interval` or sooner when [`request_refresh`] fires.
    ///
    /// [`request_refresh`]: ToolRegistry::request_refresh
    pub async fn run_refresh_loop(self: Arc<Self>) {
        info!(
            component = "registry",
            event = "refresh_loop_started",
            interval_secs = self.refresh_interval.as_secs(),
            "registry refresh loop running"
        );
        loop {
            self.refresh().await;
            tokio::select! {
                _ = tokio::time::sleep(self.refresh_interval) => {}
                _ = self.refresh_requested.notified() => {
                    debug!(
                        component = "registry",
                        event = "forced_refresh",
                        "refreshing ahead of cadence"
                    );
                }
            }
        }
    }
}

fn spec_to_descriptor(server_id: &str, spec: ToolSpec, now: DateTime<Utc>) -> ToolDescriptor {
    ToolDescriptor {
        server_id: server_id.to_string(),
        tool_name: spec.name,
        description: spec.description,
        parameter_schema: spec.parameter_schema,
        return_schema: spec.return_schema,
        discovered_at: now,
    }
}
