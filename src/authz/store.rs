//! The permission store.
//!
//! Owns one fetch/normalize cycle at a time and publishes its result through a
//! `watch` channel so guards and menus always read the latest snapshot.
//! Refreshes are pushed either directly (`invalidate`, `handle_signal`) or as
//! fire-and-forget signals on the store's broadcast bus.
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use serde_json::Value;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::authz::engine;
use crate::authz::errors::AuthzError;
use crate::authz::normalize::normalize;
use crate::authz::tables::AliasTable;
use crate::authz::types::{PermissionMap, SnapshotResponse};
use crate::backend::{extract_privilege_rows, resolve_role_id, PermissionBackend};
use crate::identity::IdentityStore;

const SIGNAL_CAPACITY: usize = 16;

/// Store state as seen by consumers. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct PermissionSnapshot {
    /// Raw privilege rows of the last successful fetch
    pub permissions: Arc<Vec<Value>>,
    pub permission_map: Arc<PermissionMap>,
    pub is_loading: bool,
    pub is_logged_in: bool,
    /// Generation of the fetch that produced this snapshot
    pub generation: u64,
}

impl PermissionSnapshot {
    pub fn can_access(&self, module: &str, action: &str) -> bool {
        engine::can_access(self, module, action)
    }

    pub fn to_response(&self) -> SnapshotResponse {
        let mut modules = std::collections::BTreeMap::new();
        for (key, permission) in self.permission_map.iter() {
            modules.insert(key.clone(), permission.capabilities());
        }
        SnapshotResponse {
            is_logged_in: self.is_logged_in,
            is_loading: self.is_loading,
            generation: self.generation,
            modules,
        }
    }
}

/// Named refresh signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefreshSignal {
    /// A role's privileges were edited
    PrivilegeUpdate,
    /// Someone signed in or out
    UserInfoUpdate,
}

impl RefreshSignal {
    pub fn name(&self) -> &'static str {
        match self {
            RefreshSignal::PrivilegeUpdate => "privilege-update",
            RefreshSignal::UserInfoUpdate => "user-info-update",
        }
    }
}

impl FromStr for RefreshSignal {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "privilege-update" => Ok(RefreshSignal::PrivilegeUpdate),
            "user-info-update" => Ok(RefreshSignal::UserInfoUpdate),
            other => Err(AuthzError::UnknownSignal(other.to_string())),
        }
    }
}

/// What one fetch resolved to, before it is committed.
#[derive(Debug)]
enum FetchOutcome {
    /// No identity marker
    SignedOut,
    /// Signed in, but no user id or role id could be resolved
    Unresolved,
    Resolved {
        permissions: Vec<Value>,
        permission_map: PermissionMap,
    },
}

pub struct PermissionStore {
    identity: Arc<dyn IdentityStore>,
    backend: Arc<dyn PermissionBackend>,
    aliases: Arc<AliasTable>,
    state: watch::Sender<PermissionSnapshot>,
    latest: AtomicU64,
    signals: broadcast::Sender<RefreshSignal>,
}

impl PermissionStore {
    pub fn new(
        identity: Arc<dyn IdentityStore>,
        backend: Arc<dyn PermissionBackend>,
        aliases: Arc<AliasTable>,
    ) -> Self {
        let initial = PermissionSnapshot {
            is_loading: true,
            is_logged_in: identity.has_marker(),
            ..Default::default()
        };
        let (state, _) = watch::channel(initial);
        let (signals, _) = broadcast::channel(SIGNAL_CAPACITY);

        Self {
            identity,
            backend,
            aliases,
            state,
            latest: AtomicU64::new(0),
            signals,
        }
    }

    pub fn snapshot(&self) -> PermissionSnapshot {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PermissionSnapshot> {
        self.state.subscribe()
    }

    pub fn can_access(&self, module: &str, action: &str) -> bool {
        self.state.borrow().can_access(module, action)
    }

    /// Synchronous marker check, independent of the last fetch.
    pub fn has_identity_marker(&self) -> bool {
        self.identity.has_marker()
    }

    /// Resolves once the store is not loading.
    pub async fn wait_until_loaded(&self) -> PermissionSnapshot {
        let mut rx = self.state.subscribe();
        let result = rx.wait_for(|s| !s.is_loading).await.map(|s| s.clone());
        match result {
            Ok(snapshot) => snapshot,
            // The sender lives as long as `self`, so this is unreachable in practice.
            Err(_) => self.snapshot(),
        }
    }

    /// Run one full fetch cycle and commit it unless a newer fetch has started.
    ///
    /// Never fails: errors are logged and leave the previous permissions in place.
    pub async fn fetch_permissions(&self) {
        let generation = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(generation, "fetching permissions");

        match self.resolve().await {
            Ok(outcome) => self.commit(generation, outcome),
            Err(e) => {
                tracing::error!(generation, error = %e, "failed to fetch permissions");
                self.commit_failure(generation);
            }
        }
    }

    /// Refetch now.
    pub async fn invalidate(&self) {
        self.fetch_permissions().await;
    }

    /// React to a refresh signal.
    pub async fn handle_signal(&self, signal: RefreshSignal) {
        tracing::info!(signal = signal.name(), "refresh signal received");
        if signal == RefreshSignal::UserInfoUpdate {
            let logged_in = self.identity.has_marker();
            self.state.send_if_modified(|s| {
                let changed = s.is_logged_in != logged_in;
                s.is_logged_in = logged_in;
                changed
            });
        }
        self.fetch_permissions().await;
    }

    /// Publish a signal on the bus. Fire-and-forget: without a listener it is dropped.
    pub fn signal(&self, signal: RefreshSignal) -> bool {
        match self.signals.send(signal) {
            Ok(_) => true,
            Err(_) => {
                tracing::warn!(signal = signal.name(), "no signal listener attached");
                false
            }
        }
    }

    /// Subscribe to the bus and refetch on signals.
    ///
    /// Signals queued while a fetch runs are coalesced into one follow-up
    /// fetch, so a burst cannot keep superseding its own generations. A
    /// `user-info-update` anywhere in the burst wins, since it also re-reads
    /// the marker. Dropping the returned listener unsubscribes.
    pub fn spawn_signal_listener(self: &Arc<Self>) -> SignalListener {
        let mut rx = self.signals.subscribe();
        let store: Weak<Self> = Arc::downgrade(self);

        let handle = tokio::spawn(async move {
            loop {
                let mut signal = match rx.recv().await {
                    Ok(signal) => signal,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "signal listener lagged, refetching");
                        RefreshSignal::UserInfoUpdate
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };

                let mut coalesced = 0usize;
                loop {
                    match rx.try_recv() {
                        Ok(next) => {
                            coalesced += 1;
                            if next == RefreshSignal::UserInfoUpdate {
                                signal = next;
                            }
                        }
                        Err(broadcast::error::TryRecvError::Lagged(_)) => {
                            signal = RefreshSignal::UserInfoUpdate;
                        }
                        Err(_) => break,
                    }
                }
                if coalesced > 0 {
                    tracing::debug!(coalesced, signal = signal.name(), "coalesced refresh signals");
                }

                let Some(store) = store.upgrade() else {
                    break;
                };
                store.handle_signal(signal).await;
            }
        });

        SignalListener { handle }
    }

    async fn resolve(&self) -> Result<FetchOutcome, AuthzError> {
        let Some(marker) = self.identity.read_marker()? else {
            return Ok(FetchOutcome::SignedOut);
        };

        let Some(user_id) = marker.user_id() else {
            tracing::warn!("identity marker has no user id");
            return Ok(FetchOutcome::Unresolved);
        };

        let token = marker.bearer_token();
        let details = self.backend.employee_details(&user_id, token).await?;

        let Some(role_id) = resolve_role_id(&details, &marker) else {
            tracing::warn!(%user_id, "no role id resolved for user");
            return Ok(FetchOutcome::Unresolved);
        };

        let response = self.backend.user_privilege_list(&role_id, token).await?;
        let permissions = extract_privilege_rows(&response);
        let permission_map = normalize(&permissions, &self.aliases);

        tracing::info!(
            %user_id,
            %role_id,
            rows = permissions.len(),
            modules = permission_map.len(),
            "Resolved role privileges"
        );

        Ok(FetchOutcome::Resolved {
            permissions,
            permission_map,
        })
    }

    fn is_current(&self, generation: u64, snapshot: &PermissionSnapshot) -> bool {
        generation == self.latest.load(Ordering::SeqCst) && generation >= snapshot.generation
    }

    fn commit(&self, generation: u64, outcome: FetchOutcome) {
        let committed = self.state.send_if_modified(|s| {
            if !self.is_current(generation, s) {
                return false;
            }
            *s = match outcome {
                FetchOutcome::SignedOut => PermissionSnapshot {
                    is_loading: false,
                    is_logged_in: false,
                    generation,
                    ..Default::default()
                },
                // Never carry a previous operator's grants over
                FetchOutcome::Unresolved => PermissionSnapshot {
                    is_loading: false,
                    is_logged_in: true,
                    generation,
                    ..Default::default()
                },
                FetchOutcome::Resolved {
                    permissions,
                    permission_map,
                } => PermissionSnapshot {
                    permissions: Arc::new(permissions),
                    permission_map: Arc::new(permission_map),
                    is_loading: false,
                    is_logged_in: true,
                    generation,
                },
            };
            true
        });
        if !committed {
            tracing::debug!(generation, "discarding superseded permission fetch");
        }
    }

    fn commit_failure(&self, generation: u64) {
        self.state.send_if_modified(|s| {
            if !self.is_current(generation, s) {
                return false;
            }
            s.is_loading = false;
            s.generation = generation;
            true
        });
    }
}

/// Background task feeding bus signals into the store. Aborted on drop.
#[derive(Debug)]
pub struct SignalListener {
    handle: JoinHandle<()>,
}

impl SignalListener {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for SignalListener {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::MemoryIdentityStore;
    use async_trait::async_trait;
    use serde_json::json;

    struct StaticBackend {
        details: Value,
        privileges: Value,
    }

    #[async_trait]
    impl PermissionBackend for StaticBackend {
        async fn employee_details(&self, _: &str, _: Option<&str>) -> Result<Value, AuthzError> {
            Ok(self.details.clone())
        }

        async fn user_privilege_list(
            &self,
            _: &str,
            _: Option<&str>,
        ) -> Result<Value, AuthzError> {
            Ok(self.privileges.clone())
        }
    }

    fn store(marker: Option<Value>, details: Value, privileges: Value) -> PermissionStore {
        PermissionStore::new(
            Arc::new(MemoryIdentityStore::new(marker)),
            Arc::new(StaticBackend {
                details,
                privileges,
            }),
            Arc::new(AliasTable::builtin()),
        )
    }

    #[test]
    fn test_signal_names() {
        for signal in [RefreshSignal::PrivilegeUpdate, RefreshSignal::UserInfoUpdate] {
            assert_eq!(signal.name().parse::<RefreshSignal>().unwrap(), signal);
        }
        assert!(matches!(
            "logout".parse::<RefreshSignal>(),
            Err(AuthzError::UnknownSignal(_))
        ));
    }

    #[tokio::test]
    async fn test_initial_state_reads_marker() {
        let s = store(Some(json!({ "id": 1 })), json!({}), json!([]));
        let snap = s.snapshot();
        assert!(snap.is_loading);
        assert!(snap.is_logged_in);
        assert_eq!(snap.generation, 0);

        let s = store(None, json!({}), json!([]));
        assert!(!s.snapshot().is_logged_in);
    }

    #[tokio::test]
    async fn test_signed_out_commits_empty_state() {
        let s = store(None, json!({}), json!([]));
        s.fetch_permissions().await;
        let snap = s.snapshot();
        assert!(!snap.is_loading);
        assert!(!snap.is_logged_in);
        assert!(snap.permission_map.is_empty());
    }

    #[tokio::test]
    async fn test_missing_user_id_degrades() {
        let s = store(Some(json!({ "name": "ops" })), json!({}), json!([]));
        s.fetch_permissions().await;
        let snap = s.snapshot();
        assert!(!snap.is_loading);
        assert!(snap.is_logged_in);
        assert!(snap.permission_map.is_empty());
        assert!(s.can_access("Tax", "delete"));
    }

    #[tokio::test]
    async fn test_resolved_fetch_commits_map() {
        let s = store(
            Some(json!({ "id": 7 })),
            json!({ "role": { "id": 3 } }),
            json!({ "data": { "results": [
                { "module_name": "Tax Master", "is_read": "1", "is_update": true }
            ] } }),
        );
        s.fetch_permissions().await;
        let snap = s.snapshot();
        assert!(!snap.is_loading);
        assert_eq!(snap.generation, 1);
        assert_eq!(snap.permissions.len(), 1);
        assert!(snap.permission_map.contains_key("tax"));
        assert!(snap.permission_map.contains_key("tax master"));
        assert!(s.can_access("Tax", "edit"));
        assert!(!s.can_access("Tax", "delete"));
        assert!(!s.can_access("Invoices", "view"));

        let response = snap.to_response();
        assert!(response.modules["tax"].update);
    }

    #[tokio::test]
    async fn test_superseded_generation_is_discarded() {
        let s = store(
            Some(json!({ "id": 7 })),
            json!({ "role_id": 3 }),
            json!([{ "module_name": "Tax", "is_read": true }]),
        );
        // Two fetches start; the older one resolves last and must not commit.
        let older = s.latest.fetch_add(1, Ordering::SeqCst) + 1;
        s.fetch_permissions().await;
        assert_eq!(s.snapshot().generation, 2);

        s.commit(
            older,
            FetchOutcome::Resolved {
                permissions: vec![],
                permission_map: PermissionMap::new(),
            },
        );
        let snap = s.snapshot();
        assert_eq!(snap.generation, 2);
        assert!(snap.permission_map.contains_key("tax"));
    }

    #[tokio::test]
    async fn test_wait_until_loaded() {
        let s = Arc::new(store(
            Some(json!({ "id": 7 })),
            json!({ "role_id": 3 }),
            json!([{ "module_name": "Tax", "is_read": true }]),
        ));
        let waiter = {
            let s = Arc::clone(&s);
            tokio::spawn(async move { s.wait_until_loaded().await })
        };
        s.fetch_permissions().await;
        let snap = waiter.await.unwrap();
        assert!(!snap.is_loading);
        assert!(snap.permission_map.contains_key("tax"));
    }
}
