use async_trait::async_trait;
use gatehouse::authz::errors::AuthzError;
use gatehouse::authz::store::PermissionStore;
use gatehouse::authz::tables::AliasTable;
use gatehouse::backend::PermissionBackend;
use gatehouse::identity::MemoryIdentityStore;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Scripted backend: fixed role, swappable privilege rows, optional failure.
pub struct MockBackend {
    role_id: Value,
    privileges: Mutex<Value>,
    fail_privileges: AtomicBool,
    pub employee_calls: AtomicUsize,
    pub privilege_calls: AtomicUsize,
}

impl MockBackend {
    pub fn new(privileges: Value) -> Self {
        Self {
            role_id: json!(7),
            privileges: Mutex::new(privileges),
            fail_privileges: AtomicBool::new(false),
            employee_calls: AtomicUsize::new(0),
            privilege_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_privileges(&self, privileges: Value) {
        *self.privileges.lock().unwrap() = privileges;
    }

    pub fn fail_privileges(&self, fail: bool) {
        self.fail_privileges.store(fail, Ordering::SeqCst);
    }

    pub fn privilege_calls(&self) -> usize {
        self.privilege_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PermissionBackend for MockBackend {
    async fn employee_details(
        &self,
        user_id: &str,
        _token: Option<&str>,
    ) -> Result<Value, AuthzError> {
        self.employee_calls.fetch_add(1, Ordering::SeqCst);
        Ok(json!({ "id": user_id, "role_id": self.role_id }))
    }

    async fn user_privilege_list(
        &self,
        _role_id: &str,
        _token: Option<&str>,
    ) -> Result<Value, AuthzError> {
        self.privilege_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_privileges.load(Ordering::SeqCst) {
            return Err(AuthzError::BackendStatus {
                url: "http://backend.test/api/user-privileges/".into(),
                status: 500,
            });
        }
        Ok(self.privileges.lock().unwrap().clone())
    }
}

/// Builder for a store wired to in-memory identity and a mock backend
pub struct StoreBuilder {
    marker: Option<Value>,
    privileges: Value,
}

impl Default for StoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreBuilder {
    pub fn new() -> Self {
        Self {
            marker: Some(json!({ "id": 42, "access": "token-abc" })),
            privileges: json!({ "results": [] }),
        }
    }

    pub fn signed_out(mut self) -> Self {
        self.marker = None;
        self
    }

    pub fn with_privileges(mut self, privileges: Value) -> Self {
        self.privileges = privileges;
        self
    }

    pub fn build(
        self,
    ) -> (
        Arc<PermissionStore>,
        Arc<MemoryIdentityStore>,
        Arc<MockBackend>,
    ) {
        let identity = Arc::new(MemoryIdentityStore::new(self.marker));
        let backend = Arc::new(MockBackend::new(self.privileges));
        let store = Arc::new(PermissionStore::new(
            identity.clone(),
            backend.clone(),
            Arc::new(AliasTable::builtin()),
        ));
        (store, identity, backend)
    }
}

pub fn row(module: &str, view: bool, create: bool, update: bool, delete: bool) -> Value {
    json!({
        "module_name": module,
        "is_read": view,
        "is_create": create,
        "is_update": update,
        "is_delete": delete,
    })
}
