#![allow(clippy::unwrap_used, dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value as Json;

use netconfd_core::catalog::KeyTable;
use netconfd_core::lock::DEFAULT_LOCK_TTL;
use netconfd_core::{
    AuthKind, Authenticator, ConfigStore, CoreError, DatastoreLock, KeyCatalog, MemoryKv,
    ModuleInfo, ModuleSet, Persistence, Router, SessionState,
};

pub type CallLog = Arc<Mutex<Vec<String>>>;

fn record(log: &CallLog, call: String) {
    log.lock().unwrap().push(call);
}

// ── Store ────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeStore {
    pub calls: CallLog,
    pub data: Mutex<HashMap<String, Json>>,
    pub missing: Mutex<HashSet<String>>,
    pub panic_on_get: bool,
}

impl FakeStore {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn put(&self, path: &str, value: Json) {
        self.data.lock().unwrap().insert(path.to_owned(), value);
    }

    pub fn mark_missing(&self, path: &str) {
        self.missing.lock().unwrap().insert(path.to_owned());
    }

    fn not_found(&self, path: &str) -> Result<(), CoreError> {
        if self.missing.lock().unwrap().contains(path) {
            Err(CoreError::NotFound {
                path: path.to_owned(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ConfigStore for FakeStore {
    async fn get(&self, path: &str) -> Result<Json, CoreError> {
        assert!(!self.panic_on_get, "store exploded");
        record(&self.calls, format!("get {path}"));
        self.not_found(path)?;
        Ok(self
            .data
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .unwrap_or_else(|| serde_json::json!({})))
    }

    async fn create(&self, path: &str, payload: &Json) -> Result<(), CoreError> {
        record(&self.calls, format!("create {path} {payload}"));
        Ok(())
    }

    async fn merge(&self, path: &str, payload: &Json) -> Result<(), CoreError> {
        record(&self.calls, format!("merge {path} {payload}"));
        Ok(())
    }

    async fn replace(&self, path: &str, payload: &Json) -> Result<(), CoreError> {
        record(&self.calls, format!("replace {path} {payload}"));
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), CoreError> {
        record(&self.calls, format!("delete {path}"));
        self.not_found(path)
    }

    async fn action(&self, path: &str, input: &Json) -> Result<Json, CoreError> {
        record(&self.calls, format!("action {path} {input}"));
        Ok(serde_json::json!({ "sonic-rpc:output": { "status": 0 } }))
    }

    async fn modules(&self) -> Result<ModuleSet, CoreError> {
        record(&self.calls, "modules".to_owned());
        Ok(ModuleSet {
            module_set_id: "12".into(),
            modules: vec![ModuleInfo {
                name: "sonic-port".into(),
                revision: "2019-07-01".into(),
                namespace: "http://github.com/Azure/sonic-port".into(),
                schema: None,
                conformance: Some("implement".into()),
            }],
        })
    }
}

// ── Persistence ──────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakePersistence {
    pub calls: CallLog,
}

#[async_trait]
impl Persistence for FakePersistence {
    async fn save_running(&self) -> Result<(), CoreError> {
        record(&self.calls, "save".to_owned());
        Ok(())
    }

    async fn upload_startup(&self, url: &str) -> Result<(), CoreError> {
        record(&self.calls, format!("upload {url}"));
        Ok(())
    }
}

// ── Principal ────────────────────────────────────────────────────────

pub struct FakePrincipal {
    pub kind: AuthKind,
    pub deny: HashSet<String>,
    pub account_ok: bool,
    pub calls: CallLog,
}

impl FakePrincipal {
    pub fn allow_all(calls: CallLog) -> Self {
        Self {
            kind: AuthKind::Local,
            deny: HashSet::new(),
            account_ok: true,
            calls,
        }
    }
}

#[async_trait]
impl Authenticator for FakePrincipal {
    fn user(&self) -> &str {
        "admin"
    }

    fn kind(&self) -> AuthKind {
        self.kind
    }

    async fn authenticate(&self) -> bool {
        true
    }

    async fn authorize(&self, command: &str, args: &str) -> bool {
        record(&self.calls, format!("authorize {command} {args}"));
        !self.deny.contains(command) && !self.deny.contains(args)
    }

    async fn account(&self, command: &str, args: &str) -> bool {
        record(&self.calls, format!("account {command} {args}"));
        self.account_ok
    }

    async fn release(&self) {
        record(&self.calls, "release".to_owned());
    }
}

// ── Wiring ───────────────────────────────────────────────────────────

pub fn catalog() -> KeyCatalog {
    let mut sonic = KeyTable::new();
    sonic.insert("/sonic-port:sonic-port/PORT/PORT_LIST".into(), vec!["name".into()]);
    sonic.insert(
        "/sonic-portchannel:sonic-portchannel/PORTCHANNEL_MEMBER/PORTCHANNEL_MEMBER_LIST".into(),
        vec!["name".into(), "ifname".into()],
    );
    KeyCatalog::new(sonic, KeyTable::new())
}

pub struct Harness {
    pub router: Router,
    pub store: Arc<FakeStore>,
    pub persistence: Arc<FakePersistence>,
    pub kv: Arc<MemoryKv>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_store(FakeStore::default())
    }

    pub fn with_store(store: FakeStore) -> Self {
        let store = Arc::new(store);
        let persistence = Arc::new(FakePersistence::default());
        let kv = Arc::new(MemoryKv::new());
        let router = Router::new(
            store.clone(),
            persistence.clone(),
            DatastoreLock::new(kv.clone(), DEFAULT_LOCK_TTL),
            Arc::new(catalog()),
        );
        Self {
            router,
            store,
            persistence,
            kv,
        }
    }

    pub fn session(&self) -> (SessionState, CallLog) {
        let calls = CallLog::default();
        let session = SessionState::new(Box::new(FakePrincipal::allow_all(calls.clone())));
        (session, calls)
    }
}

/// `<rpc message-id="ID">BODY</rpc>`
pub fn rpc(id: &str, body: &str) -> String {
    format!(r#"<rpc xmlns="urn:ietf:params:xml:ns:netconf:base:1.0" message-id="{id}">{body}</rpc>"#)
}

pub fn ok_reply(id: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?><rpc-reply xmlns="urn:ietf:params:xml:ns:netconf:base:1.0" message-id="{id}"><ok/></rpc-reply>"#
    )
}

pub fn error_reply(id: &str, message: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?><rpc-reply xmlns="urn:ietf:params:xml:ns:netconf:base:1.0" message-id="{id}"><rpc-error><error-type>rpc</error-type><error-severity>error</error-severity><error-message xml:lang="en">{message}</error-message></rpc-error></rpc-reply>"#
    )
}
