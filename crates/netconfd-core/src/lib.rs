//! NETCONF server core.
//!
//! A session ([`session::run`]) frames messages off a byte stream
//! ([`framing`]), hands each to the [`router::Router`], and writes back the
//! reply. The router compiles XML filters and edits into datastore paths
//! ([`compile`]), gates operations through the session's
//! [`aaa::Authenticator`], and talks to the outside world only through the
//! [`store`] and [`kv`] traits.

pub mod aaa;
pub mod catalog;
pub mod compile;
pub mod error;
pub mod framing;
pub mod hello;
pub mod kv;
pub mod lock;
pub mod modules;
pub mod reply;
pub mod router;
pub mod session;
pub mod store;
pub mod value;
pub mod xml;

pub use aaa::{AaaService, AuthKind, Authenticator, LoginRequest};
pub use catalog::KeyCatalog;
pub use error::CoreError;
pub use kv::{KvStore, MemoryKv};
pub use lock::DatastoreLock;
pub use modules::{ModuleCache, ModuleInfo, ModuleSet};
pub use router::Router;
pub use session::SessionState;
pub use store::{ConfigStore, Persistence};
