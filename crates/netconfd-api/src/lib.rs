//! Async clients for the services `netconfd` sits in front of.
//!
//! - **[`RestconfClient`]**: the configuration datastore, reached over
//!   RESTCONF (`/restconf/data`, `/restconf/operations`, and the
//!   `ietf-yang-library` module list).
//! - **[`RedisKv`]**: the shared key-value store holding AAA settings and
//!   the datastore lock.
//! - **[`SystemPersistence`]**: saving the running configuration and
//!   shipping the startup file to a remote URL.
//!
//! Nothing here knows about NETCONF; `netconfd-core` maps these clients onto
//! its own collaborator traits.

pub mod backup;
pub mod error;
pub mod kv;
pub mod restconf;
pub mod transport;

pub use backup::SystemPersistence;
pub use error::Error;
pub use kv::RedisKv;
pub use restconf::{Credentials, ModulesState, RestconfClient, YangModule, to_restconf_path};
pub use transport::{TlsMode, TransportConfig};
