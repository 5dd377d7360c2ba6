//! Connection form support: URI parsing/building and field/URI synchronization.

pub mod driver;
pub mod sync;
pub mod uri;

pub use driver::{FormEvent, SyncDriver};
pub use sync::{
    ConnectionFormData, EditSource, FormField, SyncConfig, SyncCoordinator, SyncOutcome, SyncState,
};
pub use uri::{ParsedFields, build_uri, default_port, parse_uri, redact_uri, scheme_for};

use crate::types::ConnectionConfig;

impl From<&ConnectionConfig> for ConnectionFormData {
    fn from(config: &ConnectionConfig) -> Self {
        Self {
            name: config.name.clone(),
            host: config.host.clone(),
            port: config.port.clone(),
            user: config.user.clone(),
            password: config.password.clone(),
            database: config.database.clone(),
            description: config.description.clone(),
            uri: config.uri.clone(),
        }
    }
}
