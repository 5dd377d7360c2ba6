//! Application state.

use std::sync::Arc;
use std::time::Instant;

use dbc_core::Database;
use dbc_core::access::PolicySnapshot;
use dbc_core::masking::MaskingRegistry;

use crate::config::Config;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Server configuration
    pub config: Arc<Config>,
    /// Database connection
    pub db: Arc<Database>,
    /// Masking pattern registry backed by `db`
    pub masking: MaskingRegistry,
    /// Server start time
    pub start_time: Instant,
}

impl AppState {
    /// Create new application state
    pub fn new(config: Config, db: Database) -> Arc<Self> {
        let db = Arc::new(db);
        Arc::new(Self {
            config: Arc::new(config),
            masking: MaskingRegistry::new(Arc::clone(&db)),
            db,
            start_time: Instant::now(),
        })
    }

    /// Consistent view of policies for one request.
    pub fn snapshot(&self) -> dbc_core::Result<Arc<PolicySnapshot>> {
        self.db.load_policy_snapshot().map(Arc::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_shares_database_with_registry() {
        let db = Database::open_in_memory().unwrap();
        let state = AppState::new(Config::default(), db);

        state.masking.seed_defaults().unwrap();
        assert_eq!(state.db.count_masking_patterns().unwrap(), 6);

        let snapshot = state.snapshot().unwrap();
        assert_eq!(snapshot.policy_count(), 0);
        assert!(state.start_time.elapsed().as_secs() < 1);
    }
}
