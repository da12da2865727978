//! Application state shared across all request handlers.

use splitpay_core::config::SharedConfig;
use splitpay_core::gateway::HttpPaymentGateway;
use splitpay_core::reconciliation::ReconciliationEngine;
use splitpay_core::store::PgSplitStore;

/// The engine as wired in production: Postgres store, HTTP gateway.
pub type Engine = ReconciliationEngine<PgSplitStore, HttpPaymentGateway>;

/// Application state that is shared across all request handlers.
///
/// This is cloneable and cheap to pass around (everything is behind Arc).
#[derive(Clone)]
pub struct AppState {
    /// Runtime configuration (sections reloaded via SIGHUP).
    pub config: SharedConfig,
    pub engine: Engine,
}

impl AppState {
    pub fn new(config: SharedConfig, engine: Engine) -> Self {
        Self { config, engine }
    }
}
