#![doc(test(attr(deny(warnings))))]

//! FinTrack Core keeps a double-entry personal ledger in integer cents, schedules
//! recurring transactions against it, and derives net worth and period metrics.

pub mod config;
pub mod currency;
pub mod engine;
pub mod errors;
pub mod ledger;
pub mod recurring;
pub mod summary;
pub mod utils;

use std::sync::Once;

pub use config::{ConfigManager, EngineConfig};
pub use engine::{Engine, EngineState, SchedulerReport};
pub use errors::{LedgerError, Result};

static INIT_TRACING: Once = Once::new();

/// Initializes global tracing and emits a startup info log.
pub fn init() {
    INIT_TRACING.call_once(|| {
        utils::init_tracing();
        tracing::info!("FinTrack Core tracing initialized.");
    });
}
