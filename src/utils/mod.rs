pub mod clock;
pub mod persistence;

use std::sync::Once;

pub use clock::{Clock, FixedClock, SystemClock};

static TRACING_INIT: Once = Once::new();

/// Installs the global fmt subscriber, filtered by `RUST_LOG` plus `fintrack_core=info`.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{filter::Directive, fmt, EnvFilter};

        let mut filter = EnvFilter::from_default_env();
        if let Ok(directive) = "fintrack_core=info".parse::<Directive>() {
            filter = filter.add_directive(directive);
        }

        // A host application may already own the global subscriber.
        let _ = fmt().with_env_filter(filter).try_init();
    });
}
