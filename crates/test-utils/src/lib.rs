pub mod builders;
pub mod fixtures;
pub mod recorder;

use std::sync::Once;
use tracing_subscriber::{fmt, EnvFilter};

static INIT: Once = Once::new();

/// Install a test-friendly tracing subscriber once per test binary.
///
/// Output goes through the test writer, so it only shows up for failing
/// tests or with `--nocapture`. `RUST_LOG` picks the filter (default
/// `info`); `RUST_LOG=taskdag=debug` shows every node transition.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Fail the test if `f` has not finished within five seconds.
///
/// Not for `start_paused` tests: the virtual clock would skip straight to
/// the deadline.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(std::time::Duration::from_secs(5), f)
        .await
        .expect("resolution did not finish within 5 seconds")
}
