//! Shared fixtures for the `ipack` integration tests.

pub mod project;
pub mod sink;

pub use project::TempProject;
pub use sink::MemorySink;

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use ipack::logging::{build_filter, LOG_ENV};

static TRACING: Once = Once::new();

/// Upper bound for anything a test awaits on.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Install a test-captured subscriber, once per test binary.
///
/// Uses the same filter rules as the binary, so `IPACK_LOG=debug cargo test`
/// shows pipeline internals for failing tests (add `-- --nocapture` to see
/// passing ones too).
pub fn init_tracing() {
    TRACING.call_once(|| {
        let env = std::env::var(LOG_ENV).ok();
        let filter = build_filter(None, env.as_deref())
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Await `f`, panicking if it takes longer than [`TEST_TIMEOUT`].
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: Future<Output = T>,
{
    tokio::time::timeout(TEST_TIMEOUT, f)
        .await
        .unwrap_or_else(|_| panic!("test future did not finish within {TEST_TIMEOUT:?}"))
}
