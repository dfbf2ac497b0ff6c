pub mod book;
pub mod client;
pub mod config;
pub mod engine;
pub mod report;
pub mod scenario;
pub mod trace;
pub mod validation;
pub mod workload;

pub use config::{Cli, LoadTestConfig};
pub use report::LoadTestReport;
pub use scenario::Step;
pub use workload::IdStrategy;

use tokio_util::sync::CancellationToken;

pub async fn run_load_test(config: LoadTestConfig) -> anyhow::Result<LoadTestReport> {
    engine::run(config, CancellationToken::new()).await
}

/// Like [`run_load_test`], but stops early once `shutdown` is cancelled.
pub async fn run_load_test_until(
    config: LoadTestConfig,
    shutdown: CancellationToken,
) -> anyhow::Result<LoadTestReport> {
    engine::run(config, shutdown).await
}
