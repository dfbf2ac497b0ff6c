use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use book_loadtest::{Cli, LoadTestConfig, run_load_test_until, trace};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let output_json = cli.json;

    if let Err(err) = trace::init(&cli.log, cli.log_format) {
        eprintln!("failed to initialise logging: {err:#}");
        std::process::exit(2);
    }
    debug!(?cli);

    let config = match LoadTestConfig::try_from(cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("configuration error: {err:#}");
            std::process::exit(2);
        }
    };

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted, stopping virtual users");
                shutdown.cancel();
            }
        }
    });

    match run_load_test_until(config, shutdown).await {
        Ok(report) => {
            if output_json {
                match serde_json::to_string_pretty(&report) {
                    Ok(json) => println!("{json}"),
                    Err(err) => {
                        eprintln!("failed to serialize report: {err:#}");
                        std::process::exit(2);
                    }
                }
            } else {
                println!("{}", report.human_summary());
            }

            if report.passed {
                std::process::exit(0);
            }

            std::process::exit(1);
        }
        Err(err) => {
            eprintln!("run failed: {err:#}");
            std::process::exit(1);
        }
    }
}
