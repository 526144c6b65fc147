use std::process::ExitCode;

use futures::FutureExt;
use intake_pilot::{intake_fields, run_intake, IntakeBrowser, RunConfig};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = RunConfig::default();
    let fields = intake_fields();

    let browser = match IntakeBrowser::builder().build().await {
        Ok(browser) => browser,
        Err(e) => {
            error!(error = %e, "could not launch browser");
            return ExitCode::FAILURE;
        }
    };

    let url = config.form_url.clone();
    let report = browser
        .with_page(&url, move |page| {
            async move { run_intake(page, &fields, &config).await }.boxed()
        })
        .await;

    match report {
        Ok(report) if report.is_success() => {
            info!("intake submitted and verified");
            ExitCode::SUCCESS
        }
        Ok(report) => {
            info!(
                mismatched = report.mismatched(),
                skipped = report.skipped(),
                status = ?report.submission.status,
                "intake run finished with problems"
            );
            ExitCode::FAILURE
        }
        Err(e) => {
            error!(error = %e, "could not open the form page");
            ExitCode::FAILURE
        }
    }
}
