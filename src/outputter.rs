use console::Style;
use flume::Receiver;
use serde::Serialize;
use tracing::info;

use crate::asserter::CheckFailure;
use crate::runner::CheckOutcome;

/// Failures in the order the checks ran. Passing endpoints leave no entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CheckReport {
    failures: Vec<CheckFailure>,
}

impl CheckReport {
    pub fn push(&mut self, failure: CheckFailure) {
        self.failures.push(failure);
    }

    pub fn failures(&self) -> &[CheckFailure] {
        &self.failures
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// The report as a JSON array of `{"url", "msg"}` objects.
    pub fn to_json(&self, pretty: bool) -> serde_json::Result<String> {
        if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        }
    }
}

pub struct OutPutter;

impl OutPutter {
    /// Drains the outcome channel until the runner hangs up.
    ///
    /// Every failure is printed to stderr as it comes in and kept for the
    /// final report, stdout is left alone for the JSON artifact.
    pub async fn start(
        rx: Receiver<CheckOutcome>,
        config_path: &str,
        n_checks: usize,
    ) -> CheckReport {
        let style = Style::new().bold().cyan().for_stderr();
        eprintln!(
            "{}",
            style.apply_to(format!(
                "Checking endpoints from: {config_path} Found {n_checks} endpoints: Running..."
            ))
        );

        let mut report = CheckReport::default();
        let mut i = 1;
        while let Ok(outcome) = rx.recv_async().await {
            match outcome.result {
                Ok(()) => info!(url = %outcome.url, "endpoint passed"),
                Err(failure) => {
                    eprintln!(
                        "[{i}/{n_checks}] {}  {} {}\n====> {}",
                        console::style("╳").red().bold().for_stderr(),
                        failure.url,
                        console::style(format!("{}!", failure.kind).to_uppercase())
                            .red()
                            .bold()
                            .for_stderr(),
                        failure.msg,
                    );
                    report.push(failure);
                }
            }

            i += 1;
        }

        if report.is_empty() {
            eprintln!(
                "{}",
                console::style("All endpoints are healthy!").bold().green().for_stderr()
            );
        } else {
            let summary = format!("{} of {n_checks} endpoints failed", report.failures().len());
            eprintln!("{}", console::style(summary).bold().red().for_stderr());
        }

        report
    }
}
