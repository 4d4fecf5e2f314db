//! Display formatting for CLI output

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use pkgmirror_core::PackageIdentity;
use pkgmirror_engine::{MirrorObserver, MirrorOutcome, MirrorReport, PackageOutcome};
use std::sync::Mutex;
use std::time::Duration;

/// One line per outcome, dependencies indented
pub fn format_outcome(outcome: &PackageOutcome) -> String {
    let indent = if outcome.dependency { "    " } else { "  " };
    let marker = match &outcome.outcome {
        MirrorOutcome::Mirrored => style("✓").green(),
        MirrorOutcome::AlreadyPresent => style("=").dim(),
        MirrorOutcome::NotFound => style("?").yellow(),
        MirrorOutcome::TransferFailed(_) => style("✗").red(),
    };
    format!("{}{} {} {}", indent, marker, outcome, style(&outcome.outcome).dim())
}

/// Print the closing summary; warns once when nothing was mirrored
pub fn print_summary(report: &MirrorReport, simulate: bool) {
    println!();
    let verb = if simulate { "Would mirror" } else { "Mirrored" };
    println!(
        "{} {} package(s), {} already present, {} not found, {} failed",
        style(verb).bold(),
        report.mirrored(),
        report.already_present(),
        report.not_found(),
        report.failed()
    );

    if !report.any_succeeded() {
        println!(
            "{} No packages were mirrored",
            style("Warning:").yellow().bold()
        );
    }
}

/// Observer printing outcomes and showing a spinner while a transfer runs
pub struct ConsoleObserver {
    spinner: Mutex<Option<ProgressBar>>,
    simulate: bool,
}

impl ConsoleObserver {
    pub fn new(simulate: bool) -> Self {
        Self {
            spinner: Mutex::new(None),
            simulate,
        }
    }

    fn take_spinner(&self) -> Option<ProgressBar> {
        self.spinner.lock().unwrap_or_else(|e| e.into_inner()).take()
    }
}

impl MirrorObserver for ConsoleObserver {
    fn on_before_transfer(&self, identity: &PackageIdentity) {
        if self.simulate {
            return;
        }

        let spinner = ProgressBar::new_spinner();
        if let Ok(spinner_style) = ProgressStyle::default_spinner().template("  {spinner:.cyan} {msg}") {
            spinner.set_style(spinner_style);
        }
        spinner.set_message(format!("Transferring {}", identity));
        spinner.enable_steady_tick(Duration::from_millis(100));

        if let Some(previous) = self
            .spinner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .replace(spinner)
        {
            previous.finish_and_clear();
        }
    }

    fn on_after_transfer(&self, _identity: &PackageIdentity, _outcome: &MirrorOutcome) {
        if let Some(spinner) = self.take_spinner() {
            spinner.finish_and_clear();
        }
    }

    fn on_outcome(&self, outcome: &PackageOutcome) {
        println!("{}", format_outcome(outcome));
    }
}
