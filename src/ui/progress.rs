use crate::ui::icons::{CHECK, CROSS, LINK, SPARKLE, WARN};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::fmt::Display;
use std::time::Duration;

/// Terminal progress output for an installation run.
///
/// Lines go to stdout; a spinner on stderr marks the steps that block on
/// transaction confirmation. Printing suspends the spinner so the two never
/// interleave.
pub struct InstallerUI {
    spinner: ProgressBar,
    verbose: bool,
}

impl InstallerUI {
    pub fn new(verbose: bool) -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner} {msg} {elapsed:.dim}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        Self { spinner, verbose }
    }

    fn print_line(&self, msg: impl AsRef<str>) {
        self.spinner.suspend(|| println!("{}", msg.as_ref()));
    }

    /// Header for one pipeline stage, e.g. `"1. Prepare installation"`.
    pub fn stage(&self, title: &str) {
        self.print_line("");
        self.print_line(format!("{}", style(title).bold()));
    }

    /// A labelled value such as an address or transaction hash.
    pub fn field(&self, label: &str, value: impl Display) {
        self.print_line(format!("  {}: {}", style(label).dim(), value));
    }

    /// Only shown in verbose mode.
    pub fn detail(&self, label: &str, value: impl Display) {
        if self.verbose {
            self.field(label, value);
        }
    }

    pub fn transaction(&self, label: &str, tx_hash: impl Display) {
        self.print_line(format!("  {}{}: {}", LINK, label, style(tx_hash).cyan()));
    }

    /// Start the spinner while a transaction or request is outstanding.
    pub fn wait(&self, msg: &str) {
        self.spinner.set_message(msg.to_string());
        self.spinner.enable_steady_tick(Duration::from_millis(100));
    }

    /// Stop the spinner and print a success line.
    pub fn done(&self, msg: &str) {
        self.spinner.disable_steady_tick();
        self.spinner.set_message("");
        self.print_line(format!("  {}{}", CHECK, style(msg).green()));
    }

    pub fn warn(&self, msg: &str) {
        self.print_line(format!("  {}{}", WARN, style(msg).yellow()));
    }

    pub fn fail(&self, msg: &str) {
        self.spinner.finish_and_clear();
        self.print_line(format!("{}{}", CROSS, style(msg).red().bold()));
    }

    pub fn finish(&self, msg: &str) {
        self.spinner.finish_and_clear();
        self.print_line("");
        self.print_line(format!("{}{}", SPARKLE, style(msg).green().bold()));
    }
}
