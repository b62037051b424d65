//! appboot CLI entry point
//!
//! Parses the command line, runs the bootstrapper, and turns a failure into a
//! colored error report and a category-specific exit code.

use appboot_cli::cli;
use appboot_cli::core::{EXIT_GENERIC, user_friendly_error};
use clap::Parser;

#[tokio::main]
async fn main() {
    // Usage errors share the generic exit code; 2 is reserved for feed failures
    let cli = match cli::Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            std::process::exit(if e.use_stderr() {
                EXIT_GENERIC
            } else {
                0
            });
        }
    };

    // Set up colored output for Windows
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    if let Err(e) = cli.execute().await {
        let error_ctx = user_friendly_error(e);
        error_ctx.display();
        std::process::exit(error_ctx.exit_code());
    }
}
