//! kdw-diag: proxy diagnostics for the KDW router bot

use clap::Parser;
use kdw_diagnostics::{app::App, cli::Cli, error::AppError};
use std::process;

#[tokio::main]
async fn main() {
    // Report panics, but let unwinding run the cleanup guards
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        eprintln!("Application panic: {}", panic_info);
        default_hook(panic_info);
    }));

    let cli = Cli::parse();
    let use_color = cli.use_colors();

    match App::new(cli).run().await {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e.format_for_console(use_color));
            print_error_suggestions(&e);
            process::exit(e.exit_code());
        }
    }
}

/// Print helpful suggestions for common errors
fn print_error_suggestions(error: &AppError) {
    match error {
        AppError::Config(_) => {
            eprintln!();
            eprintln!("Configuration help:");
            eprintln!("  - Check your .env file format and KDW_* variables");
            eprintln!("  - Probe URLs must start with http:// or https://");
            eprintln!("  - Ports and counts must be greater than 0");
        }
        AppError::Io(_) => {
            eprintln!();
            eprintln!("Check that the config root (--config-root, KDW_CONFIG_ROOT) exists and is readable.");
        }
        _ => {}
    }
}
