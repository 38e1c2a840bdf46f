//! Error handling utilities for the CLI.

use quill::{Error, RenderConfig, render_error_to};

/// Result type for CLI commands.
pub type CliResult<T> = Result<T, Error>;

/// Render an error to stderr and exit with code 1.
///
/// Uncaught script exceptions print as `error: <message>`.
pub fn render_and_exit(error: Error, no_color: bool) -> ! {
    match &error {
        Error::Runtime(exception) => eprintln!("error: {}", exception.message),
        _ => {
            let config = RenderConfig {
                color: !no_color,
                ..Default::default()
            };
            render_error_to(&error, None, &mut std::io::stderr(), &config).ok();
        }
    }
    std::process::exit(1);
}
