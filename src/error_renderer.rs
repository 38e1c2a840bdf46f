//! Error rendering using ariadne
//!
//! Diagnostics that point into a source buffer are rendered as annotated
//! snippets; everything else is rendered as a plain message.

use crate::{Diagnostic, Error, Severity};
use ariadne::{ColorGenerator, Label, Report, ReportKind, Source};
use std::io::Write;

/// Character set for rendering error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CharSet {
    /// Use Unicode characters for rich visual output.
    #[default]
    Unicode,
    /// Use ASCII-only characters for compatibility.
    Ascii,
}

/// Configuration for error rendering.
#[derive(Debug, Clone)]
pub struct RenderConfig<'a> {
    /// Whether to use ANSI color codes in output.
    pub color: bool,
    /// The filename to display in error messages.
    /// Defaults to "<script>" if not provided.
    pub filename: Option<&'a str>,
    pub charset: CharSet,
}

impl Default for RenderConfig<'_> {
    fn default() -> Self {
        RenderConfig::default()
    }
}

impl RenderConfig<'_> {
    const fn default() -> Self {
        Self {
            color: true,
            filename: None,
            charset: CharSet::Unicode,
        }
    }
}

/// Render an error to stderr using the default config.
///
/// `source` is the text the script's spans refer to, when the host has it.
pub fn render_error(error: &Error, source: Option<&str>) {
    render_error_to(error, source, &mut std::io::stderr(), &RenderConfig::default()).ok();
}

/// Render an error to a writer with the given configuration.
///
/// # Example
/// ```
/// use quill::{Engine, EngineOptions, RenderConfig, render_error_to};
/// use quill::build::*;
///
/// let engine = Engine::new(EngineOptions::default(), quill::stdlib::registry());
/// let error = engine
///     .compile(script(vec![expr_stmt(var("missing"))]), &Default::default())
///     .unwrap_err();
///
/// let mut buf = Vec::new();
/// let config = RenderConfig { color: false, ..Default::default() };
/// render_error_to(&error, None, &mut buf, &config).unwrap();
/// assert!(String::from_utf8_lossy(&buf).contains("unknown identifier `missing`"));
/// ```
pub fn render_error_to(
    error: &Error,
    source: Option<&str>,
    writer: &mut dyn Write,
    config: &RenderConfig,
) -> std::io::Result<()> {
    match error {
        Error::Compilation { diagnostics } => {
            render_diagnostics(source, diagnostics, writer, config)
        }
        Error::Runtime(exception) => writeln!(writer, "Runtime error: {}", exception),
        Error::Api(msg) => writeln!(writer, "API error: {}", msg),
        Error::Internal(msg) => writeln!(writer, "Internal error: {}", msg),
        Error::Artifact(msg) => writeln!(writer, "Artifact error: {}", msg),
    }
}

/// Render each diagnostic in order.
pub fn render_diagnostics(
    source: Option<&str>,
    diagnostics: &[Diagnostic],
    writer: &mut dyn Write,
    config: &RenderConfig,
) -> std::io::Result<()> {
    let filename = config.filename.unwrap_or("<script>");
    for diag in diagnostics {
        match source {
            Some(source) if located(diag, source) => {
                render_snippet(source, diag, writer, config, filename)?
            }
            _ => render_plain(diag, writer)?,
        }
    }
    Ok(())
}

/// Does the diagnostic point at real text in `source`?
fn located(diag: &Diagnostic, source: &str) -> bool {
    let span = diag.span;
    span.start < span.end && span.end as usize <= source.len()
}

fn render_plain(diag: &Diagnostic, writer: &mut dyn Write) -> std::io::Result<()> {
    writeln!(writer, "{}: {}", diag.severity, diag.message)?;
    for help in &diag.help {
        writeln!(writer, "  help: {}", help)?;
    }
    Ok(())
}

fn render_snippet(
    source: &str,
    diag: &Diagnostic,
    writer: &mut dyn Write,
    config: &RenderConfig,
    filename: &str,
) -> std::io::Result<()> {
    let mut colors = ColorGenerator::new();
    colors.next(); // Skip the first color.

    let kind = match diag.severity {
        Severity::Error => ReportKind::Error,
        Severity::Warning => ReportKind::Warning,
        Severity::Info => ReportKind::Advice,
    };
    let ariadne_charset = match config.charset {
        CharSet::Unicode => ariadne::CharSet::Unicode,
        CharSet::Ascii => ariadne::CharSet::Ascii,
    };
    let ariadne_config = ariadne::Config::default()
        .with_color(config.color)
        .with_char_set(ariadne_charset);

    let range = diag.span.start as usize..diag.span.end as usize;
    let mut report = Report::build(kind, (filename, range.clone()))
        .with_message(&diag.message)
        .with_config(ariadne_config)
        .with_label(
            Label::new((filename, range))
                .with_message(&diag.message)
                .with_color(colors.next()),
        );
    for help_msg in &diag.help {
        report = report.with_help(help_msg);
    }

    report
        .finish()
        .write((filename, Source::from(source)), &mut *writer)
}
