//! Artifact input utilities.

use std::io::Read;

use quill::{Error, Program};

/// Read raw bytes from a file path or stdin if path is "-".
pub fn read_bytes(path: &str) -> Result<Vec<u8>, Error> {
    let mut bytes = Vec::new();
    let read = if is_stdin(path) {
        std::io::stdin().read_to_end(&mut bytes).map(|_| bytes)
    } else {
        std::fs::read(path)
    };
    read.map_err(|e| Error::Api(format!("{}: {}", display_name(path), e)))
}

/// Read and decode a compiled program.
pub fn read_program(path: &str) -> Result<Program, Error> {
    let bytes = read_bytes(path)?;
    let program = Program::from_bytes(&bytes)?;
    tracing::debug!(
        artifact = display_name(path),
        instructions = program.code.len(),
        "artifact loaded"
    );
    Ok(program)
}

/// Check if the path represents stdin.
pub fn is_stdin(path: &str) -> bool {
    path == "-"
}

fn display_name(path: &str) -> &str {
    if is_stdin(path) { "<stdin>" } else { path }
}
