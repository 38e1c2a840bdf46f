//! Shared test utilities for CLI integration tests.

#![allow(dead_code)]

use assert_cmd::Command;
use quill::{Engine, EngineOptions, stdlib};
use quill_core::syntax::Stmt;
use quill_core::syntax::build::script;
use std::io::Write;

/// Create a new command for the quill binary.
pub fn quill() -> Command {
    Command::new(env!("CARGO_BIN_EXE_quill"))
}

/// Create a temporary file with the given bytes.
pub fn temp_file(content: &[u8]) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".qbc")
        .tempfile()
        .unwrap();
    file.write_all(content).unwrap();
    file
}

/// Compile `stmts` with the standard library and write the artifact to a
/// temporary file.
pub fn artifact(stmts: Vec<Stmt>) -> tempfile::NamedTempFile {
    let engine = Engine::new(EngineOptions::default(), stdlib::registry());
    let program = engine.compile(script(stmts), &Default::default()).unwrap();
    temp_file(&program.to_bytes().unwrap())
}

/// Path of a temporary file as a command argument.
pub fn path(file: &tempfile::NamedTempFile) -> &str {
    file.path().to_str().unwrap()
}
