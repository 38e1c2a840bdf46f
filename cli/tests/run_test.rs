//! Integration tests for the `run` command.

mod common;

use common::{artifact, path, quill, temp_file};
use predicates::prelude::*;
use quill_core::syntax::build::*;

// ============================================================================
// Success tests with full output verification
// ============================================================================

#[test]
fn run_prints_the_result() {
    let file = artifact(vec![expr_stmt(add(int(1), mul(int(2), int(3))))]);
    quill().args(["run", path(&file)]).assert().success().stdout("7\n");
}

#[test]
fn run_prints_output_before_the_result() {
    let file = artifact(vec![
        expr_stmt(call(var("print"), vec![string("first")])),
        expr_stmt(call(var("print"), vec![int(2)])),
        expr_stmt(string("done")),
    ]);
    quill()
        .args(["run", path(&file)])
        .assert()
        .success()
        .stdout("first\n2\ndone\n");
}

#[test]
fn run_formats_arrays_and_floats() {
    let file = artifact(vec![expr_stmt(array(vec![
        float(2.0),
        string("a"),
        array(vec![]),
    ]))]);
    quill()
        .args(["run", path(&file)])
        .assert()
        .success()
        .stdout("[2.0, \"a\", []]\n");
}

#[test]
fn run_reads_stdin() {
    let engine = quill::Engine::new(Default::default(), quill::stdlib::registry());
    let program = engine
        .compile(script(vec![expr_stmt(int(5))]), &Default::default())
        .unwrap();
    quill()
        .args(["run", "-"])
        .write_stdin(program.to_bytes().unwrap())
        .assert()
        .success()
        .stdout("5\n");
}

#[test]
fn caught_exceptions_do_not_fail_the_run() {
    let file = artifact(vec![
        let_("message", string("")),
        try_catch(
            vec![throw(Some(string("oops")))],
            Some("e"),
            vec![expr_stmt(assign(var("message"), var("e")))],
        ),
        expr_stmt(var("message")),
    ]);
    quill().args(["run", path(&file)]).assert().success().stdout("oops\n");
}

// ============================================================================
// Error tests
// ============================================================================

#[test]
fn uncaught_exception_exits_with_error() {
    let file = artifact(vec![
        expr_stmt(call(var("print"), vec![string("before")])),
        throw(Some(string("boom"))),
    ]);
    quill()
        .args(["run", path(&file)])
        .assert()
        .failure()
        .code(1)
        .stdout("before\n")
        .stderr("error: boom\n");
}

#[test]
fn runtime_faults_exit_with_error() {
    let file = artifact(vec![
        let_("zero", int(0)),
        expr_stmt(div(int(1), var("zero"))),
    ]);
    quill()
        .args(["run", path(&file)])
        .assert()
        .failure()
        .stderr("error: division by zero\n");
}

#[test]
fn call_depth_is_configurable() {
    let file = artifact(vec![
        function(
            "down",
            vec![param("n", ty("int"))],
            Some(ty("int")),
            vec![ret(Some(call(var("down"), vec![add(var("n"), int(1))])))],
        ),
        expr_stmt(call(var("down"), vec![int(0)])),
    ]);
    quill()
        .args(["run", "--max-call-depth", "8", path(&file)])
        .assert()
        .failure()
        .stderr(predicate::str::contains("call depth exceeded 8"));
}

#[test]
fn garbage_is_rejected() {
    let file = temp_file(b"not a program");
    quill()
        .args(["run", path(&file)])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Artifact error"));
}

#[test]
fn missing_file_is_reported() {
    quill()
        .args(["run", "/nonexistent/program.qbc"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("/nonexistent/program.qbc"));
}

#[test]
fn verbose_logs_to_stderr() {
    let file = artifact(vec![expr_stmt(int(1))]);
    quill()
        .env_remove("RUST_LOG")
        .args(["-v", "run", path(&file)])
        .assert()
        .success()
        .stdout("1\n");
}
