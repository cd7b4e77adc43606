// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! End-to-end tests driving the `qjsbridge` binary

use std::path::Path;
use std::process::{Command, Output};

fn qjsbridge(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_qjsbridge"))
        .args(args)
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run qjsbridge")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn path_str(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[test]
fn test_eval_inline_code() {
    let output = qjsbridge(&["eval", "-e", "1 + 1"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).contains('2'), "{}", stdout(&output));
}

#[test]
fn test_eval_uncaught_exception_fails() {
    let output = qjsbridge(&["eval", "-e", "throw new Error('kaboom')"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("kaboom"), "{}", stderr(&output));
}

#[test]
fn test_eval_serves_async_echo() {
    let output = qjsbridge(&[
        "eval",
        "-e",
        "env.callHostAsync({ function_name: 'echo', n: 20 }).then(p => p.n + 1)",
    ]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).contains("21"), "{}", stdout(&output));
}

#[test]
fn test_compile_inspect_run_script() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("answer.js");
    let blob = dir.path().join("answer.qjsb");
    std::fs::write(&source, "var base = 40; base + 2;").unwrap();

    let output = qjsbridge(&["compile", path_str(&source), "-o", path_str(&blob)]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).contains("Compiled"));

    let output = qjsbridge(&["inspect", path_str(&blob)]);
    assert!(output.status.success(), "{}", stderr(&output));
    let text = stdout(&output);
    assert!(text.contains("script"), "{text}");
    assert!(text.contains("answer.js"), "{text}");

    let output = qjsbridge(&["run", path_str(&blob)]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).contains("42"), "{}", stdout(&output));
}

#[test]
fn test_run_async_module_export() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("main.mjs");
    let blob = dir.path().join("main.qjsb");
    std::fs::write(
        &source,
        "export async function f() {\n\
             const r = await env.callHostAsync({ function_name: 'echo', value: 882 });\n\
             return r.value + 1;\n\
         }\n",
    )
    .unwrap();

    let output = qjsbridge(&[
        "compile",
        path_str(&source),
        "-o",
        path_str(&blob),
        "--module",
        "--name",
        "main.mjs",
    ]);
    assert!(output.status.success(), "{}", stderr(&output));

    let output = qjsbridge(&["run", path_str(&blob), "--call", "f"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).contains("883"), "{}", stdout(&output));
}

#[test]
fn test_unknown_async_function_is_rejected() {
    let output = qjsbridge(&[
        "eval",
        "-e",
        "env.callHostAsync({ function_name: 'nope' })",
    ]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("unknown host function"), "{}", stderr(&output));
}

#[test]
fn test_bad_blob_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let blob = dir.path().join("garbage.qjsb");
    std::fs::write(&blob, b"definitely not bytecode").unwrap();

    let output = qjsbridge(&["inspect", path_str(&blob)]);
    assert!(!output.status.success());

    let output = qjsbridge(&["run", path_str(&blob)]);
    assert!(!output.status.success());
    assert!(!stderr(&output).is_empty());
}

#[test]
fn test_run_module_with_registered_import() {
    let dir = tempfile::tempdir().unwrap();
    let main_source = dir.path().join("main.mjs");
    let lib_source = dir.path().join("lib.mjs");
    let main_blob = dir.path().join("main.qjsb");
    let lib_blob = dir.path().join("lib.qjsb");
    std::fs::write(
        &main_source,
        "import { base } from './lib.js';\nexport function answer() { return base + 2; }\n",
    )
    .unwrap();
    std::fs::write(&lib_source, "export const base = 40;\n").unwrap();

    // The importer compiles before its dependency exists.
    let output = qjsbridge(&[
        "compile",
        path_str(&main_source),
        "-o",
        path_str(&main_blob),
        "--module",
        "--name",
        "./app/main.js",
    ]);
    assert!(output.status.success(), "{}", stderr(&output));

    let output = qjsbridge(&["inspect", path_str(&main_blob)]);
    assert!(output.status.success(), "{}", stderr(&output));
    let text = stdout(&output);
    assert!(text.contains("app/main.js"), "{text}");
    assert!(!text.contains("./app/main.js"), "{text}");

    let output = qjsbridge(&["run", path_str(&main_blob), "--call", "answer"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("app/lib.js"), "{}", stderr(&output));

    let output = qjsbridge(&[
        "compile",
        path_str(&lib_source),
        "-o",
        path_str(&lib_blob),
        "--module",
        "--name",
        "app/lib.js",
    ]);
    assert!(output.status.success(), "{}", stderr(&output));

    let output = qjsbridge(&[
        "run",
        path_str(&main_blob),
        "--register",
        path_str(&lib_blob),
        "--call",
        "answer",
    ]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).contains("42"), "{}", stdout(&output));
}
