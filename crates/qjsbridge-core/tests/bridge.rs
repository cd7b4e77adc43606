// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Bridge integration tests
//!
//! Drives a bridge end to end the way an embedding host does: compile,
//! serialize, load, call, and settle async host calls.

use qjsbridge_core::{
    AsyncOutcome, Bridge, BridgeConfig, BridgeError, CompiledUnit, Completion, DecodeError,
    ErrorKind, ModuleStage, PrintTarget, PromiseStatus, ValueHandle, ValueKind,
};
use serde_json::json;
use std::cell::RefCell;
use std::rc::Rc;

fn bridge() -> Bridge {
    Bridge::new(BridgeConfig {
        print: PrintTarget::Buffer,
        ..BridgeConfig::default()
    })
    .unwrap()
}

fn string_of(bridge: &mut Bridge, source: &str) -> String {
    let handle = bridge.eval(source).unwrap();
    bridge.get_string(handle).unwrap()
}

fn module_blob(bridge: &Bridge, name: &str, source: &str) -> Vec<u8> {
    bridge.compile(name, source, true).unwrap().serialize()
}

// ---- Evaluation ----

#[test]
fn test_eval_arithmetic() {
    let mut bridge = bridge();
    let handle = bridge.eval("1+1").unwrap();
    assert_eq!(bridge.get_number(handle).unwrap(), 2.0);
    assert_eq!(bridge.value_kind(handle).unwrap(), ValueKind::Number);
}

#[test]
fn test_eval_completion_values() {
    let mut bridge = bridge();
    assert_eq!(string_of(&mut bridge, "42;"), "42");
    assert_eq!(string_of(&mut bridge, "print('hello');(1+2+3);"), "6");
    assert_eq!(string_of(&mut bridge, "(function () { return 15+4+3; })()"), "22");
    assert_eq!(bridge.take_output(), vec!["hello"]);
}

#[test]
fn test_print_joins_arguments() {
    let mut bridge = bridge();
    bridge.eval("print('a', 1, true, null, undefined)").unwrap();
    assert_eq!(bridge.take_output(), vec!["a 1 true null undefined"]);
    assert!(bridge.take_output().is_empty());
}

#[test]
fn test_uncaught_exception() {
    let mut bridge = bridge();
    let err = bridge.eval("throw new Error('nope')").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EvalException);
    match err {
        BridgeError::Eval(exception) => {
            assert_eq!(exception.message, "Error: nope");
            assert_eq!(exception.name.as_deref(), Some("Error"));
        }
        other => panic!("unexpected error: {other}"),
    }

    // The bridge stays usable after an exception
    assert_eq!(string_of(&mut bridge, "'still alive'"), "still alive");
}

#[test]
fn test_globals_persist_between_evaluations() {
    let mut bridge = bridge();
    bridge.eval("var counter = 1;").unwrap();
    bridge.eval("counter += 41;").unwrap();
    assert_eq!(string_of(&mut bridge, "counter"), "42");
}

#[test]
fn test_eval_drains_jobs() {
    let mut bridge = bridge();
    bridge
        .eval("globalThis.seen = 0; Promise.resolve(5).then(v => { seen = v; });")
        .unwrap();
    assert_eq!(string_of(&mut bridge, "seen"), "5");
    assert_eq!(bridge.drain().executed, 0);
}

#[test]
fn test_throwing_reaction_does_not_fail_eval() {
    let mut bridge = bridge();
    bridge
        .eval("Promise.resolve().then(() => { throw new TypeError('late'); }); globalThis.after = true;")
        .unwrap();
    assert_eq!(string_of(&mut bridge, "after"), "true");
    bridge.take_job_failures();
    assert!(bridge.take_job_failures().is_empty());
}

// ---- Bytecode ----

#[test]
fn test_round_trip_matches_source_evaluation() {
    let sources = [
        "1 + 1",
        "'con' + 'cat'",
        "[1, 2, 3].map(x => x * 2).join(',')",
        "JSON.stringify({ a: [1, { b: null }] })",
        "(function fib(n) { return n < 2 ? n : fib(n - 1) + fib(n - 2); })(15)",
    ];

    for source in sources {
        let mut direct = bridge();
        let expected = string_of(&mut direct, source);

        let mut restored = bridge();
        let blob = restored.compile("roundtrip.js", source, false).unwrap().serialize();
        let unit = CompiledUnit::deserialize(&blob).unwrap();
        let handle = restored.evaluate(&unit).unwrap();
        assert_eq!(restored.get_string(handle).unwrap(), expected, "{source}");
    }
}

#[test]
fn test_eval_bytecode_script() {
    let mut bridge = bridge();
    let blob = bridge.compile("answer.js", "6 * 7", false).unwrap().serialize();
    let handle = bridge.eval_bytecode(&blob).unwrap();
    assert_eq!(bridge.get_string(handle).unwrap(), "42");
}

#[test]
fn test_compile_does_not_execute() {
    let mut bridge = bridge();
    bridge
        .compile("effect.js", "globalThis.touched = true;", false)
        .unwrap();
    assert_eq!(string_of(&mut bridge, "typeof touched"), "undefined");
}

#[test]
fn test_compile_error() {
    let bridge = bridge();
    let err = bridge.compile("broken.js", "function (", false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Compile);
    match err {
        BridgeError::Compile { filename, message } => {
            assert_eq!(filename, "broken.js");
            assert!(message.contains("SyntaxError"), "{message}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_corrupt_blobs_are_rejected() {
    let mut bridge = bridge();
    let blob = bridge.compile("answer.js", "6 * 7", false).unwrap().serialize();

    // Flipped payload byte
    let mut corrupt = blob.clone();
    let last = corrupt.len() - 1;
    corrupt[last] ^= 0xff;
    assert!(matches!(
        bridge.eval_bytecode(&corrupt),
        Err(BridgeError::Deserialize(DecodeError::DigestMismatch))
    ));

    // Truncated
    let err = bridge.eval_bytecode(&blob[..blob.len() / 2]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Deserialize);

    // Garbage
    let err = bridge.eval_bytecode(b"definitely not bytecode").unwrap_err();
    assert!(matches!(err, BridgeError::Deserialize(DecodeError::BadMagic)));

    // Empty
    let err = bridge.load_bytecode(&[]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Deserialize);
}

#[test]
fn test_evaluate_refuses_module_units() {
    let mut bridge = bridge();
    let unit = bridge.compile("mod.js", "export const x = 1;", true).unwrap();
    let err = bridge.evaluate(&unit).unwrap_err();
    assert!(matches!(
        err,
        BridgeError::Module {
            stage: ModuleStage::Evaluate,
            ..
        }
    ));
}

// ---- Modules ----

#[test]
fn test_module_function_from_bytecode() {
    let mut bridge = bridge();
    let blob = module_blob(&bridge, "answer.js", "export function f() { return 42; }");
    let namespace = bridge.load_bytecode(&blob).unwrap();
    let result = bridge.call_function(namespace, "f").unwrap();
    assert_eq!(bridge.get_number(result).unwrap(), 42.0);
    assert_eq!(bridge.loaded_modules(), vec!["answer.js"]);
}

#[test]
fn test_module_loaded_twice_runs_once() {
    let mut bridge = bridge();
    bridge.eval("globalThis.bumps = 0;").unwrap();
    let blob = module_blob(
        &bridge,
        "counter.js",
        "globalThis.bumps += 1; export const token = {};",
    );

    let first = bridge.load_bytecode(&blob).unwrap();
    let second = bridge.load_bytecode(&blob).unwrap();
    assert_eq!(string_of(&mut bridge, "bumps"), "1");

    // Same namespace object
    let global = bridge.global_object().unwrap();
    bridge.eval("globalThis.same = (a, b) => a === b;").unwrap();
    let a = bridge.get_property(first, "token").unwrap();
    let b = bridge.get_property(second, "token").unwrap();
    let same = bridge.call_function_with(global, "same", &[a, b]).unwrap();
    assert_eq!(bridge.get_string(same).unwrap(), "true");
}

#[test]
fn test_async_module_function() {
    let mut bridge = bridge();
    let blob = module_blob(
        &bridge,
        "async.js",
        "export async function compute() { return 880 + await Promise.resolve(3); }",
    );
    let namespace = bridge.load_bytecode(&blob).unwrap();
    let promise = bridge.call_function(namespace, "compute").unwrap();
    assert_eq!(bridge.promise_state(promise).unwrap(), PromiseStatus::Fulfilled);
    let result = bridge.get_promise_result(promise).unwrap();
    assert_eq!(bridge.get_number(result).unwrap(), 883.0);
}

#[test]
fn test_module_top_level_throw() {
    let mut bridge = bridge();
    let blob = module_blob(&bridge, "throws.js", "throw new Error('at load');");
    let err = bridge.load_bytecode(&blob).unwrap_err();
    match err {
        BridgeError::Module { module, stage, reason } => {
            assert_eq!(module, "throws.js");
            assert_eq!(stage, ModuleStage::Evaluate);
            assert!(reason.contains("at load"), "{reason}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_load_bytecode_refuses_scripts() {
    let mut bridge = bridge();
    let blob = bridge.compile("plain.js", "1", false).unwrap().serialize();
    assert_eq!(bridge.load_bytecode(&blob).unwrap_err().kind(), ErrorKind::Module);
}

#[test]
fn test_registered_module_is_importable() {
    let mut bridge = bridge();
    let lib = module_blob(&bridge, "lib/math.js", "export const double = x => x * 2;");
    assert_eq!(bridge.register_module(&lib).unwrap(), "lib/math.js");

    let main = module_blob(
        &bridge,
        "lib/main.js",
        "import { double } from './math.js'; export const answer = double(21);",
    );
    let namespace = bridge.load_bytecode(&main).unwrap();
    let answer = bridge.get_property(namespace, "answer").unwrap();
    assert_eq!(bridge.get_number(answer).unwrap(), 42.0);
}

#[test]
fn test_missing_import_fails() {
    let mut bridge = bridge();
    let main = module_blob(
        &bridge,
        "main.js",
        "import { nothing } from './missing.js'; export default nothing;",
    );
    match bridge.load_bytecode(&main).unwrap_err() {
        BridgeError::Module { module, stage, reason } => {
            assert_eq!(module, "main.js");
            assert_eq!(stage, ModuleStage::Resolve);
            assert!(reason.contains("missing.js"), "{reason}");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(bridge.loaded_modules().is_empty());
}

#[test]
fn test_load_succeeds_once_missing_import_is_registered() {
    let mut bridge = bridge();
    let main = module_blob(
        &bridge,
        "main.js",
        "import { base } from './dep.js'; export const answer = () => base + 2;",
    );
    let dep = module_blob(&bridge, "dep.js", "export const base = 40;");

    let err = bridge.load_bytecode(&main).unwrap_err();
    assert!(err.to_string().contains("dep.js"), "{err}");

    bridge.register_module(&dep).unwrap();
    let namespace = bridge.load_bytecode(&main).unwrap();
    let result = bridge.call_function(namespace, "answer").unwrap();
    assert_eq!(bridge.get_number(result).unwrap(), 42.0);
    assert_eq!(bridge.loaded_modules(), vec!["dep.js", "main.js"]);
}

#[test]
fn test_import_compiled_in_another_bridge() {
    let compiler = bridge();
    let lib = module_blob(
        &compiler,
        "lib/math.js",
        "globalThis.libRuns = (globalThis.libRuns || 0) + 1; export const double = x => x * 2;",
    );
    let main = module_blob(
        &compiler,
        "lib/main.js",
        "import { double } from './math.js'; export const answer = double(21);",
    );
    drop(compiler);

    let mut bridge = bridge();
    bridge.register_module(&lib).unwrap();
    let namespace = bridge.load_bytecode(&main).unwrap();
    let answer = bridge.get_property(namespace, "answer").unwrap();
    assert_eq!(bridge.get_number(answer).unwrap(), 42.0);

    // The imported module is the one loading it by name returns.
    let math = bridge.load_bytecode(&lib).unwrap();
    let double = bridge.call_function_with(math, "double", &[answer]).unwrap();
    assert_eq!(bridge.get_number(double).unwrap(), 84.0);
    assert_eq!(string_of(&mut bridge, "libRuns"), "1");
    assert_eq!(bridge.loaded_modules(), vec!["lib/main.js", "lib/math.js"]);
}

#[test]
fn test_relative_unit_names_load_under_their_own_identity() {
    let mut bridge = bridge();
    let unit = bridge
        .compile("./answer.js", "export function f() { return 42; }", true)
        .unwrap();
    assert_eq!(unit.name(), "answer.js");
    let namespace = bridge.load_bytecode(&unit.serialize()).unwrap();
    let result = bridge.call_function(namespace, "f").unwrap();
    assert_eq!(bridge.get_number(result).unwrap(), 42.0);

    let unit = bridge
        .compile("../shared/util.js", "export const name = 'util';", true)
        .unwrap();
    assert_eq!(unit.name(), "shared/util.js");
    let namespace = bridge.load_bytecode(&unit.serialize()).unwrap();
    let name = bridge.get_property(namespace, "name").unwrap();
    assert_eq!(bridge.get_string(name).unwrap(), "util");

    assert_eq!(bridge.loaded_modules(), vec!["answer.js", "shared/util.js"]);
}

#[test]
fn test_unfinished_module_load_resumes_without_rerunning() {
    let mut bridge = bridge();
    bridge.eval("globalThis.runs = 0;").unwrap();
    let blob = module_blob(
        &bridge,
        "settings.js",
        "globalThis.runs += 1;
         export const value = await env.callHostAsync({ function_name: 'settings' });",
    );

    match bridge.load_bytecode(&blob).unwrap_err() {
        BridgeError::Module { stage, reason, .. } => {
            assert_eq!(stage, ModuleStage::Resolve);
            assert!(reason.contains("not finished"), "{reason}");
        }
        other => panic!("unexpected error: {other}"),
    }
    let requests = bridge.take_async_requests();
    assert_eq!(requests.len(), 1);
    bridge
        .complete_async_call(requests[0].call_id, AsyncOutcome::ResolveJson(json!(41)))
        .unwrap();

    let namespace = bridge.load_bytecode(&blob).unwrap();
    let value = bridge.get_property(namespace, "value").unwrap();
    assert_eq!(bridge.get_number(value).unwrap(), 41.0);
    assert_eq!(string_of(&mut bridge, "runs"), "1");
    assert!(bridge.take_async_requests().is_empty());
    assert!(bridge.pending_async_calls().is_empty());
}

#[test]
fn test_evaluated_module_is_not_run_again_by_load() {
    let mut bridge = bridge();
    bridge.eval("globalThis.runs = 0;").unwrap();
    let blob = module_blob(&bridge, "once.js", "globalThis.runs += 1; export const n = 5;");

    let first = bridge.eval_bytecode(&blob).unwrap();
    let second = bridge.eval_bytecode(&blob).unwrap();
    assert_eq!(bridge.promise_state(first).unwrap(), PromiseStatus::Fulfilled);
    assert_eq!(bridge.promise_state(second).unwrap(), PromiseStatus::Fulfilled);

    let namespace = bridge.load_bytecode(&blob).unwrap();
    let n = bridge.get_property(namespace, "n").unwrap();
    assert_eq!(bridge.get_number(n).unwrap(), 5.0);
    assert_eq!(string_of(&mut bridge, "runs"), "1");
}

#[test]
fn test_module_source_name_is_taken_once() {
    let mut bridge = bridge();
    bridge
        .eval_source("./inline.js", "export const a = 1;", true)
        .unwrap();
    assert_eq!(bridge.loaded_modules(), vec!["inline.js"]);
    let err = bridge
        .eval_source("inline.js", "export const a = 2;", true)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Module);
}

#[test]
fn test_module_source_evaluation() {
    let mut bridge = bridge();
    let promise = bridge
        .eval_source("inline.js", "globalThis.fromModule = 7;", true)
        .unwrap();
    assert_eq!(bridge.value_kind(promise).unwrap(), ValueKind::Promise);
    assert_eq!(string_of(&mut bridge, "fromModule"), "7");
    assert!(bridge.loaded_modules().contains(&"inline.js".to_string()));
}

#[test]
fn test_eval_bytecode_module_returns_evaluation_promise() {
    let mut bridge = bridge();
    let blob = module_blob(&bridge, "side.js", "globalThis.sideEffect = 'ran';");
    let promise = bridge.eval_bytecode(&blob).unwrap();
    assert_eq!(bridge.value_kind(promise).unwrap(), ValueKind::Promise);
    assert_eq!(string_of(&mut bridge, "sideEffect"), "ran");
}

// ---- Calls and values ----

#[test]
fn test_call_missing_function() {
    let mut bridge = bridge();
    let global = bridge.global_object().unwrap();
    let err = bridge.call_function(global, "doesNotExist").unwrap_err();
    assert!(matches!(err, BridgeError::TypeError(_)), "{err}");
}

#[test]
fn test_call_with_this_binding() {
    let mut bridge = bridge();
    let object = bridge
        .eval("({ base: 40, add(n) { return this.base + n; } })")
        .unwrap();
    let two = bridge.new_number(2.0).unwrap();
    let result = bridge.call_function_with(object, "add", &[two]).unwrap();
    assert_eq!(bridge.get_number(result).unwrap(), 42.0);
}

#[test]
fn test_strings_and_json() {
    let mut bridge = bridge();
    let text = bridge.new_string("héllo").unwrap();
    assert_eq!(bridge.get_string(text).unwrap(), "héllo");
    assert_eq!(bridge.value_kind(text).unwrap(), ValueKind::String);

    let value = bridge
        .from_json(&json!({ "name": "sleep", "duration": 500, "tags": ["a", null] }))
        .unwrap();
    let duration = bridge.get_property(value, "duration").unwrap();
    assert_eq!(bridge.get_number(duration).unwrap(), 500.0);
    assert_eq!(
        bridge.to_json(value).unwrap(),
        json!({ "name": "sleep", "duration": 500, "tags": ["a", null] })
    );

    let err = bridge.get_number(text).unwrap_err();
    assert!(matches!(err, BridgeError::TypeError(_)));
}

#[test]
fn test_handles_are_bridge_scoped() {
    let mut first = bridge();
    let mut second = bridge();
    let handle = first.new_string("mine").unwrap();

    assert!(matches!(
        second.get_string(handle),
        Err(BridgeError::InvalidHandle(_))
    ));
    assert!(matches!(
        first.get_string(ValueHandle::NULL),
        Err(BridgeError::InvalidHandle(_))
    ));
    let _ = second.new_string("theirs").unwrap();
}

#[test]
fn test_released_slot_reuse_does_not_revive_handle() {
    let mut bridge = bridge();
    let old = bridge.new_string("old").unwrap();
    bridge.release(old).unwrap();
    let new = bridge.new_string("new").unwrap();
    assert_ne!(old, new);
    assert!(bridge.get_string(old).is_err());
    assert_eq!(bridge.get_string(new).unwrap(), "new");
}

// ---- Host functions ----

#[test]
fn test_host_function_add_one() {
    let mut bridge = bridge();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let recorder = seen.clone();
    bridge
        .register_host_function("addOne", 1, move |args: &[serde_json::Value]| -> Result<serde_json::Value, String> {
            recorder.borrow_mut().push(args.to_vec());
            let n = args[0].as_f64().ok_or("expected a number")?;
            Ok(json!(n + 1.0))
        })
        .unwrap();

    assert_eq!(string_of(&mut bridge, "env.addOne(41)"), "42");
    assert_eq!(string_of(&mut bridge, "env.addOne.length"), "1");
    assert_eq!(string_of(&mut bridge, "env.addOne.name"), "addOne");
    assert_eq!(seen.borrow()[0], vec![json!(41)]);
}

#[test]
fn test_host_function_missing_args_are_null() {
    let mut bridge = bridge();
    bridge
        .register_host_function("describe", 3, |args: &[serde_json::Value]| -> Result<serde_json::Value, String> {
            Ok(json!(serde_json::to_string(args).map_err(|e| e.to_string())?))
        })
        .unwrap();
    assert_eq!(string_of(&mut bridge, "env.describe(1)"), "[1,null,null]");
    assert_eq!(string_of(&mut bridge, "env.describe(1, 2, 3, 4)"), "[1,2,3,4]");
}

#[test]
fn test_host_function_failure_is_host_call_error() {
    let mut bridge = bridge();
    bridge
        .register_host_function("fail", 0, |_: &[serde_json::Value]| -> Result<serde_json::Value, String> {
            Err("boom".to_string())
        })
        .unwrap();

    assert_eq!(
        string_of(&mut bridge, "try { env.fail(); } catch (e) { e.name + ':' + e.message }"),
        "HostCallError:boom"
    );
    let err = bridge.eval("env.fail()").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::HostCall);
}

#[test]
fn test_host_function_overwrite() {
    let mut bridge = bridge();
    let first = bridge
        .register_host_function("version", 0, |_: &[serde_json::Value]| -> Result<serde_json::Value, String> {
            Ok(json!(1))
        })
        .unwrap();
    assert!(first.is_none());
    let previous = bridge
        .register_host_function("version", 2, |_: &[serde_json::Value]| -> Result<serde_json::Value, String> {
            Ok(json!(2))
        })
        .unwrap()
        .unwrap();
    assert_eq!(previous.arity, 0);
    assert_eq!(string_of(&mut bridge, "env.version()"), "2");
    assert_eq!(bridge.host_functions().len(), 1);
}

// ---- Async host calls ----

#[test]
fn test_async_call_resolves() {
    let mut bridge = bridge();
    let promise = bridge
        .eval(
            "globalThis.result = 'waiting';
             const p = env.callHostAsync({ function_name: 'sleep', duration: 500 });
             p.then(v => { result = 'got ' + v; });
             p",
        )
        .unwrap();

    assert_eq!(bridge.promise_state(promise).unwrap(), PromiseStatus::Pending);
    assert_eq!(string_of(&mut bridge, "result"), "waiting");

    let requests = bridge.take_async_requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.function_name(), Some("sleep"));
    assert_eq!(request.payload["duration"], json!(500));
    assert_eq!(bridge.pending_async_calls(), vec![request.call_id]);

    let completion = bridge
        .complete_async_call(request.call_id, AsyncOutcome::ResolveJson(json!("done")))
        .unwrap();
    assert_eq!(completion, Completion::Resolved);
    assert_eq!(string_of(&mut bridge, "result"), "got done");
    assert!(bridge.pending_async_calls().is_empty());

    let value = bridge.await_promise(promise).unwrap();
    assert_eq!(bridge.get_string(value).unwrap(), "done");
}

#[test]
fn test_async_call_resolves_with_handle() {
    let mut bridge = bridge();
    let promise = bridge.eval("env.callHostAsync({ function_name: 'fetch' })").unwrap();
    let call_id = bridge.take_async_requests()[0].call_id;

    let value = bridge.from_json(&json!({ "status": 200 })).unwrap();
    bridge
        .complete_async_call(call_id, AsyncOutcome::Resolve(value))
        .unwrap();
    let result = bridge.await_promise(promise).unwrap();
    let status = bridge.get_property(result, "status").unwrap();
    assert_eq!(bridge.get_number(status).unwrap(), 200.0);
}

#[test]
fn test_async_call_rejects() {
    let mut bridge = bridge();
    let promise = bridge
        .eval(
            "globalThis.result = 'waiting';
             const p = env.callHostAsync({ function_name: 'sleep' });
             p.catch(e => { result = e.name + ':' + e.message; });
             p",
        )
        .unwrap();
    let call_id = bridge.take_async_requests()[0].call_id;

    let completion = bridge
        .complete_async_call(call_id, AsyncOutcome::Reject("boom".to_string()))
        .unwrap();
    assert_eq!(completion, Completion::Rejected);
    assert_eq!(string_of(&mut bridge, "result"), "HostCallError:boom");

    assert_eq!(bridge.promise_state(promise).unwrap(), PromiseStatus::Rejected);
    let err = bridge.await_promise(promise).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::HostCall);
}

#[test]
fn test_double_and_unknown_completion() {
    let mut bridge = bridge();
    bridge.eval("env.callHostAsync({ function_name: 'once' })").unwrap();
    let call_id = bridge.take_async_requests()[0].call_id;

    let outcome = || AsyncOutcome::ResolveJson(json!(1));
    assert_eq!(
        bridge.complete_async_call(call_id, outcome()).unwrap(),
        Completion::Resolved
    );
    assert_eq!(
        bridge.complete_async_call(call_id, outcome()).unwrap(),
        Completion::AlreadySettled
    );
    assert_eq!(
        bridge
            .complete_async_call(qjsbridge_core::AsyncCallId::from_raw(999), outcome())
            .unwrap(),
        Completion::Unknown
    );
}

#[test]
fn test_invalid_resolve_handle_keeps_call_pending() {
    let mut bridge = bridge();
    bridge.eval("env.callHostAsync({})").unwrap();
    let call_id = bridge.take_async_requests()[0].call_id;

    let err = bridge
        .complete_async_call(call_id, AsyncOutcome::Resolve(ValueHandle::NULL))
        .unwrap_err();
    assert!(matches!(err, BridgeError::InvalidHandle(_)));
    assert_eq!(bridge.pending_async_calls(), vec![call_id]);
}

#[test]
fn test_async_call_ids_are_unique() {
    let mut bridge = bridge();
    bridge
        .eval("for (let i = 0; i < 3; i++) env.callHostAsync({ function_name: 'n', i });")
        .unwrap();
    let requests = bridge.take_async_requests();
    let mut ids: Vec<_> = requests.iter().map(|r| r.call_id).collect();
    ids.dedup();
    assert_eq!(ids.len(), 3);
}

#[test]
fn test_custom_dispatcher() {
    let mut bridge = bridge();
    let routed = Rc::new(RefCell::new(Vec::new()));
    let sink = routed.clone();
    bridge.set_async_dispatcher(move |request: qjsbridge_core::AsyncRequest| {
        sink.borrow_mut()
            .push(request.function_name().unwrap_or_default().to_string());
    });

    bridge.eval("env.callHostAsync({ function_name: 'echo' })").unwrap();
    assert_eq!(*routed.borrow(), vec!["echo"]);
    assert!(bridge.take_async_requests().is_empty());

    bridge.clear_async_dispatcher();
    bridge.eval("env.callHostAsync({ function_name: 'queued' })").unwrap();
    assert_eq!(bridge.take_async_requests().len(), 1);
}

#[test]
fn test_async_module_awaits_host_call() {
    let mut bridge = bridge();
    let blob = module_blob(
        &bridge,
        "worker.js",
        "export async function run() {
             const v = await env.callHostAsync({ function_name: 'sleep', duration: 1 });
             return v + 1;
         }",
    );
    let namespace = bridge.load_bytecode(&blob).unwrap();
    let promise = bridge.call_function(namespace, "run").unwrap();
    assert_eq!(bridge.promise_state(promise).unwrap(), PromiseStatus::Pending);
    assert!(matches!(
        bridge.await_promise(promise),
        Err(BridgeError::PromisePending)
    ));

    let call_id = bridge.take_async_requests()[0].call_id;
    bridge
        .complete_async_call(call_id, AsyncOutcome::ResolveJson(json!(882)))
        .unwrap();
    let result = bridge.await_promise(promise).unwrap();
    assert_eq!(bridge.get_number(result).unwrap(), 883.0);
}

// ---- Promises and shutdown ----

#[test]
fn test_promise_result_of_non_promise() {
    let mut bridge = bridge();
    let number = bridge.new_number(1.0).unwrap();
    assert!(matches!(
        bridge.get_promise_result(number),
        Err(BridgeError::TypeError(_))
    ));
}

#[test]
fn test_pending_promise_result_is_undefined() {
    let mut bridge = bridge();
    let promise = bridge.eval("new Promise(() => {})").unwrap();
    let result = bridge.get_promise_result(promise).unwrap();
    assert_eq!(bridge.value_kind(result).unwrap(), ValueKind::Undefined);
}

#[test]
fn test_shutdown_report() {
    let mut bridge = bridge();
    let _kept = bridge.new_string("kept").unwrap();
    let dropped = bridge.new_string("dropped").unwrap();
    bridge.release(dropped).unwrap();
    bridge.eval("env.callHostAsync({ function_name: 'never' })").unwrap();
    let call_id = bridge.take_async_requests()[0].call_id;

    let report = bridge.shutdown();
    // the eval result handle is live too
    assert_eq!(report.live_handles, 2);
    assert_eq!(report.abandoned_calls, vec![call_id]);
    assert!(!report.is_clean());
}

#[test]
fn test_custom_namespace() {
    let mut bridge = Bridge::new(BridgeConfig {
        namespace: "host".to_string(),
        async_entry: "invoke".to_string(),
        print: PrintTarget::Discard,
        ..BridgeConfig::default()
    })
    .unwrap();
    assert_eq!(string_of(&mut bridge, "typeof host.invoke"), "function");
    assert_eq!(string_of(&mut bridge, "typeof env"), "undefined");
}
