//! Tests for the local runner and its resource manager.
mod common;
use common::*;
use rstest::rstest;
use serde_json::{Value, json};
use sfn_builder::prelude::*;
use sfn_builder::runner::{Provider, ProviderError};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[test]
fn test_hello_world() {
    let machine = Machine::parse(hello_world()).unwrap();
    let runner = Runner::new(constant_resources(&[(HELLO_WORLD_ARN, json!("Hello, world!"))]));

    let (last, output) = runner.run(&machine, json!({})).unwrap();
    assert_eq!(last.map(|state| state.name.as_str()), Some("HelloWorld"));
    assert_eq!(output, json!("Hello, world!"));
}

#[test]
fn test_input_passed_to_next_task() {
    let machine = Machine::parse(json!([
        {"Resource": "times_two", "ResultPath": "$.first_output"},
        {"Resource": "times_three", "InputPath": "$.first_output", "ResultPath": "$.second_output"},
        {"Resource": "validator"}
    ]))
    .unwrap();

    let mut runner = Runner::default();
    runner
        .resource_provider("times_two", |input| {
            Ok(json!(input["first_input"].as_i64().unwrap_or_default() * 2))
        })
        .resource_provider("times_three", |input| {
            Ok(json!(input.as_i64().unwrap_or_default() * 3))
        })
        .resource_provider("validator", Ok);

    let (last, output) = runner.run(&machine, json!({"first_input": 1111})).unwrap();
    assert_eq!(last.map(|state| state.name.as_str()), Some("validator"));
    assert_eq!(
        output,
        json!({"first_input": 1111, "first_output": 2222, "second_output": 6666})
    );
}

#[rstest]
#[case(json!({}), json!({"result": "ok"}))]
#[case(json!({"ResultPath": "$"}), json!({"result": "ok"}))]
#[case(json!({"ResultPath": "$.out"}), json!({"guid": "g1", "out": {"result": "ok"}}))]
#[case(json!({"ResultPath": "$.out", "OutputPath": "$.out"}), json!({"result": "ok"}))]
#[case(json!({"InputPath": "$.guid", "ResultPath": "$.guid"}), json!({"guid": {"result": "ok"}}))]
fn test_task_data_flow(#[case] paths: Value, #[case] expected: Value) {
    let mut state = json!({"Type": "Task", "Resource": "work", "End": true});
    for (key, value) in paths.as_object().unwrap() {
        state[key] = value.clone();
    }
    let machine = Machine::from_states([State::parse(state).unwrap()]).unwrap();
    let runner = Runner::new(constant_resources(&[("work", json!({"result": "ok"}))]));

    let (_, output) = runner.run(&machine, json!({"guid": "g1"})).unwrap();
    assert_eq!(output, expected);
}

#[test]
fn test_job_status_poller() {
    let machine = Machine::parse(job_status_poller()).unwrap();
    let checks = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&checks);

    let runner = Runner::builder()
        .resource_provider(SUBMIT_JOB_ARN, |_| Ok(json!("job-1")))
        .resource_provider(CHECK_JOB_ARN, move |_| {
            let status = match counter.fetch_add(1, Ordering::SeqCst) {
                0 => "RUNNING",
                _ => "SUCCEEDED",
            };
            Ok(json!(status))
        })
        .build();

    let (last, output) = runner.run(&machine, json!({"wait_time": 1})).unwrap();
    assert_eq!(last.map(|state| state.name.as_str()), Some("Get Final Job Status"));
    assert_eq!(output, json!("SUCCEEDED"));
    // Two polls plus the final status call.
    assert_eq!(checks.load(Ordering::SeqCst), 3);
}

#[test]
fn test_job_status_poller_failure() {
    let machine = Machine::parse(job_status_poller()).unwrap();
    let runner = Runner::new(constant_resources(&[
        (SUBMIT_JOB_ARN, json!("job-1")),
        (CHECK_JOB_ARN, json!("FAILED")),
    ]));

    let (last, output) = runner.run(&machine, json!({"wait_time": 1})).unwrap();
    assert_eq!(last.map(|state| state.name.as_str()), Some("Job Failed"));
    assert_eq!(output, Value::Null);
}

#[test]
fn test_choice_routes_run() {
    let machine = Machine::parse(choice_state_x()).unwrap();
    let resources = ResourceManager::new()
        .with_provider("arn:aws:lambda:us-east-1:123456789012:function:FUNCTION_NAME", Ok)
        .with_provider("arn:aws:lambda:us-east-1:123456789012:function:Bar", |mut data: Value| {
            data["visited"] = json!("Bar");
            Ok(data)
        });
    let runner = Runner::new(resources);

    let (last, output) = runner
        .run(&machine, json!({"type": "Private", "value": 25}))
        .unwrap();
    assert_eq!(last.map(|state| state.name.as_str()), Some("NextState"));
    assert_eq!(output["visited"], json!("Bar"));
}

#[test]
fn test_cycle_times_out_with_history() {
    let machine = Machine::parse(json!({
        "Comment": "ping pong",
        "StartAt": "A",
        "States": {
            "A": {"Type": "Pass", "Next": "B"},
            "B": {"Type": "Pass", "Next": "A"}
        }
    }))
    .unwrap();
    let runner = Runner::default();

    let err = runner
        .run_with_timeout(&machine, json!({}), Duration::from_millis(20))
        .unwrap_err();
    let RunError::Timeout {
        machine: name,
        elapsed,
        history,
    } = err
    else {
        panic!("expected a timeout");
    };

    assert_eq!(name, "ping pong");
    assert!(elapsed > Duration::from_millis(20));
    assert_eq!(history.len(), 10);
    for pair in history.windows(2) {
        assert_ne!(pair[0], pair[1]);
    }
    assert!(history.iter().all(|name| name == "A" || name == "B"));
}

#[test]
fn test_history_len_is_configurable() {
    let machine = Machine::parse(json!({
        "StartAt": "A",
        "States": {"A": {"Type": "Pass", "Next": "A"}}
    }))
    .unwrap();
    let runner = Runner::builder()
        .timeout(Duration::from_millis(10))
        .history_len(3)
        .build();

    let err = runner.run(&machine, json!(null)).unwrap_err();
    assert!(matches!(err, RunError::Timeout { ref history, .. } if history.len() == 3));
    assert!(err.to_string().contains("A -> A -> A"));
}

#[test]
fn test_failure_is_wrapped_with_state_context() {
    // Scalar list items are Tasks without a resource.
    let machine = Machine::parse(json!(["fetch", "store"])).unwrap();

    let err = Runner::default().run(&machine, json!({})).unwrap_err();
    let RunError::Execution {
        state,
        state_type,
        source,
    } = err
    else {
        panic!("expected an execution error");
    };
    assert_eq!(state, "fetch");
    assert_eq!(state_type, "Task");
    assert!(matches!(source, StateError::MissingResource));
}

#[test]
fn test_provider_failure_keeps_its_cause() {
    let machine = Machine::parse(json!([{"Resource": "fetch"}])).unwrap();
    let runner = Runner::builder()
        .resource_provider("fetch", |_| Err("connection refused".into()))
        .build();

    let err = runner.run(&machine, json!({})).unwrap_err();
    let RunError::Execution { source, .. } = &err else {
        panic!("expected an execution error");
    };
    let StateError::Provider { resource, source } = source else {
        panic!("expected a provider error");
    };
    assert_eq!(resource, "fetch");
    assert_eq!(source.to_string(), "connection refused");
}

#[test]
fn test_unregistered_resource() {
    let machine = Machine::parse(json!([{"Resource": "nowhere"}])).unwrap();
    let err = Runner::default().run(&machine, json!({})).unwrap_err();
    assert!(matches!(
        err,
        RunError::Execution {
            source: StateError::Resource(ResourceError::NotRegistered(ref id)),
            ..
        } if id == "nowhere"
    ));
}

#[test]
fn test_empty_machine_returns_input() {
    let machine = Machine::parse(json!([])).unwrap();
    let (last, output) = Runner::default().run(&machine, json!({"x": 1})).unwrap();
    assert!(last.is_none());
    assert_eq!(output, json!({"x": 1}));
}

#[test]
fn test_unresolved_successor_ends_run() {
    let mut machine = Machine::parse(json!([{"Type": "Pass", "Name": "a"}, {"Type": "Pass", "Name": "b"}])).unwrap();
    machine.states.remove("b");

    let (last, output) = Runner::default().run(&machine, json!(7)).unwrap();
    assert_eq!(last.map(|state| state.name.as_str()), Some("a"));
    assert_eq!(output, json!(7));
}

// --- Configuration ---

#[test]
fn test_runner_config_defaults() {
    let config = RunnerConfig::default();
    assert_eq!(config.timeout_ms, 2_000);
    assert_eq!(config.history_len, 10);
    assert_eq!(config.timeout(), Duration::from_secs(2));
    assert_eq!(Runner::default().config(), &config);
}

#[test]
fn test_runner_config_from_partial_json() {
    let config = RunnerConfig::from_json(r#"{"timeout_ms": 50}"#).unwrap();
    assert_eq!(config.timeout_ms, 50);
    assert_eq!(config.history_len, 10);

    assert!(RunnerConfig::from_json("not json").is_err());
}

#[test]
fn test_builder_options() {
    let config = RunnerConfig {
        timeout_ms: 100,
        history_len: 4,
    };
    let runner = Runner::builder()
        .config(config)
        .resources(constant_resources(&[("a", json!(1))]))
        .resource_provider("b", Ok)
        .build();

    assert_eq!(runner.config(), &config);
    assert_eq!(runner.resources().ids(), vec!["a", "b"]);

    let runner = Runner::builder().timeout(Duration::from_secs(1)).build();
    assert_eq!(runner.config().timeout_ms, 1_000);
}

#[test]
fn test_resource_manager() {
    let mut resources = ResourceManager::new();
    resources.register("echo", Ok);
    assert!(resources.contains("echo"));
    assert!(!resources.contains("other"));

    let provider = resources.resolve("echo").unwrap();
    assert_eq!(provider(json!({"a": 1})).unwrap(), json!({"a": 1}));

    let err = resources.resolve("other").err().unwrap();
    assert_eq!(err, ResourceError::NotRegistered("other".to_string()));
}

#[test]
fn test_closure_as_resolver() {
    let state = State::task("t", "double");
    let resolver = |id: &str| -> Option<Provider> {
        (id == "double").then(|| {
            Arc::new(|input: Value| -> std::result::Result<Value, ProviderError> {
                Ok(json!(input.as_i64().unwrap_or_default() * 2))
            }) as Provider
        })
    };

    let (next, output) = state.execute(json!(21), &resolver).unwrap();
    assert!(next.is_none());
    assert_eq!(output, json!(42));
}
