//! Common test fixtures: state machine definitions and resource stubs.
use serde_json::{Value, json};
use sfn_builder::prelude::*;

#[allow(dead_code)]
pub const HELLO_WORLD_ARN: &str = "arn:aws:lambda:us-east-1:123456789012:function:HelloWorld";
#[allow(dead_code)]
pub const SUBMIT_JOB_ARN: &str = "arn:aws:lambda:REGION:ACCOUNT_ID:function:SubmitJob";
#[allow(dead_code)]
pub const CHECK_JOB_ARN: &str = "arn:aws:lambda:REGION:ACCOUNT_ID:function:CheckJob";

/// A single Task state machine.
#[allow(dead_code)]
pub fn hello_world() -> Value {
    json!({
        "Comment": "A Hello World example of the Amazon States Language using an AWS Lambda Function",
        "StartAt": "HelloWorld",
        "States": {
            "HelloWorld": {
                "Type": "Task",
                "Resource": HELLO_WORLD_ARN,
                "End": true
            }
        }
    })
}

/// A machine branching on `$.type` and `$.value` through nested choice rules.
#[allow(dead_code)]
pub fn choice_state_x() -> Value {
    json!({
        "Comment": "An example of the Amazon States Language using a choice state.",
        "StartAt": "FirstState",
        "States": {
            "FirstState": {
                "Type": "Task",
                "Resource": "arn:aws:lambda:us-east-1:123456789012:function:FUNCTION_NAME",
                "Next": "ChoiceStateX"
            },
            "ChoiceStateX": {
                "Type": "Choice",
                "Choices": [
                    {
                        "Not": {
                            "Variable": "$.type",
                            "StringEquals": "Private"
                        },
                        "Next": "Public"
                    },
                    {
                        "Variable": "$.value",
                        "NumericEquals": 0,
                        "Next": "ValueIsZero"
                    },
                    {
                        "And": [
                            {
                                "Variable": "$.value",
                                "NumericGreaterThanEquals": 20
                            },
                            {
                                "Variable": "$.value",
                                "NumericLessThan": 30
                            }
                        ],
                        "Next": "ValueInTwenties"
                    }
                ],
                "Default": "DefaultState"
            },
            "Public": {
                "Type": "Task",
                "Resource": "arn:aws:lambda:us-east-1:123456789012:function:Foo",
                "Next": "NextState"
            },
            "ValueIsZero": {
                "Type": "Task",
                "Resource": "arn:aws:lambda:us-east-1:123456789012:function:Zero",
                "Next": "NextState"
            },
            "ValueInTwenties": {
                "Type": "Task",
                "Resource": "arn:aws:lambda:us-east-1:123456789012:function:Bar",
                "Next": "NextState"
            },
            "DefaultState": {
                "Type": "Fail",
                "Error": "DefaultStateError",
                "Cause": "No Matches!"
            },
            "NextState": {
                "Type": "Task",
                "Resource": "arn:aws:lambda:us-east-1:123456789012:function:FUNCTION_NAME",
                "End": true
            }
        }
    })
}

/// Submits a job, then polls its status until it either fails or succeeds.
#[allow(dead_code)]
pub fn job_status_poller() -> Value {
    json!({
        "Comment": "An example of the Amazon States Language that runs an AWS Batch job and monitors the job until it completes.",
        "StartAt": "Submit Job",
        "States": {
            "Submit Job": {
                "Type": "Task",
                "Resource": SUBMIT_JOB_ARN,
                "ResultPath": "$.guid",
                "Next": "Wait X Seconds"
            },
            "Wait X Seconds": {
                "Type": "Wait",
                "SecondsPath": "$.wait_time",
                "Next": "Get Job Status"
            },
            "Get Job Status": {
                "Type": "Task",
                "Resource": CHECK_JOB_ARN,
                "Next": "Job Complete?",
                "InputPath": "$.guid",
                "ResultPath": "$.status"
            },
            "Job Complete?": {
                "Type": "Choice",
                "Choices": [
                    {
                        "Variable": "$.status",
                        "StringEquals": "FAILED",
                        "Next": "Job Failed"
                    },
                    {
                        "Variable": "$.status",
                        "StringEquals": "SUCCEEDED",
                        "Next": "Get Final Job Status"
                    }
                ],
                "Default": "Wait X Seconds"
            },
            "Job Failed": {
                "Type": "Fail",
                "Cause": "AWS Batch Job Failed",
                "Error": "DescribeJob returned FAILED"
            },
            "Get Final Job Status": {
                "Type": "Task",
                "Resource": CHECK_JOB_ARN,
                "InputPath": "$.guid",
                "End": true
            }
        }
    })
}

/// Resources that answer every call with the same value.
#[allow(dead_code)]
pub fn constant_resources(entries: &[(&str, Value)]) -> ResourceManager {
    let mut resources = ResourceManager::new();
    for (id, result) in entries {
        let result = result.clone();
        resources.register(*id, move |_| Ok(result.clone()));
    }
    resources
}

/// Names of the trace entries of a flat chain.
#[allow(dead_code)]
pub fn names(trace: &[Trace]) -> Vec<String> {
    trace
        .iter()
        .filter_map(|entry| match entry {
            Trace::State(name) => Some(name.clone()),
            Trace::Parallel(_) => None,
        })
        .collect()
}
