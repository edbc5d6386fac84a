//! Tests for choice rule parsing, compilation and evaluation.
mod common;
use common::*;
use rstest::rstest;
use serde_json::{Value, json};
use sfn_builder::choice::Operand;
use sfn_builder::prelude::*;

#[test]
fn test_flat_numeric_equals_operator() {
    let source = json!({
        "Variable": "$.value",
        "NumericEquals": 0,
        "Next": "ValueIsZero"
    });

    let op = Operator::parse(source.clone()).unwrap();
    assert_eq!(op.node_type(), NodeType::Operator);
    assert_eq!(op.name, OperatorName::NumericEquals);
    assert_eq!(op.value, Operand::Scalar(json!(0)));
    assert_eq!(op.variable.as_deref(), Some("$.value"));
    assert_eq!(op.next.as_deref(), Some("ValueIsZero"));
    assert_eq!(Value::Object(op.compile()), source);

    assert!(op.matches(&json!({"value": 0})).unwrap());
    assert!(!op.matches(&json!({"value": 1})).unwrap());
}

#[test]
fn test_operator_without_next() {
    let source = json!({"Variable": "$.value", "NumericEquals": 0});
    let op = Operator::parse(source.clone()).unwrap();
    assert!(op.next.is_none());
    assert_eq!(Value::Object(op.compile()), source);
}

#[test]
fn test_nested_operator() {
    let source = json!({
        "And": [
            {"Variable": "$.value", "NumericGreaterThanEquals": 20},
            {"Variable": "$.value", "NumericLessThan": 30}
        ],
        "Next": "ValueInTwenties"
    });

    let op = Operator::parse(source.clone()).unwrap();
    assert_eq!(op.name, OperatorName::And);
    assert_eq!(op.next.as_deref(), Some("ValueInTwenties"));
    let Operand::Rules(rules) = &op.value else {
        panic!("expected nested rules");
    };
    assert_eq!(rules[0].variable.as_deref(), Some("$.value"));
    assert_eq!(Value::Object(op.compile()), source);

    assert!(op.matches(&json!({"value": 20})).unwrap());
    assert!(op.matches(&json!({"value": 29})).unwrap());
    assert!(!op.matches(&json!({"value": 19})).unwrap());
    assert!(!op.matches(&json!({"value": 30})).unwrap());
}

#[rstest]
#[case(15, false)]
#[case(20, false)]
#[case(21, true)]
#[case(22, true)]
#[case(23, false)]
#[case(24, false)]
#[case(25, false)]
#[case(26, false)]
#[case(27, true)]
#[case(28, true)]
#[case(29, true)]
#[case(30, false)]
fn test_nested_ands_and_ors(#[case] value: i64, #[case] expected: bool) {
    let op = Operator::parse(json!({
        "And": [
            {"Variable": "$.value", "NumericGreaterThan": 20},
            {"Variable": "$.value", "NumericLessThan": 30},
            {
                "Or": [
                    {"Variable": "$.value", "NumericGreaterThan": 26},
                    {"Variable": "$.value", "NumericLessThan": 23}
                ]
            }
        ]
    }))
    .unwrap();
    assert_eq!(op.matches(&json!({ "value": value })).unwrap(), expected);
}

#[test]
fn test_not_negates_its_rule() {
    let op = Operator::parse(json!({
        "Not": {"Variable": "$.type", "StringEquals": "Private"},
        "Next": "Public"
    }))
    .unwrap();
    assert!(op.matches(&json!({"type": "Public"})).unwrap());
    assert!(!op.matches(&json!({"type": "Private"})).unwrap());
}

#[test]
fn test_or_short_circuits_in_order() {
    // The second rule would fail on a missing variable if it were evaluated.
    let op = Operator::or(vec![
        Operator::compare(OperatorName::BooleanEquals, "$.flag", true),
        Operator::compare(OperatorName::NumericEquals, "$.missing", 1),
    ]);
    assert!(op.matches(&json!({"flag": true})).unwrap());
    assert!(op.matches(&json!({"flag": false})).is_err());
}

#[test]
fn test_and_short_circuits_in_order() {
    let op = Operator::and(vec![
        Operator::compare(OperatorName::StringEquals, "$.kind", "a"),
        Operator::compare(OperatorName::NumericEquals, "$.missing", 1),
    ]);
    assert!(!op.matches(&json!({"kind": "b"})).unwrap());
}

#[test]
fn test_built_rules_compile_like_parsed_rules() {
    let built = Operator::not(Operator::compare(OperatorName::StringEquals, "$.type", "Private")).with_next("Public");
    let parsed = Operator::parse(json!({
        "Not": {"Variable": "$.type", "StringEquals": "Private"},
        "Next": "Public"
    }))
    .unwrap();
    assert_eq!(built, parsed);
    assert_eq!(built.compile(), parsed.compile());
}

#[test]
fn test_missing_variable_match_is_a_path_error() {
    let op = Operator::compare(OperatorName::NumericEquals, "$.value", 0);
    let err = op.matches(&json!({"other": 0})).unwrap_err();
    assert_eq!(err, ConditionError::Path(PathError::NoMatch("$.value".to_string())));
}

#[test]
fn test_unknown_operator_is_rejected() {
    let err = Operator::parse(json!({"Variable": "$.value", "NumericAlmostEquals": 1})).unwrap_err();
    assert!(matches!(err, ParseError::UnknownOperator(ref name) if name == "NumericAlmostEquals"));
}

#[test]
fn test_second_operator_key_is_rejected() {
    let err = Operator::parse(json!({
        "Variable": "$.value",
        "NumericEquals": 1,
        "NumericLessThan": 2
    }))
    .unwrap_err();
    assert!(matches!(err, ParseError::Construction { .. }));
}

#[test]
fn test_choice_rule_wraps_operator() {
    let rule = ChoiceRule::parse(json!({
        "Variable": "$.status",
        "StringEquals": "FAILED",
        "Next": "Job Failed"
    }))
    .unwrap();
    assert_eq!(rule.node_type(), NodeType::ChoiceRule);
    assert_eq!(rule.next(), Some("Job Failed"));
    assert!(rule.matches(&json!({"status": "FAILED"})).unwrap());
    assert_eq!(
        Value::Object(rule.compile()),
        json!({"Variable": "$.status", "StringEquals": "FAILED", "Next": "Job Failed"})
    );
}

#[test]
fn test_choice_rules_from_fixture() {
    let choice = State::parse(choice_state_x()["States"]["ChoiceStateX"].clone()).unwrap();
    let resources = ResourceManager::new();

    let cases = [
        (json!({"type": "Public", "value": 0}), "Public"),
        (json!({"type": "Private", "value": 0}), "ValueIsZero"),
        (json!({"type": "Private", "value": 25}), "ValueInTwenties"),
        (json!({"type": "Private", "value": 40}), "DefaultState"),
    ];
    for (input, expected) in cases {
        let (next, _) = choice.execute(input, &resources).unwrap();
        assert_eq!(next.as_deref(), Some(expected));
    }
}

// --- Operators ---

#[test]
fn test_operator_names_round_trip() {
    for op in OperatorName::COMPARISONS {
        assert_eq!(OperatorName::from_name(op.as_str()), Some(*op));
    }
    assert_eq!(OperatorName::from_name("Xor"), None);
    assert!(OperatorName::Not.is_connective());
    assert!(!OperatorName::StringEquals.is_connective());
}

#[rstest]
#[case(OperatorName::NumericGreaterThan, json!(10), json!("10.5"), true)]
#[case(OperatorName::NumericGreaterThan, json!(10), json!(10), false)]
#[case(OperatorName::NumericLessThanEquals, json!(2.5), json!(2), true)]
#[case(OperatorName::StringGreaterThan, json!("apple"), json!("banana"), true)]
#[case(OperatorName::StringLessThanEquals, json!("b"), json!("b"), true)]
#[case(OperatorName::StringEquals, json!("42"), json!(42), true)]
#[case(OperatorName::BooleanEquals, json!(true), json!("yes"), true)]
#[case(OperatorName::BooleanEquals, json!(false), json!(0), true)]
#[case(OperatorName::TimestampEquals, json!("2024-01-01T10:00:00Z"), json!("2024-01-01T12:00:00+02:00"), true)]
#[case(OperatorName::TimestampLessThan, json!("2024-01-02"), json!("2024-01-01T23:59:59"), true)]
#[case(OperatorName::TimestampGreaterThanEquals, json!("2016-03-14T01:59:00Z"), json!("2016-03-14T01:58:59.999Z"), false)]
fn test_leaf_comparisons(
    #[case] op: OperatorName,
    #[case] operand: Value,
    #[case] value: Value,
    #[case] expected: bool,
) {
    assert_eq!(op.compare(&operand, &value).unwrap(), expected);
}

#[test]
fn test_uncoercible_value_is_an_error() {
    let err = OperatorName::NumericEquals.compare(&json!(1), &json!("one")).unwrap_err();
    assert!(matches!(err, ConditionError::Coercion { operator: "NumericEquals", .. }));

    let err = OperatorName::TimestampEquals.compare(&json!("2024-01-01"), &json!("soon")).unwrap_err();
    assert!(matches!(err, ConditionError::Coercion { expected: "timestamp", .. }));
}

#[test]
fn test_mistyped_operand_is_an_error() {
    let err = OperatorName::StringEquals.compare(&json!(1), &json!("1")).unwrap_err();
    assert!(matches!(err, ConditionError::Operand { expected: "string", .. }));
}
