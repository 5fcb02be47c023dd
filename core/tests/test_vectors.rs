//! Verify composition and error normalization against JSON test vectors
//! stored in `test-vectors/`.

use plugboleto_core::{compose, interpret, ApiError, HttpResponse, ManagedParameters, QueryParameter};
use serde_json::Value;

fn pairs(value: &Value) -> Vec<QueryParameter> {
    value
        .as_array()
        .unwrap()
        .iter()
        .map(|pair| {
            let pair = pair.as_array().unwrap();
            QueryParameter::new(pair[0].as_str().unwrap(), pair[1].as_str().unwrap())
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Error normalization
// ---------------------------------------------------------------------------

#[test]
fn error_test_vectors() {
    let raw = include_str!("../../test-vectors/errors.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let status = case["status"].as_u64().unwrap() as u16;
        let response = HttpResponse::new(status, case["body"].as_str().unwrap());

        match interpret(response) {
            Err(ApiError::RemoteOperation { status: got, message }) => {
                assert_eq!(got, status, "{name}: status");
                assert_eq!(message, case["expected_message"].as_str().unwrap(), "{name}: message");
            }
            other => panic!("{name}: expected RemoteOperation, got {other:?}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Composition
// ---------------------------------------------------------------------------

#[test]
fn compose_test_vectors() {
    let raw = include_str!("../../test-vectors/compose.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let mut managed = ManagedParameters::new().company_id(case["company_id"].as_u64());
        if let Some(ids) = case["installments"].as_array() {
            let ids: Vec<u64> = ids.iter().map(|id| id.as_u64().unwrap()).collect();
            managed = managed.installments(&ids);
        }

        let composed = compose(&pairs(&case["params"]), &managed);
        assert_eq!(composed, pairs(&case["expected"]), "{name}: composed");
        assert_eq!(compose(&composed, &managed), composed, "{name}: idempotent");
    }
}
