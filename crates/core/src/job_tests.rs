// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn request_builder_sets_budgets() {
    let request = JobRequest::new("do the thing", "echo")
        .with_max_steps(5)
        .with_max_tokens(1_000);

    assert_eq!(request.task, "do the thing");
    assert_eq!(request.agent, "echo");
    assert_eq!(request.max_steps, Some(5));
    assert_eq!(request.max_tokens, Some(1_000));
}

#[test]
fn request_roundtrips_through_json() {
    let request = JobRequest::new("t", "echo").with_max_steps(3);
    let json = serde_json::to_string(&request).unwrap();
    let back: JobRequest = serde_json::from_str(&json).unwrap();
    assert_eq!(back, request);
}

#[test]
fn optional_budgets_omitted_from_json() {
    let json = serde_json::to_value(JobRequest::new("t", "echo")).unwrap();
    let obj = json.as_object().unwrap();
    assert!(!obj.contains_key("max_steps"));
    assert!(!obj.contains_key("max_tokens"));
}

#[test]
fn status_uses_wire_names() {
    assert_eq!(
        serde_json::to_string(&JobStatus::Pending).unwrap(),
        "\"PENDING\""
    );
    assert_eq!(JobStatus::Success.to_string(), "SUCCESS");
}

#[test]
fn status_display_and_parse_roundtrip() {
    for status in [
        JobStatus::Pending,
        JobStatus::Running,
        JobStatus::Success,
        JobStatus::Failed,
    ] {
        let parsed: JobStatus = status.to_string().parse().unwrap();
        assert_eq!(parsed, status);
    }
    assert!("BOGUS".parse::<JobStatus>().is_err());
}
