//! Progress reporting and document round-trip tests.

use serde_json::json;

use harness::core::TaskId;
use harness::orchestration::RecommendedAction;

use crate::fixtures::{independent_features, split_features, TestProject};

/// Test: Empty project
/// Then progress is 0, not a division error
#[test]
fn test_empty_project_progress_is_zero() {
    let project = TestProject::with_features(json!([]));
    let report = project.coordinator().get_progress().unwrap();

    assert_eq!(report.total, 0);
    assert_eq!(report.percentage, 0.0);
    assert!(!report.project_ready);
}

/// Test: Percentage is monotonic
/// Given 7 independent tasks
/// When they complete one by one
/// Then the percentage never decreases and ends at exactly 100
#[test]
fn test_percentage_monotonic_to_completion() {
    let project = TestProject::with_features(independent_features(7));
    let coordinator = project.coordinator();

    let mut last = coordinator.get_progress().unwrap().percentage;
    assert_eq!(last, 0.0);
    while let Some(task) = coordinator.claim_next(None).unwrap() {
        coordinator.complete_task(&task.id, None).unwrap();
        let now = coordinator.get_progress().unwrap().percentage;
        assert!(now >= last, "Progress went backwards: {} -> {}", last, now);
        last = now;
    }

    let report = coordinator.get_progress().unwrap();
    assert_eq!(report.percentage, 100.0);
    assert_eq!(report.recommended_action, RecommendedAction::ProjectComplete);
}

/// Test: Frontend and backend work in parallel
#[test]
fn test_split_agents_recommend_parallel() {
    let project = TestProject::with_features(split_features());
    let coordinator = project.coordinator();

    assert!(coordinator.can_run_in_parallel().unwrap());
    let report = coordinator.get_progress().unwrap();
    assert_eq!(report.recommended_action, RecommendedAction::ExecuteParallel);
    assert_eq!(report.agents["frontend"].total, 1);
    assert_eq!(report.categories["api"].total, 1);

    coordinator.claim_task(&TaskId::from("UI-1")).unwrap();
    let report = coordinator.get_progress().unwrap();
    assert_eq!(report.recommended_action, RecommendedAction::ExecuteSequential);
}

/// Test: Unknown fields survive a write
/// Given a document with fields the coordinator does not model
/// When a task is claimed (a full document rewrite)
/// Then every unknown field is still present, at task and document level
#[test]
fn test_claim_preserves_unknown_fields() {
    let project = TestProject::with_document(json!({
        "project": "shop",
        "features": [
            {
                "id": "AUTH-1",
                "name": "Login form",
                "description": "Email + password",
                "test_cases": ["valid login", "bad password"],
                "acceptance_criteria": { "coverage": 80 },
                "passes": false
            },
            { "id": "AUTH-2", "dependencies": ["AUTH-1"], "template": "endpoint" }
        ],
        "parallel_execution": {
            "groups": [{ "name": "wave-1", "tasks": ["AUTH-1"] }],
            "strategy": "by-agent"
        }
    }));
    let coordinator = project.coordinator();
    coordinator.claim_task(&TaskId::from("AUTH-1")).unwrap();

    let document = project.read_document();
    assert_eq!(document["project"], "shop");
    assert_eq!(document["parallel_execution"]["strategy"], "by-agent");
    assert_eq!(document["parallel_execution"]["groups"][0]["name"], "wave-1");

    let auth1 = &document["features"][0];
    assert_eq!(auth1["name"], "Login form");
    assert_eq!(auth1["description"], "Email + password");
    assert_eq!(auth1["test_cases"][1], "bad password");
    assert_eq!(auth1["acceptance_criteria"]["coverage"], 80);
    assert_eq!(auth1["status"], "in_progress");
    assert_eq!(document["features"][1]["template"], "endpoint");

    assert_eq!(coordinator.parallel_groups().unwrap().len(), 1);
}

/// Test: Siblings of a claimed task are written back byte for byte
/// Given completed T0 with naive microsecond timestamps and T2 with a null field
/// When T1 is claimed
/// Then T0 and T2 read back exactly as they were written
#[test]
fn test_claim_leaves_sibling_tasks_byte_identical() {
    const T0: &str = r#"{"id":"T0","passes":true,"status":"completed","started_at":"2026-03-01T09:00:00.654321","implemented_at":"2026-03-01T09:30:00.123456"}"#;
    const T2: &str = r#"{"id":"T2","name":"untouched","category":null}"#;

    let project = TestProject::with_features(json!([]));
    std::fs::write(
        project.feature_list(),
        format!(r#"{{"features":[{},{{"id":"T1","estimated_complexity":"Low"}},{}]}}"#, T0, T2),
    )
    .unwrap();

    project.coordinator().claim_task(&TaskId::from("T1")).unwrap();

    let document = project.read_document();
    assert_eq!(serde_json::to_string(&document["features"][0]).unwrap(), T0);
    assert_eq!(serde_json::to_string(&document["features"][2]).unwrap(), T2);

    let t1 = &document["features"][1];
    assert_eq!(t1["status"], "in_progress");
    assert_eq!(t1["estimated_complexity"], "Low");
}

/// Test: Legacy documents that only carry `passes`
#[test]
fn test_passes_flag_counts_as_completed() {
    let project = TestProject::with_features(json!([
        { "id": "T1", "passes": true },
        { "id": "T2", "dependencies": ["T1"], "passes": false }
    ]));
    let coordinator = project.coordinator();

    let report = coordinator.get_progress().unwrap();
    assert_eq!(report.completed, 1);
    assert_eq!(report.percentage, 50.0);
    assert_eq!(
        coordinator.get_next_task(None).unwrap().unwrap().id,
        TaskId::from("T2")
    );
}

/// Test: Corrupt document is reported, never overwritten
#[test]
fn test_corrupt_document_is_left_alone() {
    let project = TestProject::with_features(json!([]));
    std::fs::write(project.feature_list(), "{ not json").unwrap();

    let coordinator = project.coordinator();
    assert!(matches!(
        coordinator.claim_next(None),
        Err(harness::Error::MalformedData(_))
    ));
    assert_eq!(
        std::fs::read_to_string(project.feature_list()).unwrap(),
        "{ not json"
    );
}
