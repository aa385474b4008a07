//! Status lifecycle tests against the file store.

use serde_json::json;

use harness::core::TaskId;
use harness::Error;

use crate::fixtures::{chain_features, TestProject};

fn id(s: &str) -> TaskId {
    TaskId::from(s)
}

/// Test: Dependency chain end to end
/// Given T1 and T2 depending on T1
/// When an agent works through them
/// Then T2 only becomes available after T1 completes
#[test]
fn test_chain_runs_in_dependency_order() {
    let project = TestProject::with_features(chain_features());
    let coordinator = project.coordinator();

    let next = coordinator.get_next_task(None).unwrap().unwrap();
    assert_eq!(next.id, id("T1"));

    coordinator.claim_task(&id("T1")).unwrap();
    assert_eq!(project.persisted_status("T1"), "in_progress");
    assert!(
        coordinator.get_next_task(None).unwrap().is_none(),
        "T2 must wait for T1"
    );

    coordinator
        .complete_task(&id("T1"), Some("model + migration"))
        .unwrap();
    let next = coordinator.get_next_task(None).unwrap().unwrap();
    assert_eq!(next.id, id("T2"));

    coordinator.claim_task(&id("T2")).unwrap();
    coordinator.complete_task(&id("T2"), None).unwrap();

    let report = coordinator.get_progress().unwrap();
    assert_eq!(report.percentage, 100.0);
    assert!(report.project_ready);
}

/// Test: Completion is written in the shared document format
/// Given a claimed task
/// When it completes with notes
/// Then the document carries passes, status, timestamps and notes
/// And the untouched T2 gains no fields
#[test]
fn test_completion_persists_document_fields() {
    let project = TestProject::with_features(chain_features());
    let coordinator = project.coordinator();

    coordinator.claim_task(&id("T1")).unwrap();
    coordinator.complete_task(&id("T1"), Some("done")).unwrap();

    let document = project.read_document();
    let t1 = &document["features"][0];
    assert_eq!(t1["status"], "completed");
    assert_eq!(t1["passes"], true);
    assert_eq!(t1["implementation_notes"], "done");
    assert!(t1["started_at"].is_string());
    assert!(t1["implemented_at"].is_string());
    assert_eq!(document["features"][1], chain_features()[1]);
    assert!(document["features"][1].get("passes").is_none());
}

/// Test: Failure is terminal and strands dependents
/// Given T1 and T2 depending on T1
/// When T1 fails
/// Then T2 is blocked as unsatisfiable and T1 cannot be reclaimed
#[test]
fn test_failure_is_terminal() {
    let project = TestProject::with_features(chain_features());
    let coordinator = project.coordinator();

    coordinator.claim_task(&id("T1")).unwrap();
    coordinator.fail_task(&id("T1"), "migration failed").unwrap();

    let document = project.read_document();
    assert_eq!(document["features"][0]["status"], "failed");
    assert_eq!(document["features"][0]["error_message"], "migration failed");
    assert!(document["features"][0]["failed_at"].is_string());

    assert!(matches!(
        coordinator.claim_task(&id("T1")),
        Err(Error::InvalidTransition { .. })
    ));

    let blocked = coordinator.get_blocked_tasks().unwrap();
    assert_eq!(blocked.len(), 1);
    assert_eq!(blocked[0].task.id, id("T2"));
    assert!(blocked[0].is_unsatisfiable());
}

/// Test: Claiming a task whose dependencies are open is refused
#[test]
fn test_claim_out_of_order_is_refused() {
    let project = TestProject::with_features(chain_features());
    let coordinator = project.coordinator();

    match coordinator.claim_task(&id("T2")) {
        Err(Error::DependenciesUnsatisfied { unsatisfied, .. }) => {
            assert_eq!(unsatisfied, vec![id("T1")]);
        }
        other => panic!("Expected DependenciesUnsatisfied, got {:?}", other),
    }
    assert_eq!(project.persisted_status("T2"), "pending");
}

/// Test: String status updates behave like the typed operations
#[test]
fn test_update_status_round_trip() {
    let project = TestProject::with_features(chain_features());
    let coordinator = project.coordinator();

    coordinator.update_status(&id("T1"), "in_progress", None).unwrap();
    coordinator.update_status(&id("T1"), "failed", None).unwrap();

    let document = project.read_document();
    assert_eq!(document["features"][0]["error_message"], "Task failed");
}

/// Test: Agent routing
/// Given tasks assigned to frontend and backend plus a shared task
/// When each agent asks for work
/// Then it only sees its own tasks and the shared one
#[test]
fn test_agents_receive_their_own_tasks() {
    let project = TestProject::with_features(json!([
        { "id": "UI-1", "agent_assigned": "frontend", "priority": 2 },
        { "id": "API-1", "agent_assigned": "backend", "priority": 2 },
        { "id": "DOCS", "priority": 3 }
    ]));
    let coordinator = project.coordinator();

    let frontend = coordinator.claim_next(Some("frontend")).unwrap().unwrap();
    assert_eq!(frontend.id, id("UI-1"));
    let backend = coordinator.claim_next(Some("backend")).unwrap().unwrap();
    assert_eq!(backend.id, id("API-1"));
    let frontend = coordinator.claim_next(Some("frontend")).unwrap().unwrap();
    assert_eq!(frontend.id, id("DOCS"));
    assert!(coordinator.claim_next(Some("backend")).unwrap().is_none());
}

/// Test: Missing document is reported, not created
#[test]
fn test_missing_document_is_not_found() {
    let project = TestProject::with_features(json!([]));
    std::fs::remove_file(project.feature_list()).unwrap();

    let coordinator = project.coordinator();
    assert!(matches!(
        coordinator.get_progress(),
        Err(Error::NotFound { .. })
    ));
    assert!(!project.feature_list().exists());
}

/// Test: Project config relocates the task document
#[test]
fn test_config_file_overrides_feature_list() {
    let project = TestProject::with_features(json!([]));
    let config = harness::config::Config {
        feature_list: "plan/tasks.json".into(),
        ..Default::default()
    };
    config.save(project.path()).unwrap();

    let tasks = project.path().join("plan").join("tasks.json");
    std::fs::create_dir_all(tasks.parent().unwrap()).unwrap();
    std::fs::write(&tasks, r#"{"features": [{"id": "ELSEWHERE"}]}"#).unwrap();

    let next = project.coordinator().get_next_task(None).unwrap().unwrap();
    assert_eq!(next.id, id("ELSEWHERE"));
}
