//! Concurrent agent tests.
//!
//! Each thread opens its own coordinator on the same project, standing in
//! for separate agent processes sharing one document.

use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;

use harness::core::TaskId;
use harness::Error;

use crate::fixtures::{independent_features, TestProject};

const AGENTS: usize = 8;

/// Test: Claim exclusivity
/// Given one pending task
/// When 8 agents claim it at the same moment
/// Then exactly one succeeds and the rest see AlreadyClaimed
#[test]
fn test_concurrent_claims_of_one_task() {
    let project = TestProject::with_features(independent_features(1));
    let barrier = Arc::new(Barrier::new(AGENTS));

    let results: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..AGENTS)
            .map(|_| {
                let barrier = Arc::clone(&barrier);
                let project = &project;
                s.spawn(move || {
                    let coordinator = project.coordinator();
                    barrier.wait();
                    coordinator.claim_task(&TaskId::from("T1"))
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1, "Exactly one agent must win the claim");
    for result in results.iter().filter(|r| r.is_err()) {
        assert!(
            matches!(result, Err(Error::AlreadyClaimed { .. })),
            "Losers must see AlreadyClaimed, got {:?}",
            result
        );
    }
    assert_eq!(project.persisted_status("T1"), "in_progress");
}

/// Test: claim_next hands out distinct tasks
/// Given as many independent tasks as agents
/// When every agent calls claim_next concurrently
/// Then every agent gets a different task and all are in progress
#[test]
fn test_concurrent_claim_next_is_distinct() {
    let project = TestProject::with_features(independent_features(AGENTS));
    let barrier = Arc::new(Barrier::new(AGENTS));

    let claimed: Vec<Option<TaskId>> = thread::scope(|s| {
        let handles: Vec<_> = (0..AGENTS)
            .map(|_| {
                let barrier = Arc::clone(&barrier);
                let project = &project;
                s.spawn(move || {
                    let coordinator = project.coordinator();
                    barrier.wait();
                    coordinator.claim_next(None).unwrap().map(|t| t.id)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let ids: HashSet<TaskId> = claimed.into_iter().map(|c| c.unwrap()).collect();
    assert_eq!(ids.len(), AGENTS, "No task may be handed out twice");

    let report = project.coordinator().get_progress().unwrap();
    assert_eq!(report.in_progress, AGENTS);
    assert_eq!(report.pending, 0);
}

/// Test: More agents than work
/// Given 3 tasks and 8 agents
/// Then 3 agents get a task and 5 get nothing
#[test]
fn test_concurrent_claim_next_more_agents_than_tasks() {
    let project = TestProject::with_features(independent_features(3));
    let barrier = Arc::new(Barrier::new(AGENTS));

    let claimed: Vec<Option<TaskId>> = thread::scope(|s| {
        let handles: Vec<_> = (0..AGENTS)
            .map(|_| {
                let barrier = Arc::clone(&barrier);
                let project = &project;
                s.spawn(move || {
                    let coordinator = project.coordinator();
                    barrier.wait();
                    coordinator.claim_next(None).unwrap().map(|t| t.id)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(claimed.iter().filter(|c| c.is_some()).count(), 3);
    assert_eq!(claimed.iter().filter(|c| c.is_none()).count(), AGENTS - 3);
}

/// Test: Interleaved writers lose no updates
/// Given 8 independent tasks
/// When 8 agents each claim and complete their own task concurrently
/// Then the document ends fully completed
#[test]
fn test_concurrent_writers_lose_no_updates() {
    let project = TestProject::with_features(independent_features(AGENTS));

    thread::scope(|s| {
        for i in 1..=AGENTS {
            let project = &project;
            s.spawn(move || {
                let coordinator = project.coordinator();
                let id = TaskId::new(format!("T{}", i));
                coordinator.claim_task(&id).unwrap();
                coordinator.complete_task(&id, None).unwrap();
            });
        }
    });

    let report = project.coordinator().get_progress().unwrap();
    assert_eq!(report.completed, AGENTS);
    assert_eq!(report.percentage, 100.0);
}
