//! Integration tests for task upsert and listing via CLI.
//!
//! These tests verify that:
//! - `lb task upsert` creates tasks and edits them in place when given --id
//! - the --tag set replaces the task's tags exactly
//! - tasks of other owners cannot be edited or shown

mod common;

use common::TestEnv;
use predicates::prelude::*;

fn upsert(env: &TestEnv, args: &[&str]) -> serde_json::Value {
    let mut full = vec!["task", "upsert"];
    full.extend_from_slice(args);
    env.json(&full)
}

// === Create ===

#[test]
fn test_task_create_json() {
    let env = TestEnv::new();

    env.lb()
        .args(["task", "upsert", "--title", "Write release notes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"id\":\"lb-"))
        .stdout(predicate::str::contains("\"title\":\"Write release notes\""))
        .stdout(predicate::str::contains("\"progress\":\"UNSTARTED\""));
}

#[test]
fn test_task_create_human() {
    let env = TestEnv::new();

    env.lb()
        .args(["task", "upsert", "--title", "Write docs", "-t", "docs", "-H"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"Write docs\""))
        .stdout(predicate::str::contains("Tags: docs"));
}

#[test]
fn test_task_create_requires_title() {
    let env = TestEnv::new();

    env.lb()
        .args(["task", "upsert", "--priority", "high"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("title"));
}

#[test]
fn test_task_rejects_unknown_priority() {
    let env = TestEnv::new();

    env.lb()
        .args(["task", "upsert", "--title", "x", "--priority", "urgent"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Priority"));
}

// === Update and tags ===

#[test]
fn test_task_tags_follow_desired_set() {
    let env = TestEnv::new();
    let task = upsert(&env, &["--title", "Refactor", "-t", "A", "-t", "B"]);
    let id = task["id"].as_str().unwrap();
    assert_eq!(task["tags"], serde_json::json!(["A", "B"]));

    let task = upsert(&env, &["--id", id, "-t", "B", "-t", "C", "--progress", "in_progress"]);
    assert_eq!(task["tags"], serde_json::json!(["B", "C"]));
    assert_eq!(task["title"], "Refactor");
    assert_eq!(task["progress"], "IN_PROGRESS");

    let task = upsert(&env, &["--id", id]);
    assert_eq!(task["tags"], serde_json::json!([]));
}

#[test]
fn test_task_in_project() {
    let env = TestEnv::new();
    let project = env.add_project("widgets");
    upsert(&env, &["--title", "in project", "--project", &project]);
    upsert(&env, &["--title", "loose"]);

    let all = env.json(&["task", "list"]);
    assert_eq!(all["count"], 2);
    let scoped = env.json(&["task", "list", "--project", &project]);
    assert_eq!(scoped["count"], 1);
    assert_eq!(scoped["tasks"][0]["title"], "in project");
}

#[test]
fn test_task_in_foreign_project_is_rejected() {
    let env = TestEnv::new();
    let project = env.add_project("widgets");

    env.lb_as("bob")
        .args(["task", "upsert", "--title", "sneaky", "--project", &project])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

// === Ownership ===

#[test]
fn test_other_owner_cannot_edit_task() {
    let env = TestEnv::new();
    let task = upsert(&env, &["--title", "mine"]);
    let id = task["id"].as_str().unwrap();

    env.lb_as("bob")
        .args(["task", "upsert", "--id", id, "--title", "theirs"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unauthorized"));

    env.lb_as("bob")
        .args(["task", "show", id])
        .assert()
        .failure();

    let shown = env.json(&["task", "show", id]);
    assert_eq!(shown["title"], "mine");
}

#[test]
fn test_task_list_human_empty() {
    let env = TestEnv::new();

    env.lb()
        .args(["task", "list", "-H"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No tasks found."));
}
