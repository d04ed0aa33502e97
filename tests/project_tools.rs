//! `merge` and `objects` subcommands driven through the binary.

mod common;

use common::Workspace;
use serde_json::{json, Value};

fn base_project() -> Value {
    json!({
        "rows": [
            {"id": "r1", "title": "Start", "objects": [
                {"id": "o1", "title": "Sword", "isActive": true},
                {"id": "o2", "title": "Shield"}
            ]},
            {"id": "r2", "title": "Shop", "objects": []}
        ]
    })
}

fn write_json(workspace: &Workspace, rel: &str, value: &Value) {
    workspace.write(rel, &serde_json::to_string_pretty(value).unwrap());
}

fn read_json(workspace: &Workspace, rel: &str) -> Value {
    serde_json::from_str(&workspace.read(rel)).unwrap()
}

#[test]
fn merge_dry_run_then_write() {
    let workspace = Workspace::new();
    write_json(&workspace, "project-v01.json", &base_project());
    let mut patch = base_project();
    patch["rows"][0]["objects"][1]["title"] = json!("Tower Shield");
    patch["rows"][0]["objects"][0]["isActive"] = json!(false);
    write_json(&workspace, "patch.json", &patch);

    let before = workspace.read("project-v01.json");
    let output = workspace.run(&[
        "merge",
        "--project",
        "project-v01.json",
        "--patch",
        "patch.json",
    ]);
    assert!(output.status.success());
    assert_eq!(workspace.read("project-v01.json"), before);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Updated Item (o2): Shield"), "stdout: {stdout}");

    let output = workspace.run(&[
        "merge",
        "--project",
        "project-v01.json",
        "--patch",
        "patch.json",
        "--write",
    ]);
    assert!(output.status.success());
    let merged = read_json(&workspace, "project-v01.json");
    assert_eq!(merged["rows"][0]["objects"][1]["title"], "Tower Shield");
    assert_eq!(merged["rows"][0]["objects"][0]["isActive"], true);
}

#[test]
fn merge_respects_skip_objs() {
    let workspace = Workspace::new();
    write_json(&workspace, "project.json", &base_project());
    let mut patch = base_project();
    patch["rows"][0]["objects"][1]["title"] = json!("Tower Shield");
    write_json(&workspace, "patch.json", &patch);

    let output = workspace.run(&[
        "merge",
        "--project",
        "project.json",
        "--patch",
        "patch.json",
        "--skip-objs",
        "o2",
        "--write",
    ]);
    assert!(output.status.success());
    let merged = read_json(&workspace, "project.json");
    assert_eq!(merged["rows"][0]["objects"][1]["title"], "Shield");
}

#[test]
fn merge_missing_project_fails() {
    let workspace = Workspace::new();
    let output = workspace.run(&[
        "merge",
        "--project",
        "nope.json",
        "--patch",
        "patch.json",
    ]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("project file missing"));
}

#[test]
fn objects_move_between_rows() {
    let workspace = Workspace::new();
    write_json(&workspace, "project.json", &base_project());
    let output = workspace.run(&[
        "objects",
        "--project",
        "project.json",
        "--from-row",
        "r1",
        "--to-row",
        "r2",
        "--ids",
        "o2",
        "--move",
        "--write",
    ]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let project = read_json(&workspace, "project.json");
    assert_eq!(project["rows"][0]["objects"].as_array().map(Vec::len), Some(1));
    assert_eq!(project["rows"][1]["objects"][0]["id"], "o2");
}
