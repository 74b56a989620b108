mod test_support;

use serde_json::json;
use test_support::{request, request_err, request_ok, send_line, spawn_sidecar};

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert!(health.get("version").and_then(|v| v.as_str()).is_some());
    assert_eq!(health["simulateLatency"], json!(false));

    let calls = [
        ("students.list", json!({})),
        ("students.stats", json!({})),
        ("classes.list", json!({})),
        ("classes.stats", json!({})),
        ("assignments.list", json!({})),
        ("assignments.stats", json!({ "today": "2024-01-15" })),
        ("grades.list", json!({})),
        ("grades.stats", json!({})),
        ("attendance.list", json!({})),
        ("attendance.stats", json!({})),
        ("attendance.grid", json!({ "date": "2024-01-15" })),
        ("gradebook.open", json!({})),
        ("dashboard.open", json!({ "today": "2024-01-15" })),
        ("calc.letter", json!({ "percentage": 85 })),
        ("session.reset", json!({})),
    ];
    for (i, (method, params)) in calls.into_iter().enumerate() {
        let id = format!("smoke-{}", i);
        let resp = request(&mut stdin, &mut reader, &id, method, params);
        assert_eq!(
            resp.get("ok").and_then(|v| v.as_bool()),
            Some(true),
            "{} failed: {}",
            method,
            resp
        );
    }

    let empty = request_ok(&mut stdin, &mut reader, "2", "students.list", json!({}));
    assert_eq!(empty["students"], json!([]));

    let _ = child.kill();
}

#[test]
fn unknown_methods_and_bad_lines_get_error_replies() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let error = request_err(&mut stdin, &mut reader, "1", "students.teleport", json!({}));
    assert_eq!(error["code"], "not_implemented");
    assert!(error["message"]
        .as_str()
        .unwrap_or_default()
        .contains("students.teleport"));

    let resp = send_line(&mut stdin, &mut reader, "{not json");
    assert_eq!(resp["ok"], json!(false));
    assert_eq!(resp["error"]["code"], "bad_json");

    // The loop keeps serving after a bad line.
    let error = request_err(&mut stdin, &mut reader, "2", "students.get", json!({}));
    assert_eq!(error["code"], "bad_params");
    assert_eq!(error["message"], "missing id");

    let error = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "students.get",
        json!({ "id": 42 }),
    );
    assert_eq!(error["code"], "not_found");

    let error = request_err(
        &mut stdin,
        &mut reader,
        "4",
        "students.update",
        json!({ "id": 1 }),
    );
    assert_eq!(error["code"], "bad_params");
    assert_eq!(error["message"], "missing patch");

    let _ = child.kill();
}
