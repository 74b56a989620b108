use crate::ipc::helpers::{respond, to_json, today_param, HandlerResult};
use crate::ipc::types::{AppState, Request};
use crate::repo::{AttendanceScope, Repository};
use serde_json::{json, Value};

const RECENT_STUDENTS: usize = 5;

fn dashboard_open(repo: &dyn Repository, params: &Value) -> HandlerResult {
    let today = today_param(params)?;
    let today_key = today.format("%Y-%m-%d").to_string();

    let students = repo.students_all()?;
    let recent: Vec<_> = students.iter().take(RECENT_STUDENTS).collect();
    let today_stats = repo.attendance_stats(&AttendanceScope {
        class_id: None,
        date: Some(today_key.clone()),
    })?;

    Ok(json!({
        "students": to_json(&repo.student_stats()?)?,
        "classes": to_json(&repo.class_stats()?)?,
        "assignments": to_json(&repo.assignment_stats(today)?)?,
        "grades": to_json(&repo.grade_stats()?)?,
        "attendance": to_json(&repo.attendance_stats(&AttendanceScope::default())?)?,
        "recentStudents": to_json(&recent)?,
        "today": {
            "date": today_key,
            "present": today_stats.present_count,
            "absent": today_stats.absent_count,
            "tardy": today_stats.tardy_count,
            "attendanceRate": today_stats.attendance_rate,
        },
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "dashboard.open" => Some(respond(
            &req.id,
            dashboard_open(state.repo.as_ref(), &req.params),
        )),
        _ => None,
    }
}
