use crate::ipc::helpers::{
    get_required_i64, parse_params, parse_patch, respond, to_json, HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{GradeKey, GradePatch, NewGrade};
use crate::repo::Repository;
use serde_json::{json, Value};

fn grades_list(repo: &dyn Repository, _params: &Value) -> HandlerResult {
    Ok(json!({ "grades": to_json(&repo.grades_all()?)? }))
}

fn grades_get(repo: &dyn Repository, params: &Value) -> HandlerResult {
    let id = get_required_i64(params, "id")?;
    Ok(json!({ "grade": to_json(&repo.grade_by_id(id)?)? }))
}

fn grades_by_student(repo: &dyn Repository, params: &Value) -> HandlerResult {
    let student_id = get_required_i64(params, "studentId")?;
    Ok(json!({ "grades": to_json(&repo.grades_by_student(student_id)?)? }))
}

fn grades_by_assignment(repo: &dyn Repository, params: &Value) -> HandlerResult {
    let assignment_id = get_required_i64(params, "assignmentId")?;
    Ok(json!({ "grades": to_json(&repo.grades_by_assignment(assignment_id)?)? }))
}

fn grades_upsert(repo: &dyn Repository, params: &Value) -> HandlerResult {
    let input: NewGrade = parse_params(params)?;
    let saved = repo.grade_upsert(input)?;
    Ok(json!({
        "grade": to_json(&saved.record)?,
        "created": saved.created,
    }))
}

fn grades_update_by_id(repo: &dyn Repository, params: &Value) -> HandlerResult {
    let id = get_required_i64(params, "id")?;
    let patch: GradePatch = parse_patch(params)?;
    Ok(json!({ "grade": to_json(&repo.grade_update_by_id(id, patch)?)? }))
}

fn grades_update_by_key(repo: &dyn Repository, params: &Value) -> HandlerResult {
    let key = GradeKey {
        student_id: get_required_i64(params, "studentId")?,
        assignment_id: get_required_i64(params, "assignmentId")?,
    };
    let patch: GradePatch = parse_patch(params)?;
    Ok(json!({ "grade": to_json(&repo.grade_update_by_key(key, patch)?)? }))
}

fn grades_delete(repo: &dyn Repository, params: &Value) -> HandlerResult {
    let id = get_required_i64(params, "id")?;
    Ok(json!({ "deleted": to_json(&repo.grade_delete(id)?)? }))
}

fn grades_stats(repo: &dyn Repository, _params: &Value) -> HandlerResult {
    to_json(&repo.grade_stats()?)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let handler: fn(&dyn Repository, &Value) -> HandlerResult = match req.method.as_str() {
        "grades.list" => grades_list,
        "grades.get" => grades_get,
        "grades.byStudent" => grades_by_student,
        "grades.byAssignment" => grades_by_assignment,
        "grades.upsert" => grades_upsert,
        "grades.updateById" => grades_update_by_id,
        "grades.updateByKey" => grades_update_by_key,
        "grades.delete" => grades_delete,
        "grades.stats" => grades_stats,
        _ => return None,
    };
    Some(respond(&req.id, handler(state.repo.as_ref(), &req.params)))
}
