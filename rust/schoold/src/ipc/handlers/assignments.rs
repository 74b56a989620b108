use crate::ipc::helpers::{
    get_required_i64, get_required_str, parse_params, parse_patch, respond, to_json, today_param,
    HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{AssignmentPatch, NewAssignment};
use crate::repo::Repository;
use serde_json::{json, Value};

fn assignments_list(repo: &dyn Repository, _params: &Value) -> HandlerResult {
    Ok(json!({ "assignments": to_json(&repo.assignments_all()?)? }))
}

fn assignments_get(repo: &dyn Repository, params: &Value) -> HandlerResult {
    let id = get_required_i64(params, "id")?;
    Ok(json!({ "assignment": to_json(&repo.assignment_by_id(id)?)? }))
}

fn assignments_by_class(repo: &dyn Repository, params: &Value) -> HandlerResult {
    let class_id = get_required_str(params, "classId")?;
    Ok(json!({ "assignments": to_json(&repo.assignments_by_class(class_id.trim())?)? }))
}

fn assignments_create(repo: &dyn Repository, params: &Value) -> HandlerResult {
    let today = today_param(params)?;
    let input: NewAssignment = parse_params(params)?;
    Ok(json!({ "assignment": to_json(&repo.assignment_create(input, today)?)? }))
}

fn assignments_update(repo: &dyn Repository, params: &Value) -> HandlerResult {
    let id = get_required_i64(params, "id")?;
    let patch: AssignmentPatch = parse_patch(params)?;
    Ok(json!({ "assignment": to_json(&repo.assignment_update(id, patch)?)? }))
}

fn assignments_delete(repo: &dyn Repository, params: &Value) -> HandlerResult {
    let id = get_required_i64(params, "id")?;
    Ok(json!({ "deleted": to_json(&repo.assignment_delete(id)?)? }))
}

fn assignments_stats(repo: &dyn Repository, params: &Value) -> HandlerResult {
    let today = today_param(params)?;
    to_json(&repo.assignment_stats(today)?)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let handler: fn(&dyn Repository, &Value) -> HandlerResult = match req.method.as_str() {
        "assignments.list" => assignments_list,
        "assignments.get" => assignments_get,
        "assignments.byClass" => assignments_by_class,
        "assignments.create" => assignments_create,
        "assignments.update" => assignments_update,
        "assignments.delete" => assignments_delete,
        "assignments.stats" => assignments_stats,
        _ => return None,
    };
    Some(respond(&req.id, handler(state.repo.as_ref(), &req.params)))
}
