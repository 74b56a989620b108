use crate::ipc::helpers::{
    get_optional_str, get_required_i64, get_required_str, parse_params, parse_patch, respond,
    to_json, HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{ClassPatch, NewClass};
use crate::repo::Repository;
use serde_json::{json, Value};

fn classes_list(repo: &dyn Repository, _params: &Value) -> HandlerResult {
    Ok(json!({ "classes": to_json(&repo.classes_all()?)? }))
}

/// Look a class up by `code` when given, else by numeric `id`.
fn classes_get(repo: &dyn Repository, params: &Value) -> HandlerResult {
    let class = match get_optional_str(params, "code")? {
        Some(code) => repo.class_by_code(code.trim())?,
        None => repo.class_by_id(get_required_i64(params, "id")?)?,
    };
    Ok(json!({ "class": to_json(&class)? }))
}

fn classes_create(repo: &dyn Repository, params: &Value) -> HandlerResult {
    let input: NewClass = parse_params(params)?;
    Ok(json!({ "class": to_json(&repo.class_create(input)?)? }))
}

fn classes_update(repo: &dyn Repository, params: &Value) -> HandlerResult {
    let id = get_required_i64(params, "id")?;
    let patch: ClassPatch = parse_patch(params)?;
    Ok(json!({ "class": to_json(&repo.class_update(id, patch)?)? }))
}

fn classes_delete(repo: &dyn Repository, params: &Value) -> HandlerResult {
    let id = get_required_i64(params, "id")?;
    Ok(json!({ "deleted": to_json(&repo.class_delete(id)?)? }))
}

fn classes_roster(repo: &dyn Repository, params: &Value) -> HandlerResult {
    let code = get_required_str(params, "classId")?;
    let class = repo.class_by_code(code.trim())?;
    let students = repo.students_by_class(&class.code)?;
    Ok(json!({
        "class": to_json(&class)?,
        "students": to_json(&students)?,
    }))
}

fn classes_stats(repo: &dyn Repository, _params: &Value) -> HandlerResult {
    to_json(&repo.class_stats()?)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let handler: fn(&dyn Repository, &Value) -> HandlerResult = match req.method.as_str() {
        "classes.list" => classes_list,
        "classes.get" => classes_get,
        "classes.create" => classes_create,
        "classes.update" => classes_update,
        "classes.delete" => classes_delete,
        "classes.roster" => classes_roster,
        "classes.stats" => classes_stats,
        _ => return None,
    };
    Some(respond(&req.id, handler(state.repo.as_ref(), &req.params)))
}
