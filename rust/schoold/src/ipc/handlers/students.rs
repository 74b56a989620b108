use crate::ipc::helpers::{
    get_optional_str, get_required_i64, get_required_str, parse_params, parse_patch, respond,
    to_json, HandlerErr, HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{NewStudent, StudentPatch};
use crate::repo::{Repository, StudentFilter};
use serde_json::{json, Value};

fn students_list(repo: &dyn Repository, _params: &Value) -> HandlerResult {
    Ok(json!({ "students": to_json(&repo.students_all()?)? }))
}

fn students_get(repo: &dyn Repository, params: &Value) -> HandlerResult {
    let id = get_required_i64(params, "id")?;
    Ok(json!({ "student": to_json(&repo.student_by_id(id)?)? }))
}

fn students_create(repo: &dyn Repository, params: &Value) -> HandlerResult {
    let input: NewStudent = parse_params(params)?;
    Ok(json!({ "student": to_json(&repo.student_create(input)?)? }))
}

fn students_update(repo: &dyn Repository, params: &Value) -> HandlerResult {
    let id = get_required_i64(params, "id")?;
    let patch: StudentPatch = parse_patch(params)?;
    Ok(json!({ "student": to_json(&repo.student_update(id, patch)?)? }))
}

fn students_delete(repo: &dyn Repository, params: &Value) -> HandlerResult {
    let id = get_required_i64(params, "id")?;
    Ok(json!({ "deleted": to_json(&repo.student_delete(id)?)? }))
}

fn students_by_class(repo: &dyn Repository, params: &Value) -> HandlerResult {
    let class_id = get_required_str(params, "classId")?;
    Ok(json!({ "students": to_json(&repo.students_by_class(class_id.trim())?)? }))
}

fn students_search(repo: &dyn Repository, params: &Value) -> HandlerResult {
    let query = get_optional_str(params, "query")?.unwrap_or_default();
    Ok(json!({ "students": to_json(&repo.students_search(&query)?)? }))
}

/// `"80-89"` style inclusive range on `currentGrade`.
fn parse_grade_range(raw: &str) -> Result<(u32, u32), HandlerErr> {
    let bad = || HandlerErr::bad_params(format!("gradeRange must look like 80-89, got {}", raw));
    let (min, max) = raw.split_once('-').ok_or_else(bad)?;
    let min: u32 = min.trim().parse().map_err(|_| bad())?;
    let max: u32 = max.trim().parse().map_err(|_| bad())?;
    if min > max {
        return Err(bad());
    }
    Ok((min, max))
}

fn students_filter(repo: &dyn Repository, params: &Value) -> HandlerResult {
    let grade_level = match params.get("gradeLevel") {
        None | Some(Value::Null) => None,
        Some(v) => Some(
            v.as_i64()
                .ok_or_else(|| HandlerErr::bad_params("gradeLevel must be an integer"))?,
        ),
    };
    let grade_range = match get_optional_str(params, "gradeRange")? {
        Some(raw) if !raw.trim().is_empty() => Some(parse_grade_range(&raw)?),
        _ => None,
    };
    let filter = StudentFilter {
        grade_level,
        grade_range,
    };
    Ok(json!({ "students": to_json(&repo.students_filter(&filter)?)? }))
}

fn students_stats(repo: &dyn Repository, _params: &Value) -> HandlerResult {
    to_json(&repo.student_stats()?)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let handler: fn(&dyn Repository, &Value) -> HandlerResult = match req.method.as_str() {
        "students.list" => students_list,
        "students.get" => students_get,
        "students.create" => students_create,
        "students.update" => students_update,
        "students.delete" => students_delete,
        "students.byClass" => students_by_class,
        "students.search" => students_search,
        "students.filter" => students_filter,
        "students.stats" => students_stats,
        _ => return None,
    };
    Some(respond(&req.id, handler(state.repo.as_ref(), &req.params)))
}

#[cfg(test)]
mod tests {
    use super::parse_grade_range;

    #[test]
    fn grade_range_parses_inclusive_bounds() {
        assert_eq!(parse_grade_range("80-89").ok(), Some((80, 89)));
        assert_eq!(parse_grade_range(" 0 - 59 ").ok(), Some((0, 59)));
        assert!(parse_grade_range("90").is_err());
        assert!(parse_grade_range("90-80").is_err());
        assert!(parse_grade_range("a-b").is_err());
    }
}
