use crate::calc;
use crate::ipc::helpers::{
    get_optional_bool, get_optional_str, get_required_i64, get_required_str, parse_params,
    parse_patch, respond, to_json, HandlerErr, HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{AttendanceKey, AttendancePatch, AttendanceRecord, NewAttendance, Student};
use crate::repo::{parse_date, AttendanceScope, MarkAllPresent, Repository};
use chrono::{Datelike, Days, NaiveDate, Weekday};
use serde_json::{json, Value};

fn key_from_params(params: &Value) -> Result<AttendanceKey, HandlerErr> {
    Ok(AttendanceKey {
        student_id: get_required_i64(params, "studentId")?,
        class_id: get_required_str(params, "classId")?,
        date: get_required_str(params, "date")?,
    })
}

fn attendance_list(repo: &dyn Repository, _params: &Value) -> HandlerResult {
    Ok(json!({ "records": to_json(&repo.attendance_all()?)? }))
}

fn attendance_get(repo: &dyn Repository, params: &Value) -> HandlerResult {
    let id = get_required_i64(params, "id")?;
    Ok(json!({ "record": to_json(&repo.attendance_by_id(id)?)? }))
}

fn attendance_by_student(repo: &dyn Repository, params: &Value) -> HandlerResult {
    let student_id = get_required_i64(params, "studentId")?;
    Ok(json!({ "records": to_json(&repo.attendance_by_student(student_id)?)? }))
}

fn attendance_by_date(repo: &dyn Repository, params: &Value) -> HandlerResult {
    let date = get_required_str(params, "date")?;
    Ok(json!({ "records": to_json(&repo.attendance_by_date(&date)?)? }))
}

fn attendance_by_class(repo: &dyn Repository, params: &Value) -> HandlerResult {
    let class_id = get_required_str(params, "classId")?;
    Ok(json!({ "records": to_json(&repo.attendance_by_class(class_id.trim())?)? }))
}

fn attendance_upsert(repo: &dyn Repository, params: &Value) -> HandlerResult {
    let input: NewAttendance = parse_params(params)?;
    let saved = repo.attendance_upsert(input)?;
    Ok(json!({
        "record": to_json(&saved.record)?,
        "created": saved.created,
    }))
}

fn attendance_update_by_id(repo: &dyn Repository, params: &Value) -> HandlerResult {
    let id = get_required_i64(params, "id")?;
    let patch: AttendancePatch = parse_patch(params)?;
    Ok(json!({ "record": to_json(&repo.attendance_update_by_id(id, patch)?)? }))
}

fn attendance_update_by_key(repo: &dyn Repository, params: &Value) -> HandlerResult {
    let key = key_from_params(params)?;
    let patch: AttendancePatch = parse_patch(params)?;
    Ok(json!({ "record": to_json(&repo.attendance_update_by_key(&key, patch)?)? }))
}

fn attendance_delete(repo: &dyn Repository, params: &Value) -> HandlerResult {
    let id = get_required_i64(params, "id")?;
    Ok(json!({ "deleted": to_json(&repo.attendance_delete(id)?)? }))
}

fn attendance_cycle(repo: &dyn Repository, params: &Value) -> HandlerResult {
    let key = key_from_params(params)?;
    Ok(json!({ "record": to_json(&repo.attendance_cycle(key)?)? }))
}

fn attendance_mark_all_present(repo: &dyn Repository, params: &Value) -> HandlerResult {
    let student_ids = match params.get("studentIds") {
        None | Some(Value::Null) => None,
        Some(v) => Some(
            serde_json::from_value::<Vec<i64>>(v.clone())
                .map_err(|_| HandlerErr::bad_params("studentIds must be a list of integers"))?,
        ),
    };
    let result = repo.attendance_mark_all_present(MarkAllPresent {
        class_id: get_required_str(params, "classId")?,
        date: get_required_str(params, "date")?,
        student_ids,
        overwrite: get_optional_bool(params, "overwrite")?.unwrap_or(false),
    })?;
    to_json(&result)
}

fn attendance_stats(repo: &dyn Repository, params: &Value) -> HandlerResult {
    let scope = AttendanceScope {
        class_id: get_optional_str(params, "classId")?,
        date: get_optional_str(params, "date")?,
    };
    to_json(&repo.attendance_stats(&scope)?)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GridView {
    Week,
    Month,
}

impl GridView {
    fn parse(raw: Option<&str>) -> Result<Self, HandlerErr> {
        match raw {
            None | Some("week") => Ok(GridView::Week),
            Some("month") => Ok(GridView::Month),
            Some(other) => Err(HandlerErr::bad_params(format!(
                "view must be week or month, got {}",
                other
            ))),
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            GridView::Week => "week",
            GridView::Month => "month",
        }
    }
}

/// Monday-to-Sunday week, or the whole calendar month, containing `date`.
fn grid_days(date: NaiveDate, view: GridView) -> Vec<NaiveDate> {
    let start = match view {
        GridView::Week => {
            let back = date.weekday().num_days_from_monday() as u64;
            date.checked_sub_days(Days::new(back)).unwrap_or(date)
        }
        GridView::Month => date.with_day(1).unwrap_or(date),
    };
    let mut days = Vec::new();
    let mut day = Some(start);
    while let Some(d) = day {
        let done = match view {
            GridView::Week => days.len() == 7,
            GridView::Month => d.month() != start.month(),
        };
        if done {
            break;
        }
        days.push(d);
        day = d.succ_opt();
    }
    days
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

fn grid_row(student: &Student, days: &[String], records: &[AttendanceRecord], empty_rate: u32) -> Value {
    let mine: Vec<&AttendanceRecord> = records
        .iter()
        .filter(|r| r.student_id == student.id)
        .collect();
    let statuses: Vec<Value> = days
        .iter()
        .map(|day| {
            mine.iter()
                .find(|r| &r.date == day)
                .map(|r| json!(r.status.as_str()))
                .unwrap_or(Value::Null)
        })
        .collect();
    let counts = calc::status_counts(mine.iter().copied());
    json!({
        "studentId": student.id,
        "name": student.display_name(),
        "studentNumber": student.student_number,
        "statuses": statuses,
        "attendanceRate": calc::attendance_rate(&counts).unwrap_or(empty_rate),
    })
}

fn attendance_grid(repo: &dyn Repository, params: &Value) -> HandlerResult {
    let raw_date = get_required_str(params, "date")?;
    let date = parse_date(&raw_date)
        .ok_or_else(|| HandlerErr::bad_params(format!("invalid date: {}", raw_date)))?;
    let view = GridView::parse(get_optional_str(params, "view")?.as_deref())?;
    let class_id = get_optional_str(params, "classId")?
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());

    let (students, records) = match class_id.as_deref() {
        Some(code) => {
            let class = repo.class_by_code(code)?;
            (
                repo.students_by_class(&class.code)?,
                repo.attendance_by_class(&class.code)?,
            )
        }
        None => (repo.students_all()?, repo.attendance_all()?),
    };

    let days = grid_days(date, view);
    let day_keys: Vec<String> = days.iter().map(|d| d.format("%Y-%m-%d").to_string()).collect();
    let empty_rate = repo.settings().empty_attendance_rate;

    let day_values: Vec<Value> = days
        .iter()
        .zip(&day_keys)
        .map(|(d, key)| {
            json!({
                "date": key,
                "weekday": d.format("%a").to_string(),
                "weekend": is_weekend(*d),
            })
        })
        .collect();
    let rows: Vec<Value> = students
        .iter()
        .map(|s| grid_row(s, &day_keys, &records, empty_rate))
        .collect();

    Ok(json!({
        "view": view.as_str(),
        "classId": class_id,
        "days": day_values,
        "rows": rows,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let handler: fn(&dyn Repository, &Value) -> HandlerResult = match req.method.as_str() {
        "attendance.list" => attendance_list,
        "attendance.get" => attendance_get,
        "attendance.byStudent" => attendance_by_student,
        "attendance.byDate" => attendance_by_date,
        "attendance.byClass" => attendance_by_class,
        "attendance.upsert" => attendance_upsert,
        "attendance.updateById" => attendance_update_by_id,
        "attendance.updateByKey" => attendance_update_by_key,
        "attendance.delete" => attendance_delete,
        "attendance.cycle" => attendance_cycle,
        "attendance.markAllPresent" => attendance_mark_all_present,
        "attendance.grid" => attendance_grid,
        "attendance.stats" => attendance_stats,
        _ => return None,
    };
    Some(respond(&req.id, handler(state.repo.as_ref(), &req.params)))
}
