use crate::calc;
use crate::ipc::helpers::{
    get_optional_str, get_required_f64, get_required_i64, respond, to_json, HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{Assignment, Grade, NewGrade, Student};
use crate::repo::Repository;
use serde_json::{json, Value};

fn gradebook_row(student: &Student, assignments: &[Assignment], grades: &[Grade]) -> Value {
    let my_grades: Vec<Grade> = grades
        .iter()
        .filter(|g| g.student_id == student.id)
        .cloned()
        .collect();

    let cells: Vec<Value> = assignments
        .iter()
        .map(|a| {
            let grade = my_grades.iter().find(|g| g.assignment_id == a.id);
            json!({
                "assignmentId": a.id,
                "gradeId": grade.map(|g| g.id),
                "score": grade.map(|g| g.score),
                "cell": calc::grade_cell(grade, a.points),
            })
        })
        .collect();

    // Weighted figures only count the classes the student is enrolled in.
    let enrolled: Vec<Assignment> = assignments
        .iter()
        .filter(|a| student.class_ids.contains(&a.class_id))
        .cloned()
        .collect();
    let weights = calc::category_weights(&enrolled);
    let categories = calc::category_breakdown(&enrolled, &my_grades, &weights);
    let weighted = calc::weighted_from_breakdown(&categories);
    let letter = calc::letter_grade(weighted);

    json!({
        "student": {
            "id": student.id,
            "name": student.display_name(),
            "studentNumber": student.student_number,
        },
        "cells": cells,
        "average": calc::student_average(&my_grades, assignments),
        "weightedGrade": weighted,
        "letter": letter,
        "colorClass": letter.color_class(),
        "categories": categories,
    })
}

fn gradebook_open(repo: &dyn Repository, params: &Value) -> HandlerResult {
    let class_id = get_optional_str(params, "classId")?
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());
    let (class, students, assignments) = match class_id.as_deref() {
        Some(code) => {
            let class = repo.class_by_code(code)?;
            let students = repo.students_by_class(&class.code)?;
            let assignments = repo.assignments_by_class(&class.code)?;
            (Some(class), students, assignments)
        }
        None => (None, repo.students_all()?, repo.assignments_all()?),
    };
    let grades = repo.grades_all()?;

    let rows: Vec<Value> = students
        .iter()
        .map(|s| gradebook_row(s, &assignments, &grades))
        .collect();
    let assignment_averages: Vec<Value> = assignments
        .iter()
        .map(|a| {
            json!({
                "assignmentId": a.id,
                "average": calc::assignment_average(a, &grades),
            })
        })
        .collect();
    let weighted: Vec<u32> = rows
        .iter()
        .filter_map(|r| r.get("weightedGrade").and_then(|v| v.as_u64()))
        .map(|v| v as u32)
        .collect();

    Ok(json!({
        "class": to_json(&class)?,
        "assignments": to_json(&assignments)?,
        "rows": rows,
        "assignmentAverages": assignment_averages,
        "classAverage": calc::class_average(&weighted),
    }))
}

/// Save a score typed into a gradebook cell. Out-of-range input is clamped to
/// the assignment's points rather than rejected.
fn gradebook_set_cell(repo: &dyn Repository, params: &Value) -> HandlerResult {
    let student_id = get_required_i64(params, "studentId")?;
    let assignment_id = get_required_i64(params, "assignmentId")?;
    let entered = get_required_f64(params, "score")?;

    let assignment = repo.assignment_by_id(assignment_id)?;
    let (score, clamped) = calc::clamp_score(entered, assignment.points);
    let saved = repo.grade_upsert(NewGrade {
        student_id,
        assignment_id,
        score,
        submitted: Some(true),
    })?;

    Ok(json!({
        "grade": to_json(&saved.record)?,
        "created": saved.created,
        "clamped": clamped,
        "cell": calc::grade_cell(Some(&saved.record), assignment.points),
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let handler: fn(&dyn Repository, &Value) -> HandlerResult = match req.method.as_str() {
        "gradebook.open" => gradebook_open,
        "gradebook.setCell" => gradebook_set_cell,
        _ => return None,
    };
    Some(respond(&req.id, handler(state.repo.as_ref(), &req.params)))
}
