use crate::model::{NewAssignment, NewAttendance, NewClass, NewGrade, NewStudent};
use crate::repo::Repository;
use anyhow::Context;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Demo data file. Grades and attendance refer to students and assignments by
/// the ids a fresh store hands out (1, 2, 3...), in file order.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SeedData {
    pub classes: Vec<NewClass>,
    pub students: Vec<NewStudent>,
    pub assignments: Vec<NewAssignment>,
    pub grades: Vec<NewGrade>,
    pub attendance: Vec<NewAttendance>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedSummary {
    pub classes: usize,
    pub students: usize,
    pub assignments: usize,
    pub grades: usize,
    pub attendance: usize,
}

pub fn read_seed(path: &Path) -> anyhow::Result<SeedData> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read seed file {}", path.display()))?;
    let data: SeedData = serde_json::from_str(&text)
        .with_context(|| format!("parse seed file {}", path.display()))?;
    Ok(data)
}

/// Load seed records in dependency order. Stops at the first record the store
/// rejects.
pub fn apply_seed(repo: &dyn Repository, data: SeedData, today: NaiveDate) -> anyhow::Result<SeedSummary> {
    let mut summary = SeedSummary::default();

    for (i, c) in data.classes.into_iter().enumerate() {
        repo.class_create(c)
            .with_context(|| format!("seed class #{}", i + 1))?;
        summary.classes += 1;
    }
    for (i, s) in data.students.into_iter().enumerate() {
        repo.student_create(s)
            .with_context(|| format!("seed student #{}", i + 1))?;
        summary.students += 1;
    }
    for (i, a) in data.assignments.into_iter().enumerate() {
        repo.assignment_create(a, today)
            .with_context(|| format!("seed assignment #{}", i + 1))?;
        summary.assignments += 1;
    }
    for (i, g) in data.grades.into_iter().enumerate() {
        repo.grade_upsert(g)
            .with_context(|| format!("seed grade #{}", i + 1))?;
        summary.grades += 1;
    }
    for (i, r) in data.attendance.into_iter().enumerate() {
        repo.attendance_upsert(r)
            .with_context(|| format!("seed attendance #{}", i + 1))?;
        summary.attendance += 1;
    }

    info!(
        classes = summary.classes,
        students = summary.students,
        assignments = summary.assignments,
        grades = summary.grades,
        attendance = summary.attendance,
        "seed data loaded"
    );
    Ok(summary)
}
