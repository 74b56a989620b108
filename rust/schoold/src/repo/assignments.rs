use super::{ensure_class_code, parse_date, require_date, AssignmentRepo, SqliteRepository};
use crate::calc;
use crate::error::{FieldErrors, StoreError, StoreResult};
use crate::model::{Assignment, AssignmentPatch, NewAssignment};
use chrono::NaiveDate;
use rusqlite::{OptionalExtension, Row};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentStats {
    pub total_assignments: usize,
    pub category_distribution: BTreeMap<String, usize>,
    pub average_points: i64,
    pub upcoming_assignments: usize,
}

const ASSIGNMENT_COLUMNS: &str = "id, class_code, name, category, points, due_date, weight";

fn row_to_assignment(r: &Row<'_>) -> rusqlite::Result<Assignment> {
    Ok(Assignment {
        id: r.get(0)?,
        class_id: r.get(1)?,
        name: r.get(2)?,
        category: r.get(3)?,
        points: r.get(4)?,
        due_date: r.get(5)?,
        weight: r.get(6)?,
    })
}

fn validate_assignment(a: &NewAssignment) -> StoreResult<()> {
    let mut errors = FieldErrors::new();
    errors.require("classId", &a.class_id, "Class is required");
    errors.require("name", &a.name, "Assignment name is required");
    errors.require("category", &a.category, "Category is required");
    if a.points <= 0 {
        errors.add("points", "Points must be a positive whole number");
    }
    if let Some(w) = a.weight {
        if !w.is_finite() || w < 0.0 {
            errors.add("weight", "Weight must be a non-negative number");
        }
    }
    errors.into_result("assignment validation failed")
}

impl SqliteRepository {
    fn query_assignments<P: rusqlite::Params>(
        &self,
        where_sql: &str,
        params: P,
    ) -> StoreResult<Vec<Assignment>> {
        let sql = format!(
            "SELECT {} FROM assignments {} ORDER BY id",
            ASSIGNMENT_COLUMNS, where_sql
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params, row_to_assignment)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

impl AssignmentRepo for SqliteRepository {
    fn assignments_all(&self) -> StoreResult<Vec<Assignment>> {
        self.query_assignments("", [])
    }

    fn assignment_by_id(&self, id: i64) -> StoreResult<Assignment> {
        let sql = format!("SELECT {} FROM assignments WHERE id = ?", ASSIGNMENT_COLUMNS);
        self.conn
            .query_row(&sql, [id], row_to_assignment)
            .optional()?
            .ok_or_else(|| StoreError::not_found("assignment", id))
    }

    fn assignments_by_class(&self, class_code: &str) -> StoreResult<Vec<Assignment>> {
        self.query_assignments("WHERE class_code = ?", [class_code])
    }

    fn assignment_create(&self, input: NewAssignment, today: NaiveDate) -> StoreResult<Assignment> {
        validate_assignment(&input)?;
        let class_code = input.class_id.trim().to_string();
        ensure_class_code(&self.conn, &class_code)?;
        let due_date = match input.due_date.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => require_date("dueDate", raw)?,
            _ => today.format("%Y-%m-%d").to_string(),
        };
        let weight = input
            .weight
            .unwrap_or(self.settings.default_assignment_weight);

        self.conn.execute(
            "INSERT INTO assignments(class_code, name, category, points, due_date, weight)
             VALUES(?, ?, ?, ?, ?, ?)",
            (
                &class_code,
                input.name.trim(),
                input.category.trim(),
                input.points,
                &due_date,
                weight,
            ),
        )?;
        let id = self.conn.last_insert_rowid();
        debug!(assignment_id = id, class = %class_code, "assignment created");
        self.assignment_by_id(id)
    }

    fn assignment_update(&self, id: i64, patch: AssignmentPatch) -> StoreResult<Assignment> {
        let existing = self.assignment_by_id(id)?;
        let previous_class = existing.class_id.clone();
        let merged = NewAssignment {
            class_id: patch.class_id.unwrap_or(existing.class_id),
            name: patch.name.unwrap_or(existing.name),
            category: patch.category.unwrap_or(existing.category),
            points: patch.points.unwrap_or(existing.points),
            due_date: Some(patch.due_date.unwrap_or(existing.due_date)),
            weight: Some(patch.weight.unwrap_or(existing.weight)),
        };
        validate_assignment(&merged)?;
        let class_code = merged.class_id.trim().to_string();
        ensure_class_code(&self.conn, &class_code)?;
        let due_date = require_date("dueDate", merged.due_date.as_deref().unwrap_or_default())?;

        let tx = self.conn.unchecked_transaction()?;
        let mut dropped = 0;
        if class_code != previous_class {
            // Keep grades only for students enrolled in the new class.
            dropped = tx.execute(
                "DELETE FROM grades
                 WHERE assignment_id = ?
                   AND student_id NOT IN (SELECT student_id FROM enrollments WHERE class_code = ?)",
                (id, &class_code),
            )?;
        }
        let top_score: Option<f64> = tx.query_row(
            "SELECT MAX(score) FROM grades WHERE assignment_id = ?",
            [id],
            |r| r.get(0),
        )?;
        let mut errors = FieldErrors::new();
        if let Some(top) = top_score.filter(|top| *top > merged.points as f64) {
            errors.add(
                "points",
                format!("Points cannot be below an existing score of {}", top),
            );
        }
        errors.into_result("assignment validation failed")?;
        tx.execute(
            "UPDATE assignments
             SET class_code = ?, name = ?, category = ?, points = ?, due_date = ?, weight = ?
             WHERE id = ?",
            (
                &class_code,
                merged.name.trim(),
                merged.category.trim(),
                merged.points,
                &due_date,
                merged.weight.unwrap_or(self.settings.default_assignment_weight),
                id,
            ),
        )?;
        tx.commit()?;
        debug!(assignment_id = id, dropped_grades = dropped, "assignment updated");
        self.assignment_by_id(id)
    }

    fn assignment_delete(&self, id: i64) -> StoreResult<Assignment> {
        let existing = self.assignment_by_id(id)?;
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM grades WHERE assignment_id = ?", [id])?;
        tx.execute("DELETE FROM assignments WHERE id = ?", [id])?;
        tx.commit()?;
        debug!(assignment_id = id, "assignment deleted");
        Ok(existing)
    }

    fn assignment_stats(&self, today: NaiveDate) -> StoreResult<AssignmentStats> {
        let assignments = self.assignments_all()?;
        let mut categories: BTreeMap<String, usize> = BTreeMap::new();
        for a in &assignments {
            *categories.entry(a.category.clone()).or_insert(0) += 1;
        }
        let average_points = if assignments.is_empty() {
            0
        } else {
            let total: i64 = assignments.iter().map(|a| a.points).sum();
            calc::round_half_up(total as f64 / assignments.len() as f64) as i64
        };
        let upcoming = assignments
            .iter()
            .filter(|a| parse_date(&a.due_date).map(|d| d > today).unwrap_or(false))
            .count();
        Ok(AssignmentStats {
            total_assignments: assignments.len(),
            category_distribution: categories,
            average_points,
            upcoming_assignments: upcoming,
        })
    }
}
