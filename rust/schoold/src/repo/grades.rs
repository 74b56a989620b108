use super::{ensure_student, AssignmentRepo, GradeRepo, SqliteRepository, Upserted};
use crate::calc;
use crate::error::{StoreError, StoreResult};
use crate::model::{Grade, GradeKey, GradePatch, NewGrade};
use rusqlite::{OptionalExtension, Row};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeStats {
    pub total_grades: usize,
    pub submitted_grades: usize,
    pub pending_grades: usize,
    pub average_score: i64,
}

const GRADE_COLUMNS: &str = "id, student_id, assignment_id, score, submitted";

fn row_to_grade(r: &Row<'_>) -> rusqlite::Result<Grade> {
    Ok(Grade {
        id: r.get(0)?,
        student_id: r.get(1)?,
        assignment_id: r.get(2)?,
        score: r.get(3)?,
        submitted: r.get::<_, i64>(4)? != 0,
    })
}

impl SqliteRepository {
    fn query_grades<P: rusqlite::Params>(&self, where_sql: &str, params: P) -> StoreResult<Vec<Grade>> {
        let sql = format!("SELECT {} FROM grades {} ORDER BY id", GRADE_COLUMNS, where_sql);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params, row_to_grade)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Scores live in `0..=points` of their assignment.
    fn check_score(&self, assignment_id: i64, score: f64) -> StoreResult<()> {
        let assignment = self.assignment_by_id(assignment_id)?;
        if !score.is_finite() || score < 0.0 || score > assignment.points as f64 {
            let mut fields = BTreeMap::new();
            fields.insert(
                "score".to_string(),
                format!("Score must be between 0 and {}", assignment.points),
            );
            return Err(StoreError::Validation {
                message: format!(
                    "score {} is outside 0..={} for {}",
                    score, assignment.points, assignment.name
                ),
                fields,
            });
        }
        Ok(())
    }

    fn write_grade(&self, id: i64, score: f64, submitted: bool) -> StoreResult<Grade> {
        self.conn.execute(
            "UPDATE grades SET score = ?, submitted = ? WHERE id = ?",
            (score, submitted as i64, id),
        )?;
        debug!(grade_id = id, score, submitted, "grade updated");
        self.grade_by_id(id)
    }
}

impl GradeRepo for SqliteRepository {
    fn grades_all(&self) -> StoreResult<Vec<Grade>> {
        self.query_grades("", [])
    }

    fn grade_by_id(&self, id: i64) -> StoreResult<Grade> {
        let sql = format!("SELECT {} FROM grades WHERE id = ?", GRADE_COLUMNS);
        self.conn
            .query_row(&sql, [id], row_to_grade)
            .optional()?
            .ok_or_else(|| StoreError::not_found("grade", id))
    }

    fn grade_by_key(&self, key: GradeKey) -> StoreResult<Option<Grade>> {
        let sql = format!(
            "SELECT {} FROM grades WHERE student_id = ? AND assignment_id = ?",
            GRADE_COLUMNS
        );
        Ok(self
            .conn
            .query_row(&sql, (key.student_id, key.assignment_id), row_to_grade)
            .optional()?)
    }

    fn grades_by_student(&self, student_id: i64) -> StoreResult<Vec<Grade>> {
        self.query_grades("WHERE student_id = ?", [student_id])
    }

    fn grades_by_assignment(&self, assignment_id: i64) -> StoreResult<Vec<Grade>> {
        self.query_grades("WHERE assignment_id = ?", [assignment_id])
    }

    fn grade_upsert(&self, input: NewGrade) -> StoreResult<Upserted<Grade>> {
        ensure_student(&self.conn, input.student_id)?;
        self.check_score(input.assignment_id, input.score)?;
        let submitted = input.submitted.unwrap_or(true);

        if let Some(existing) = self.grade_by_key(input.key())? {
            let record = self.write_grade(existing.id, input.score, submitted)?;
            return Ok(Upserted {
                record,
                created: false,
            });
        }

        self.conn.execute(
            "INSERT INTO grades(student_id, assignment_id, score, submitted) VALUES(?, ?, ?, ?)",
            (
                input.student_id,
                input.assignment_id,
                input.score,
                submitted as i64,
            ),
        )?;
        let id = self.conn.last_insert_rowid();
        debug!(
            grade_id = id,
            student_id = input.student_id,
            assignment_id = input.assignment_id,
            "grade recorded"
        );
        Ok(Upserted {
            record: self.grade_by_id(id)?,
            created: true,
        })
    }

    fn grade_update_by_id(&self, id: i64, patch: GradePatch) -> StoreResult<Grade> {
        let existing = self.grade_by_id(id)?;
        let score = patch.score.unwrap_or(existing.score);
        self.check_score(existing.assignment_id, score)?;
        // Touching a grade marks it submitted unless told otherwise.
        self.write_grade(id, score, patch.submitted.unwrap_or(true))
    }

    fn grade_update_by_key(&self, key: GradeKey, patch: GradePatch) -> StoreResult<Grade> {
        let existing = self.grade_by_key(key)?.ok_or_else(|| {
            StoreError::not_found(
                "grade",
                format!("student {} / assignment {}", key.student_id, key.assignment_id),
            )
        })?;
        self.grade_update_by_id(existing.id, patch)
    }

    fn grade_delete(&self, id: i64) -> StoreResult<Grade> {
        let existing = self.grade_by_id(id)?;
        self.conn.execute("DELETE FROM grades WHERE id = ?", [id])?;
        debug!(grade_id = id, "grade deleted");
        Ok(existing)
    }

    fn grade_stats(&self) -> StoreResult<GradeStats> {
        let grades = self.grades_all()?;
        let submitted: Vec<&Grade> = grades.iter().filter(|g| g.submitted).collect();
        let average_score = if submitted.is_empty() {
            0
        } else {
            let total: f64 = submitted.iter().map(|g| g.score).sum();
            calc::round_half_up(total / submitted.len() as f64) as i64
        };
        Ok(GradeStats {
            total_grades: grades.len(),
            submitted_grades: submitted.len(),
            pending_grades: grades.len() - submitted.len(),
            average_score,
        })
    }
}
