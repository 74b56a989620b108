//! The school data store.
//!
//! Handlers only see the [`Repository`] trait. [`SqliteRepository`] backs it
//! with a private in-memory SQLite database, so each instance is an isolated
//! store whose lifetime is the lifetime of the value.

mod assignments;
mod attendance;
mod classes;
mod grades;
mod students;

use crate::calc;
use crate::config::StoreSettings;
use crate::db;
use crate::error::{StoreError, StoreResult};
use crate::model::{
    Assignment, AssignmentPatch, AttendanceKey, AttendancePatch, AttendanceRecord, Class,
    ClassPatch, Grade, GradeKey, GradePatch, NewAssignment, NewAttendance, NewClass, NewGrade,
    NewStudent, Student, StudentPatch,
};
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;

pub use assignments::AssignmentStats;
pub use attendance::{AttendanceScope, AttendanceStats, MarkAllPresent, MarkAllResult};
pub use classes::ClassStats;
pub use grades::GradeStats;
pub use students::{StudentFilter, StudentStats};

/// Result of a create-or-update by natural key.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Upserted<T> {
    pub record: T,
    pub created: bool,
}

pub trait StudentRepo {
    fn students_all(&self) -> StoreResult<Vec<Student>>;
    fn student_by_id(&self, id: i64) -> StoreResult<Student>;
    fn students_by_class(&self, class_code: &str) -> StoreResult<Vec<Student>>;
    fn students_search(&self, query: &str) -> StoreResult<Vec<Student>>;
    fn students_filter(&self, filter: &StudentFilter) -> StoreResult<Vec<Student>>;
    fn student_create(&self, input: NewStudent) -> StoreResult<Student>;
    fn student_update(&self, id: i64, patch: StudentPatch) -> StoreResult<Student>;
    fn student_delete(&self, id: i64) -> StoreResult<Student>;
    fn student_stats(&self) -> StoreResult<StudentStats>;
}

pub trait ClassRepo {
    fn classes_all(&self) -> StoreResult<Vec<Class>>;
    fn class_by_id(&self, id: i64) -> StoreResult<Class>;
    fn class_by_code(&self, code: &str) -> StoreResult<Class>;
    fn class_create(&self, input: NewClass) -> StoreResult<Class>;
    fn class_update(&self, id: i64, patch: ClassPatch) -> StoreResult<Class>;
    fn class_delete(&self, id: i64) -> StoreResult<Class>;
    fn class_stats(&self) -> StoreResult<ClassStats>;
}

pub trait AssignmentRepo {
    fn assignments_all(&self) -> StoreResult<Vec<Assignment>>;
    fn assignment_by_id(&self, id: i64) -> StoreResult<Assignment>;
    fn assignments_by_class(&self, class_code: &str) -> StoreResult<Vec<Assignment>>;
    fn assignment_create(&self, input: NewAssignment, today: NaiveDate) -> StoreResult<Assignment>;
    fn assignment_update(&self, id: i64, patch: AssignmentPatch) -> StoreResult<Assignment>;
    fn assignment_delete(&self, id: i64) -> StoreResult<Assignment>;
    fn assignment_stats(&self, today: NaiveDate) -> StoreResult<AssignmentStats>;
}

pub trait GradeRepo {
    fn grades_all(&self) -> StoreResult<Vec<Grade>>;
    fn grade_by_id(&self, id: i64) -> StoreResult<Grade>;
    fn grade_by_key(&self, key: GradeKey) -> StoreResult<Option<Grade>>;
    fn grades_by_student(&self, student_id: i64) -> StoreResult<Vec<Grade>>;
    fn grades_by_assignment(&self, assignment_id: i64) -> StoreResult<Vec<Grade>>;
    fn grade_upsert(&self, input: NewGrade) -> StoreResult<Upserted<Grade>>;
    fn grade_update_by_id(&self, id: i64, patch: GradePatch) -> StoreResult<Grade>;
    fn grade_update_by_key(&self, key: GradeKey, patch: GradePatch) -> StoreResult<Grade>;
    fn grade_delete(&self, id: i64) -> StoreResult<Grade>;
    fn grade_stats(&self) -> StoreResult<GradeStats>;
}

pub trait AttendanceRepo {
    fn attendance_all(&self) -> StoreResult<Vec<AttendanceRecord>>;
    fn attendance_by_id(&self, id: i64) -> StoreResult<AttendanceRecord>;
    fn attendance_by_key(&self, key: &AttendanceKey) -> StoreResult<Option<AttendanceRecord>>;
    fn attendance_by_student(&self, student_id: i64) -> StoreResult<Vec<AttendanceRecord>>;
    fn attendance_by_date(&self, date: &str) -> StoreResult<Vec<AttendanceRecord>>;
    fn attendance_by_class(&self, class_code: &str) -> StoreResult<Vec<AttendanceRecord>>;
    fn attendance_upsert(&self, input: NewAttendance) -> StoreResult<Upserted<AttendanceRecord>>;
    fn attendance_update_by_id(
        &self,
        id: i64,
        patch: AttendancePatch,
    ) -> StoreResult<AttendanceRecord>;
    fn attendance_update_by_key(
        &self,
        key: &AttendanceKey,
        patch: AttendancePatch,
    ) -> StoreResult<AttendanceRecord>;
    fn attendance_delete(&self, id: i64) -> StoreResult<AttendanceRecord>;
    fn attendance_mark_all_present(&self, req: MarkAllPresent) -> StoreResult<MarkAllResult>;
    fn attendance_stats(&self, scope: &AttendanceScope) -> StoreResult<AttendanceStats>;

    /// Advance the cell at `key` one step through the status cycle and save
    /// it. A cell with no record starts from absent.
    fn attendance_cycle(&self, key: AttendanceKey) -> StoreResult<AttendanceRecord> {
        let current = self.attendance_by_key(&key)?.map(|r| r.status);
        let status = calc::next_status(current);
        let saved = self.attendance_upsert(NewAttendance {
            student_id: key.student_id,
            class_id: key.class_id,
            date: key.date,
            status,
        })?;
        Ok(saved.record)
    }
}

pub trait Repository: StudentRepo + ClassRepo + AssignmentRepo + GradeRepo + AttendanceRepo {
    fn settings(&self) -> &StoreSettings;
}

pub struct SqliteRepository {
    conn: Connection,
    settings: StoreSettings,
}

impl SqliteRepository {
    pub fn open_in_memory(settings: StoreSettings) -> anyhow::Result<Self> {
        Ok(Self {
            conn: db::open_memory_db()?,
            settings,
        })
    }
}

impl Repository for SqliteRepository {
    fn settings(&self) -> &StoreSettings {
        &self.settings
    }
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

/// Normalize an ISO date or fail with a field-level validation error.
pub(crate) fn require_date(field: &str, raw: &str) -> StoreResult<String> {
    match parse_date(raw) {
        Some(d) => Ok(d.format("%Y-%m-%d").to_string()),
        None => {
            let mut fields = std::collections::BTreeMap::new();
            fields.insert(field.to_string(), "must be a date in YYYY-MM-DD form".to_string());
            Err(StoreError::Validation {
                message: format!("invalid {}: {}", field, raw),
                fields,
            })
        }
    }
}

pub(crate) fn student_exists(conn: &Connection, id: i64) -> StoreResult<bool> {
    Ok(conn
        .query_row("SELECT 1 FROM students WHERE id = ?", [id], |r| r.get::<_, i64>(0))
        .optional()?
        .is_some())
}

pub(crate) fn class_code_exists(conn: &Connection, code: &str) -> StoreResult<bool> {
    Ok(conn
        .query_row("SELECT 1 FROM classes WHERE code = ?", [code], |r| {
            r.get::<_, i64>(0)
        })
        .optional()?
        .is_some())
}

pub(crate) fn ensure_student(conn: &Connection, id: i64) -> StoreResult<()> {
    if student_exists(conn, id)? {
        Ok(())
    } else {
        Err(StoreError::not_found("student", id))
    }
}

pub(crate) fn ensure_class_code(conn: &Connection, code: &str) -> StoreResult<()> {
    if class_code_exists(conn, code)? {
        Ok(())
    } else {
        Err(StoreError::not_found("class", code))
    }
}

/// Student ids enrolled in a class, in enrollment order.
pub(crate) fn enrolled_student_ids(conn: &Connection, class_code: &str) -> StoreResult<Vec<i64>> {
    let mut stmt =
        conn.prepare("SELECT student_id FROM enrollments WHERE class_code = ? ORDER BY seq")?;
    let ids = stmt
        .query_map([class_code], |r| r.get::<_, i64>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ids)
}

#[cfg(test)]
mod tests;
