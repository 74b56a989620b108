use super::{
    ensure_class_code, AssignmentRepo, AttendanceRepo, GradeRepo, SqliteRepository, StudentRepo,
};
use crate::calc;
use crate::error::{FieldErrors, StoreError, StoreResult};
use crate::model::{GradeDistribution, NewStudent, Student, StudentPatch};
use regex::Regex;
use rusqlite::{Connection, OptionalExtension, Row};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StudentFilter {
    pub grade_level: Option<i64>,
    /// Inclusive `currentGrade` bounds.
    pub grade_range: Option<(u32, u32)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentStats {
    pub total_students: usize,
    pub average_grade: u32,
    pub average_attendance: u32,
    pub grade_distribution: GradeDistribution,
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\S+@\S+\.\S+").expect("static email pattern"))
}

fn validate_student(s: &NewStudent) -> StoreResult<()> {
    let mut errors = FieldErrors::new();
    errors.require("firstName", &s.first_name, "First name is required");
    errors.require("lastName", &s.last_name, "Last name is required");
    if s.email.trim().is_empty() {
        errors.add("email", "Email is required");
    } else if !email_pattern().is_match(s.email.trim()) {
        errors.add("email", "Please enter a valid email");
    }
    errors.require("studentNumber", &s.student_number, "Student ID is required");
    match s.grade_level {
        None => errors.add("gradeLevel", "Grade level is required"),
        Some(g) if !(9..=12).contains(&g) => {
            errors.add("gradeLevel", "Grade level must be between 9 and 12")
        }
        Some(_) => {}
    }
    errors.into_result("student validation failed")
}

fn duplicate_number(conn: &Connection, number: &str, except_id: Option<i64>) -> StoreResult<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT id FROM students WHERE student_number = ?",
            [number],
            |r| r.get(0),
        )
        .optional()?;
    Ok(match found {
        Some(id) => Some(id) != except_id,
        None => false,
    })
}

fn duplicate_number_error(number: &str) -> StoreError {
    let mut fields = std::collections::BTreeMap::new();
    fields.insert(
        "studentNumber".to_string(),
        "Student ID already exists".to_string(),
    );
    StoreError::Validation {
        message: format!("Student ID already exists: {}", number),
        fields,
    }
}

fn row_to_student(r: &Row<'_>) -> rusqlite::Result<Student> {
    Ok(Student {
        id: r.get(0)?,
        student_number: r.get(1)?,
        first_name: r.get(2)?,
        last_name: r.get(3)?,
        email: r.get(4)?,
        grade_level: r.get(5)?,
        class_ids: Vec::new(),
        current_grade: 0,
        attendance_rate: 0,
    })
}

const STUDENT_COLUMNS: &str = "id, student_number, first_name, last_name, email, grade_level";

fn replace_enrollments(conn: &Connection, student_id: i64, class_ids: &[String]) -> StoreResult<()> {
    conn.execute("DELETE FROM enrollments WHERE student_id = ?", [student_id])?;
    for code in class_ids {
        conn.execute(
            "INSERT OR IGNORE INTO enrollments(student_id, class_code) VALUES(?, ?)",
            (student_id, code),
        )?;
    }
    Ok(())
}

fn normalize_class_ids(raw: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for c in raw {
        let t = c.trim();
        if !t.is_empty() && !out.iter().any(|o| o == t) {
            out.push(t.to_string());
        }
    }
    out
}

impl SqliteRepository {
    fn load_students(&self, where_sql: &str, params: &[&dyn rusqlite::ToSql]) -> StoreResult<Vec<Student>> {
        let sql = format!(
            "SELECT {} FROM students {} ORDER BY id",
            STUDENT_COLUMNS, where_sql
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut students = stmt
            .query_map(params, row_to_student)?
            .collect::<Result<Vec<_>, _>>()?;
        self.fill_derived(&mut students)?;
        Ok(students)
    }

    /// Enrollments plus `currentGrade` and `attendanceRate`, recomputed from
    /// the grade and attendance tables on every read.
    fn fill_derived(&self, students: &mut [Student]) -> StoreResult<()> {
        if students.is_empty() {
            return Ok(());
        }

        let mut enrollments: HashMap<i64, Vec<String>> = HashMap::new();
        {
            let mut stmt = self
                .conn
                .prepare("SELECT student_id, class_code FROM enrollments ORDER BY seq")?;
            let rows = stmt.query_map([], |r| Ok((r.get::<_, i64>(0)?, r.get::<_, String>(1)?)))?;
            for row in rows {
                let (student_id, code) = row?;
                enrollments.entry(student_id).or_default().push(code);
            }
        }

        let assignments = self.assignments_all()?;
        let grades = self.grades_all()?;
        let attendance = self.attendance_all()?;
        let empty_rate = self.settings.empty_attendance_rate;

        for s in students.iter_mut() {
            s.class_ids = enrollments.remove(&s.id).unwrap_or_default();

            let mine: Vec<_> = assignments
                .iter()
                .filter(|a| s.class_ids.contains(&a.class_id))
                .cloned()
                .collect();
            let my_grades: Vec<_> = grades
                .iter()
                .filter(|g| g.student_id == s.id)
                .cloned()
                .collect();
            let weights = calc::category_weights(&mine);
            s.current_grade = calc::weighted_grade(&mine, &my_grades, &weights);

            let counts = calc::status_counts(attendance.iter().filter(|r| r.student_id == s.id));
            s.attendance_rate = calc::attendance_rate(&counts).unwrap_or(empty_rate);
        }
        Ok(())
    }
}

impl StudentRepo for SqliteRepository {
    fn students_all(&self) -> StoreResult<Vec<Student>> {
        self.load_students("", &[])
    }

    fn student_by_id(&self, id: i64) -> StoreResult<Student> {
        self.load_students("WHERE id = ?", &[&id])?
            .pop()
            .ok_or_else(|| StoreError::not_found("student", id))
    }

    fn students_by_class(&self, class_code: &str) -> StoreResult<Vec<Student>> {
        self.load_students(
            "WHERE id IN (SELECT student_id FROM enrollments WHERE class_code = ?)",
            &[&class_code],
        )
    }

    fn students_search(&self, query: &str) -> StoreResult<Vec<Student>> {
        let q = query.trim().to_lowercase();
        let all = self.students_all()?;
        if q.is_empty() {
            return Ok(all);
        }
        Ok(all
            .into_iter()
            .filter(|s| {
                s.first_name.to_lowercase().contains(&q)
                    || s.last_name.to_lowercase().contains(&q)
                    || s.email.to_lowercase().contains(&q)
                    || s.student_number.to_lowercase().contains(&q)
            })
            .collect())
    }

    fn students_filter(&self, filter: &StudentFilter) -> StoreResult<Vec<Student>> {
        Ok(self
            .students_all()?
            .into_iter()
            .filter(|s| filter.grade_level.map(|g| s.grade_level == g).unwrap_or(true))
            .filter(|s| {
                filter
                    .grade_range
                    .map(|(min, max)| s.current_grade >= min && s.current_grade <= max)
                    .unwrap_or(true)
            })
            .collect())
    }

    fn student_create(&self, input: NewStudent) -> StoreResult<Student> {
        validate_student(&input)?;
        let number = input.student_number.trim().to_string();
        if duplicate_number(&self.conn, &number, None)? {
            return Err(duplicate_number_error(&number));
        }
        let class_ids = normalize_class_ids(&input.class_ids);
        for code in &class_ids {
            ensure_class_code(&self.conn, code)?;
        }

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO students(student_number, first_name, last_name, email, grade_level)
             VALUES(?, ?, ?, ?, ?)",
            (
                &number,
                input.first_name.trim(),
                input.last_name.trim(),
                input.email.trim(),
                input.grade_level.unwrap_or_default(),
            ),
        )?;
        let id = tx.last_insert_rowid();
        replace_enrollments(&tx, id, &class_ids)?;
        tx.commit()?;

        debug!(student_id = id, student_number = %number, "student created");
        self.student_by_id(id)
    }

    fn student_update(&self, id: i64, patch: StudentPatch) -> StoreResult<Student> {
        let existing = self.student_by_id(id)?;
        let merged = NewStudent {
            student_number: patch.student_number.unwrap_or(existing.student_number),
            first_name: patch.first_name.unwrap_or(existing.first_name),
            last_name: patch.last_name.unwrap_or(existing.last_name),
            email: patch.email.unwrap_or(existing.email),
            grade_level: Some(patch.grade_level.unwrap_or(existing.grade_level)),
            class_ids: patch.class_ids.unwrap_or(existing.class_ids),
        };
        validate_student(&merged)?;
        let number = merged.student_number.trim().to_string();
        if duplicate_number(&self.conn, &number, Some(id))? {
            return Err(duplicate_number_error(&number));
        }
        let class_ids = normalize_class_ids(&merged.class_ids);
        for code in &class_ids {
            ensure_class_code(&self.conn, code)?;
        }

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "UPDATE students
             SET student_number = ?, first_name = ?, last_name = ?, email = ?, grade_level = ?
             WHERE id = ?",
            (
                &number,
                merged.first_name.trim(),
                merged.last_name.trim(),
                merged.email.trim(),
                merged.grade_level.unwrap_or_default(),
                id,
            ),
        )?;
        replace_enrollments(&tx, id, &class_ids)?;
        tx.commit()?;

        debug!(student_id = id, "student updated");
        self.student_by_id(id)
    }

    fn student_delete(&self, id: i64) -> StoreResult<Student> {
        let existing = self.student_by_id(id)?;

        // No ON DELETE CASCADE; remove dependents first.
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM grades WHERE student_id = ?", [id])?;
        tx.execute("DELETE FROM attendance WHERE student_id = ?", [id])?;
        tx.execute("DELETE FROM enrollments WHERE student_id = ?", [id])?;
        tx.execute("DELETE FROM students WHERE id = ?", [id])?;
        tx.commit()?;

        debug!(student_id = id, "student deleted");
        Ok(existing)
    }

    fn student_stats(&self) -> StoreResult<StudentStats> {
        let students = self.students_all()?;
        let grades: Vec<u32> = students.iter().map(|s| s.current_grade).collect();
        let rates: Vec<u32> = students.iter().map(|s| s.attendance_rate).collect();
        Ok(StudentStats {
            total_students: students.len(),
            average_grade: calc::class_average(&grades),
            average_attendance: calc::class_average(&rates),
            grade_distribution: calc::grade_distribution(grades.iter().copied()),
        })
    }
}
