use super::{class_code_exists, enrolled_student_ids, ensure_student, ClassRepo, SqliteRepository};
use crate::calc;
use crate::error::{FieldErrors, StoreError, StoreResult};
use crate::model::{Class, ClassPatch, NewClass};
use rusqlite::{Connection, OptionalExtension, Row};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassStats {
    pub total_classes: usize,
    pub total_enrollments: usize,
    pub average_class_size: u32,
    pub subject_distribution: BTreeMap<String, usize>,
}

fn validate_class(name: &str, subject: &str, period: Option<i64>) -> StoreResult<()> {
    let mut errors = FieldErrors::new();
    errors.require("name", name, "Class name is required");
    errors.require("subject", subject, "Subject is required");
    match period {
        None => errors.add("period", "Period is required"),
        Some(p) if p < 1 => errors.add("period", "Period must be 1 or later"),
        Some(_) => {}
    }
    errors.into_result("class validation failed")
}

fn row_to_class(r: &Row<'_>) -> rusqlite::Result<Class> {
    Ok(Class {
        id: r.get(0)?,
        code: r.get(1)?,
        name: r.get(2)?,
        subject: r.get(3)?,
        period: r.get(4)?,
        student_ids: Vec::new(),
    })
}

fn replace_roster(conn: &Connection, code: &str, student_ids: &[i64]) -> StoreResult<()> {
    conn.execute("DELETE FROM enrollments WHERE class_code = ?", [code])?;
    for id in student_ids {
        conn.execute(
            "INSERT OR IGNORE INTO enrollments(student_id, class_code) VALUES(?, ?)",
            (id, code),
        )?;
    }
    Ok(())
}

impl SqliteRepository {
    fn load_class<P: rusqlite::Params>(&self, where_sql: &str, params: P) -> StoreResult<Option<Class>> {
        let sql = format!(
            "SELECT id, code, name, subject, period FROM classes {}",
            where_sql
        );
        let class = self
            .conn
            .query_row(&sql, params, row_to_class)
            .optional()?;
        match class {
            Some(mut c) => {
                c.student_ids = enrolled_student_ids(&self.conn, &c.code)?;
                Ok(Some(c))
            }
            None => Ok(None),
        }
    }
}

impl ClassRepo for SqliteRepository {
    fn classes_all(&self) -> StoreResult<Vec<Class>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, code, name, subject, period FROM classes ORDER BY id")?;
        let mut classes = stmt
            .query_map([], row_to_class)?
            .collect::<Result<Vec<_>, _>>()?;
        for c in classes.iter_mut() {
            c.student_ids = enrolled_student_ids(&self.conn, &c.code)?;
        }
        Ok(classes)
    }

    fn class_by_id(&self, id: i64) -> StoreResult<Class> {
        self.load_class("WHERE id = ?", [id])?
            .ok_or_else(|| StoreError::not_found("class", id))
    }

    fn class_by_code(&self, code: &str) -> StoreResult<Class> {
        self.load_class("WHERE code = ?", [code])?
            .ok_or_else(|| StoreError::not_found("class", code))
    }

    fn class_create(&self, input: NewClass) -> StoreResult<Class> {
        validate_class(&input.name, &input.subject, input.period)?;
        let code = match input.code.as_deref().map(str::trim) {
            Some("") => {
                return Err(StoreError::validation("class code must not be blank"));
            }
            Some(c) => {
                if class_code_exists(&self.conn, c)? {
                    let mut errors = FieldErrors::new();
                    errors.add("code", "Class code already exists");
                    errors.into_result(&format!("Class code already exists: {}", c))?;
                }
                Some(c.to_string())
            }
            None => None,
        };
        for id in &input.student_ids {
            ensure_student(&self.conn, *id)?;
        }

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO classes(code, name, subject, period) VALUES(?, ?, ?, ?)",
            (
                code.as_deref(),
                input.name.trim(),
                input.subject.trim(),
                input.period.unwrap_or(1),
            ),
        )?;
        let id = tx.last_insert_rowid();
        let code = match code {
            Some(c) => c,
            None => {
                let generated = format!("class{}", id);
                tx.execute("UPDATE classes SET code = ? WHERE id = ?", (&generated, id))?;
                generated
            }
        };
        replace_roster(&tx, &code, &input.student_ids)?;
        tx.commit()?;

        debug!(class_id = id, code = %code, "class created");
        self.class_by_id(id)
    }

    fn class_update(&self, id: i64, patch: ClassPatch) -> StoreResult<Class> {
        let existing = self.class_by_id(id)?;
        let name = patch.name.unwrap_or(existing.name);
        let subject = patch.subject.unwrap_or(existing.subject);
        let period = patch.period.unwrap_or(existing.period);
        validate_class(&name, &subject, Some(period))?;
        if let Some(ids) = &patch.student_ids {
            for sid in ids {
                ensure_student(&self.conn, *sid)?;
            }
        }

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "UPDATE classes SET name = ?, subject = ?, period = ? WHERE id = ?",
            (name.trim(), subject.trim(), period, id),
        )?;
        if let Some(ids) = &patch.student_ids {
            replace_roster(&tx, &existing.code, ids)?;
        }
        tx.commit()?;

        debug!(class_id = id, "class updated");
        self.class_by_id(id)
    }

    fn class_delete(&self, id: i64) -> StoreResult<Class> {
        let existing = self.class_by_id(id)?;
        let code = existing.code.as_str();

        // Explicitly delete in dependency order (no ON DELETE CASCADE).
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "DELETE FROM grades
             WHERE assignment_id IN (SELECT id FROM assignments WHERE class_code = ?)",
            [code],
        )?;
        tx.execute("DELETE FROM assignments WHERE class_code = ?", [code])?;
        tx.execute("DELETE FROM attendance WHERE class_code = ?", [code])?;
        tx.execute("DELETE FROM enrollments WHERE class_code = ?", [code])?;
        tx.execute("DELETE FROM classes WHERE id = ?", [id])?;
        tx.commit()?;

        debug!(class_id = id, code = %code, "class deleted");
        Ok(existing)
    }

    fn class_stats(&self) -> StoreResult<ClassStats> {
        let classes = self.classes_all()?;
        let sizes: Vec<u32> = classes.iter().map(|c| c.student_ids.len() as u32).collect();
        let mut subjects: BTreeMap<String, usize> = BTreeMap::new();
        for c in &classes {
            *subjects.entry(c.subject.clone()).or_insert(0) += 1;
        }
        Ok(ClassStats {
            total_classes: classes.len(),
            total_enrollments: sizes.iter().map(|s| *s as usize).sum(),
            average_class_size: average_size(&sizes),
            subject_distribution: subjects,
        })
    }
}

fn average_size(sizes: &[u32]) -> u32 {
    if sizes.is_empty() {
        return 0;
    }
    let total: u32 = sizes.iter().sum();
    calc::round_half_up(total as f64 / sizes.len() as f64) as u32
}
