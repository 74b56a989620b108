use super::{
    enrolled_student_ids, ensure_class_code, ensure_student, require_date, AttendanceRepo,
    SqliteRepository, Upserted,
};
use crate::calc;
use crate::error::{StoreError, StoreResult};
use crate::model::{
    AttendanceKey, AttendancePatch, AttendanceRecord, AttendanceStatus, NewAttendance,
    StatusCounts,
};
use rusqlite::{OptionalExtension, Row};
use serde::Serialize;
use tracing::{debug, warn};

/// Which records an aggregate covers. Empty fields do not narrow the scope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttendanceScope {
    pub class_id: Option<String>,
    pub date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceStats {
    pub total_records: usize,
    pub present_count: usize,
    pub absent_count: usize,
    pub tardy_count: usize,
    pub attendance_rate: u32,
    pub status_distribution: StatusCounts,
}

#[derive(Debug, Clone, Default)]
pub struct MarkAllPresent {
    pub class_id: String,
    pub date: String,
    /// Defaults to the class roster.
    pub student_ids: Option<Vec<i64>>,
    /// Replace existing records instead of skipping them.
    pub overwrite: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkAllResult {
    pub written: Vec<AttendanceRecord>,
    pub skipped: Vec<i64>,
}

const ATTENDANCE_COLUMNS: &str = "id, student_id, class_code, date, status";

fn row_to_record(r: &Row<'_>) -> rusqlite::Result<AttendanceRecord> {
    let raw: String = r.get(4)?;
    let status = AttendanceStatus::parse(&raw).unwrap_or_else(|| {
        warn!(status = %raw, "unknown attendance status; reading as absent");
        AttendanceStatus::Absent
    });
    Ok(AttendanceRecord {
        id: r.get(0)?,
        student_id: r.get(1)?,
        class_id: r.get(2)?,
        date: r.get(3)?,
        status,
    })
}

impl SqliteRepository {
    fn query_attendance<P: rusqlite::Params>(
        &self,
        where_sql: &str,
        params: P,
    ) -> StoreResult<Vec<AttendanceRecord>> {
        let sql = format!(
            "SELECT {} FROM attendance {} ORDER BY id",
            ATTENDANCE_COLUMNS, where_sql
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params, row_to_record)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn write_status(&self, id: i64, status: AttendanceStatus) -> StoreResult<AttendanceRecord> {
        self.conn.execute(
            "UPDATE attendance SET status = ? WHERE id = ?",
            (status.as_str(), id),
        )?;
        debug!(record_id = id, status = status.as_str(), "attendance updated");
        self.attendance_by_id(id)
    }

    fn normalized_key(&self, key: &AttendanceKey) -> StoreResult<AttendanceKey> {
        Ok(AttendanceKey {
            student_id: key.student_id,
            class_id: key.class_id.trim().to_string(),
            date: require_date("date", &key.date)?,
        })
    }
}

impl AttendanceRepo for SqliteRepository {
    fn attendance_all(&self) -> StoreResult<Vec<AttendanceRecord>> {
        self.query_attendance("", [])
    }

    fn attendance_by_id(&self, id: i64) -> StoreResult<AttendanceRecord> {
        let sql = format!("SELECT {} FROM attendance WHERE id = ?", ATTENDANCE_COLUMNS);
        self.conn
            .query_row(&sql, [id], row_to_record)
            .optional()?
            .ok_or_else(|| StoreError::not_found("attendance record", id))
    }

    fn attendance_by_key(&self, key: &AttendanceKey) -> StoreResult<Option<AttendanceRecord>> {
        let key = self.normalized_key(key)?;
        let sql = format!(
            "SELECT {} FROM attendance WHERE student_id = ? AND class_code = ? AND date = ?",
            ATTENDANCE_COLUMNS
        );
        Ok(self
            .conn
            .query_row(&sql, (key.student_id, &key.class_id, &key.date), row_to_record)
            .optional()?)
    }

    fn attendance_by_student(&self, student_id: i64) -> StoreResult<Vec<AttendanceRecord>> {
        self.query_attendance("WHERE student_id = ?", [student_id])
    }

    fn attendance_by_date(&self, date: &str) -> StoreResult<Vec<AttendanceRecord>> {
        let date = require_date("date", date)?;
        self.query_attendance("WHERE date = ?", [date])
    }

    fn attendance_by_class(&self, class_code: &str) -> StoreResult<Vec<AttendanceRecord>> {
        self.query_attendance("WHERE class_code = ?", [class_code])
    }

    fn attendance_upsert(&self, input: NewAttendance) -> StoreResult<Upserted<AttendanceRecord>> {
        let key = self.normalized_key(&input.key())?;
        ensure_student(&self.conn, key.student_id)?;
        ensure_class_code(&self.conn, &key.class_id)?;

        if let Some(existing) = self.attendance_by_key(&key)? {
            return Ok(Upserted {
                record: self.write_status(existing.id, input.status)?,
                created: false,
            });
        }

        self.conn.execute(
            "INSERT INTO attendance(student_id, class_code, date, status) VALUES(?, ?, ?, ?)",
            (key.student_id, &key.class_id, &key.date, input.status.as_str()),
        )?;
        let id = self.conn.last_insert_rowid();
        debug!(
            record_id = id,
            student_id = key.student_id,
            class = %key.class_id,
            date = %key.date,
            status = input.status.as_str(),
            "attendance recorded"
        );
        Ok(Upserted {
            record: self.attendance_by_id(id)?,
            created: true,
        })
    }

    fn attendance_update_by_id(
        &self,
        id: i64,
        patch: AttendancePatch,
    ) -> StoreResult<AttendanceRecord> {
        let existing = self.attendance_by_id(id)?;
        match patch.status {
            Some(status) => self.write_status(id, status),
            None => Ok(existing),
        }
    }

    fn attendance_update_by_key(
        &self,
        key: &AttendanceKey,
        patch: AttendancePatch,
    ) -> StoreResult<AttendanceRecord> {
        let existing = self.attendance_by_key(key)?.ok_or_else(|| {
            StoreError::not_found(
                "attendance record",
                format!("student {} / {} / {}", key.student_id, key.class_id, key.date),
            )
        })?;
        self.attendance_update_by_id(existing.id, patch)
    }

    fn attendance_delete(&self, id: i64) -> StoreResult<AttendanceRecord> {
        let existing = self.attendance_by_id(id)?;
        self.conn.execute("DELETE FROM attendance WHERE id = ?", [id])?;
        debug!(record_id = id, "attendance deleted");
        Ok(existing)
    }

    fn attendance_mark_all_present(&self, req: MarkAllPresent) -> StoreResult<MarkAllResult> {
        let class_code = req.class_id.trim().to_string();
        ensure_class_code(&self.conn, &class_code)?;
        let date = require_date("date", &req.date)?;
        let student_ids = match req.student_ids {
            Some(ids) => ids,
            None => enrolled_student_ids(&self.conn, &class_code)?,
        };

        let tx = self.conn.unchecked_transaction()?;
        let mut written = Vec::new();
        let mut skipped = Vec::new();
        for student_id in student_ids {
            let key = AttendanceKey {
                student_id,
                class_id: class_code.clone(),
                date: date.clone(),
            };
            if !req.overwrite && self.attendance_by_key(&key)?.is_some() {
                skipped.push(student_id);
                continue;
            }
            let saved = self.attendance_upsert(NewAttendance {
                student_id,
                class_id: key.class_id,
                date: key.date,
                status: AttendanceStatus::Present,
            })?;
            written.push(saved.record);
        }
        tx.commit()?;

        debug!(
            class = %class_code,
            date = %date,
            written = written.len(),
            skipped = skipped.len(),
            "marked all present"
        );
        Ok(MarkAllResult { written, skipped })
    }

    fn attendance_stats(&self, scope: &AttendanceScope) -> StoreResult<AttendanceStats> {
        let mut records = self.attendance_all()?;
        if let Some(class_id) = scope.class_id.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            records.retain(|r| r.class_id == class_id);
        }
        if let Some(date) = scope.date.as_deref().filter(|d| !d.trim().is_empty()) {
            let date = require_date("date", date)?;
            records.retain(|r| r.date == date);
        }

        let counts = calc::status_counts(&records);
        Ok(AttendanceStats {
            total_records: counts.total(),
            present_count: counts.present,
            absent_count: counts.absent,
            tardy_count: counts.tardy,
            attendance_rate: calc::attendance_rate(&counts)
                .unwrap_or(self.settings.empty_attendance_rate),
            status_distribution: counts,
        })
    }
}
