use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Tardy,
}

impl AttendanceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
            AttendanceStatus::Tardy => "tardy",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "present" => Some(AttendanceStatus::Present),
            "absent" => Some(AttendanceStatus::Absent),
            "tardy" => Some(AttendanceStatus::Tardy),
            _ => None,
        }
    }

    /// Cell click order: absent -> present -> tardy -> absent.
    pub fn next(self) -> Self {
        match self {
            AttendanceStatus::Absent => AttendanceStatus::Present,
            AttendanceStatus::Present => AttendanceStatus::Tardy,
            AttendanceStatus::Tardy => AttendanceStatus::Absent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: i64,
    pub student_number: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub grade_level: i64,
    pub class_ids: Vec<String>,
    pub current_grade: u32,
    pub attendance_rate: u32,
}

impl Student {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStudent {
    #[serde(default)]
    pub student_number: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub grade_level: Option<i64>,
    #[serde(default)]
    pub class_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentPatch {
    pub student_number: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub grade_level: Option<i64>,
    pub class_ids: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Class {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub subject: String,
    pub period: i64,
    pub student_ids: Vec<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewClass {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub period: Option<i64>,
    #[serde(default)]
    pub student_ids: Vec<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassPatch {
    pub name: Option<String>,
    pub subject: Option<String>,
    pub period: Option<i64>,
    pub student_ids: Option<Vec<i64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: i64,
    pub class_id: String,
    pub name: String,
    pub category: String,
    pub points: i64,
    pub due_date: String,
    pub weight: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAssignment {
    #[serde(default)]
    pub class_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub points: i64,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub weight: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentPatch {
    pub class_id: Option<String>,
    pub name: Option<String>,
    pub category: Option<String>,
    pub points: Option<i64>,
    pub due_date: Option<String>,
    pub weight: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Grade {
    pub id: i64,
    pub student_id: i64,
    pub assignment_id: i64,
    pub score: f64,
    pub submitted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeKey {
    pub student_id: i64,
    pub assignment_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGrade {
    pub student_id: i64,
    pub assignment_id: i64,
    pub score: f64,
    #[serde(default)]
    pub submitted: Option<bool>,
}

impl NewGrade {
    pub fn key(&self) -> GradeKey {
        GradeKey {
            student_id: self.student_id,
            assignment_id: self.assignment_id,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradePatch {
    pub score: Option<f64>,
    pub submitted: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: i64,
    pub student_id: i64,
    pub class_id: String,
    pub date: String,
    pub status: AttendanceStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceKey {
    pub student_id: i64,
    pub class_id: String,
    pub date: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAttendance {
    pub student_id: i64,
    pub class_id: String,
    pub date: String,
    pub status: AttendanceStatus,
}

impl NewAttendance {
    pub fn key(&self) -> AttendanceKey {
        AttendanceKey {
            student_id: self.student_id,
            class_id: self.class_id.clone(),
            date: self.date.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendancePatch {
    pub status: Option<AttendanceStatus>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    pub present: usize,
    pub absent: usize,
    pub tardy: usize,
}

impl StatusCounts {
    pub fn total(&self) -> usize {
        self.present + self.absent + self.tardy
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GradeDistribution {
    #[serde(rename = "A")]
    pub a: usize,
    #[serde(rename = "B")]
    pub b: usize,
    #[serde(rename = "C")]
    pub c: usize,
    #[serde(rename = "D")]
    pub d: usize,
    #[serde(rename = "F")]
    pub f: usize,
}
