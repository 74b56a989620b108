use crate::model::{
    Assignment, AttendanceRecord, AttendanceStatus, Grade, GradeDistribution, StatusCounts,
};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LetterGrade {
    A,
    B,
    C,
    D,
    F,
}

impl LetterGrade {
    pub fn as_str(self) -> &'static str {
        match self {
            LetterGrade::A => "A",
            LetterGrade::B => "B",
            LetterGrade::C => "C",
            LetterGrade::D => "D",
            LetterGrade::F => "F",
        }
    }

    pub fn color_class(self) -> &'static str {
        match self {
            LetterGrade::A => "grade-a",
            LetterGrade::B => "grade-b",
            LetterGrade::C => "grade-c",
            LetterGrade::D => "grade-d",
            LetterGrade::F => "grade-f",
        }
    }
}

/// Half-up rounding to a whole number, matching what the dashboard shows.
pub fn round_half_up(x: f64) -> f64 {
    (x + 0.5).floor()
}

fn to_percent(x: f64) -> u32 {
    if !x.is_finite() {
        return 0;
    }
    round_half_up(x).clamp(0.0, 100.0) as u32
}

/// `round(score / points * 100)`, clamped to 0..=100. Zero points yields 0.
pub fn grade_percentage(score: f64, points: f64) -> u32 {
    if points <= 0.0 {
        return 0;
    }
    to_percent(100.0 * score / points)
}

pub fn letter_grade(percentage: u32) -> LetterGrade {
    match percentage {
        p if p >= 90 => LetterGrade::A,
        p if p >= 80 => LetterGrade::B,
        p if p >= 70 => LetterGrade::C,
        p if p >= 60 => LetterGrade::D,
        _ => LetterGrade::F,
    }
}

pub fn grade_distribution<I>(percentages: I) -> GradeDistribution
where
    I: IntoIterator<Item = u32>,
{
    let mut dist = GradeDistribution::default();
    for p in percentages {
        match letter_grade(p) {
            LetterGrade::A => dist.a += 1,
            LetterGrade::B => dist.b += 1,
            LetterGrade::C => dist.c += 1,
            LetterGrade::D => dist.d += 1,
            LetterGrade::F => dist.f += 1,
        }
    }
    dist
}

/// Rounded mean; an empty slice averages to 0.
pub fn class_average(values: &[u32]) -> u32 {
    if values.is_empty() {
        return 0;
    }
    let total: f64 = values.iter().map(|v| *v as f64).sum();
    to_percent(total / values.len() as f64)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeCell {
    pub submitted: bool,
    pub percentage: Option<u32>,
    pub letter: Option<LetterGrade>,
    pub display: String,
    pub score_label: String,
    pub color_class: Option<&'static str>,
}

/// What a gradebook cell shows. Missing and unsubmitted grades render as `-`.
pub fn grade_cell(grade: Option<&Grade>, points: i64) -> GradeCell {
    match grade {
        Some(g) if g.submitted => {
            let pct = grade_percentage(g.score, points as f64);
            let letter = letter_grade(pct);
            GradeCell {
                submitted: true,
                percentage: Some(pct),
                letter: Some(letter),
                display: letter.as_str().to_string(),
                score_label: format!("{}/{}", format_score(g.score), points),
                color_class: Some(letter.color_class()),
            }
        }
        _ => GradeCell {
            submitted: false,
            percentage: None,
            letter: None,
            display: "-".to_string(),
            score_label: format!("0/{}", points),
            color_class: None,
        },
    }
}

fn format_score(score: f64) -> String {
    if score.fract() == 0.0 {
        format!("{}", score as i64)
    } else {
        format!("{}", score)
    }
}

/// Clamp an entered score to `0..=points`. Non-finite input counts as 0.
/// Returns the value to save and whether it was changed.
pub fn clamp_score(score: f64, points: i64) -> (f64, bool) {
    let max = points.max(0) as f64;
    if !score.is_finite() {
        return (0.0, true);
    }
    if score < 0.0 {
        (0.0, true)
    } else if score > max {
        (max, true)
    } else {
        (score, false)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryScore {
    pub category: String,
    pub weight: f64,
    pub total_points: f64,
    pub earned_points: f64,
    pub percentage: Option<f64>,
    pub contributes: bool,
}

fn resolve_weight(weights: &HashMap<String, f64>, category: &str) -> f64 {
    match weights.get(category) {
        Some(w) if w.is_finite() => w.max(0.0),
        _ => 1.0,
    }
}

/// Per-category totals for one student's grades. `grades` must already be
/// restricted to a single student.
pub fn category_breakdown(
    assignments: &[Assignment],
    grades: &[Grade],
    weights: &HashMap<String, f64>,
) -> Vec<CategoryScore> {
    let mut totals: BTreeMap<&str, (f64, f64)> = BTreeMap::new();
    for a in assignments {
        let entry = totals.entry(a.category.as_str()).or_insert((0.0, 0.0));
        entry.0 += a.points as f64;
        if let Some(g) = grades.iter().find(|g| g.assignment_id == a.id) {
            if g.submitted {
                entry.1 += g.score;
            }
        }
    }

    totals
        .into_iter()
        .map(|(category, (total, earned))| {
            let weight = resolve_weight(weights, category);
            let percentage = if total > 0.0 {
                Some(100.0 * earned / total)
            } else {
                None
            };
            CategoryScore {
                category: category.to_string(),
                weight,
                total_points: total,
                earned_points: earned,
                percentage,
                contributes: percentage.is_some() && weight > 0.0,
            }
        })
        .collect()
}

/// Weighted overall percentage across categories.
///
/// Categories with no possible points or an explicit zero weight drop out of
/// both sums. Categories missing from `weights` count with weight 1.
pub fn weighted_grade(
    assignments: &[Assignment],
    grades: &[Grade],
    weights: &HashMap<String, f64>,
) -> u32 {
    weighted_from_breakdown(&category_breakdown(assignments, grades, weights))
}

pub fn weighted_from_breakdown(categories: &[CategoryScore]) -> u32 {
    let mut sum = 0.0_f64;
    let mut denom = 0.0_f64;
    for c in categories.iter().filter(|c| c.contributes) {
        if let Some(pct) = c.percentage {
            sum += pct * c.weight;
            denom += c.weight;
        }
    }
    if denom > 0.0 {
        to_percent(sum / denom)
    } else {
        0
    }
}

/// First assignment seen in a category supplies that category's weight.
pub fn category_weights(assignments: &[Assignment]) -> HashMap<String, f64> {
    let mut weights = HashMap::new();
    for a in assignments {
        weights.entry(a.category.clone()).or_insert(a.weight);
    }
    weights
}

/// Mean of per-assignment percentages over a student's submitted grades.
pub fn student_average(grades: &[Grade], assignments: &[Assignment]) -> u32 {
    let mut total = 0.0_f64;
    let mut count = 0_usize;
    for g in grades.iter().filter(|g| g.submitted) {
        let Some(a) = assignments.iter().find(|a| a.id == g.assignment_id) else {
            continue;
        };
        if a.points > 0 {
            total += 100.0 * g.score / a.points as f64;
        }
        count += 1;
    }
    if count == 0 {
        0
    } else {
        to_percent(total / count as f64)
    }
}

/// Mean percentage over submitted grades for one assignment.
pub fn assignment_average(assignment: &Assignment, grades: &[Grade]) -> u32 {
    let submitted: Vec<&Grade> = grades
        .iter()
        .filter(|g| g.assignment_id == assignment.id && g.submitted)
        .collect();
    if submitted.is_empty() || assignment.points <= 0 {
        return 0;
    }
    let total: f64 = submitted
        .iter()
        .map(|g| 100.0 * g.score / assignment.points as f64)
        .sum();
    to_percent(total / submitted.len() as f64)
}

pub fn status_counts<'a, I>(records: I) -> StatusCounts
where
    I: IntoIterator<Item = &'a AttendanceRecord>,
{
    let mut counts = StatusCounts::default();
    for r in records {
        match r.status {
            AttendanceStatus::Present => counts.present += 1,
            AttendanceStatus::Absent => counts.absent += 1,
            AttendanceStatus::Tardy => counts.tardy += 1,
        }
    }
    counts
}

/// Present share of the given counts as a whole percent, or `None` when there
/// are no records at all.
pub fn attendance_rate(counts: &StatusCounts) -> Option<u32> {
    let total = counts.total();
    if total == 0 {
        return None;
    }
    Some(to_percent(100.0 * counts.present as f64 / total as f64))
}

/// Status after one click on an attendance cell. No record reads as absent.
pub fn next_status(current: Option<AttendanceStatus>) -> AttendanceStatus {
    current.unwrap_or(AttendanceStatus::Absent).next()
}
