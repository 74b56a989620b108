//! Stateless grade helpers, for front-end previews that should agree with
//! what the store derives.

use crate::calc;
use crate::ipc::helpers::{get_required_f64, respond, HandlerErr, HandlerResult};
use crate::ipc::types::{AppState, Request};
use crate::model::{Assignment, Grade};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;

fn calc_percentage(params: &Value) -> HandlerResult {
    let score = get_required_f64(params, "score")?;
    let points = get_required_f64(params, "points")?;
    let percentage = calc::grade_percentage(score, points);
    let letter = calc::letter_grade(percentage);
    Ok(json!({
        "percentage": percentage,
        "letter": letter,
        "colorClass": letter.color_class(),
    }))
}

fn calc_letter(params: &Value) -> HandlerResult {
    let raw = get_required_f64(params, "percentage")?;
    let percentage = if raw.is_finite() {
        calc::round_half_up(raw).clamp(0.0, 100.0) as u32
    } else {
        0
    };
    let letter = calc::letter_grade(percentage);
    Ok(json!({
        "letter": letter,
        "colorClass": letter.color_class(),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WeightedAssignment {
    id: i64,
    category: String,
    points: i64,
    #[serde(default)]
    weight: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WeightedGrade {
    assignment_id: i64,
    score: f64,
    #[serde(default = "default_submitted")]
    submitted: bool,
}

fn default_submitted() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct WeightedInput {
    assignments: Vec<WeightedAssignment>,
    #[serde(default)]
    grades: Vec<WeightedGrade>,
    /// Explicit category weights. Without it, each category takes the weight
    /// of its first assignment that carries one.
    #[serde(default)]
    weights: Option<HashMap<String, f64>>,
}

fn calc_weighted(params: &Value) -> HandlerResult {
    let input: WeightedInput = serde_json::from_value(params.clone())
        .map_err(|e| HandlerErr::bad_params(e.to_string()))?;

    let weights = match input.weights {
        Some(w) => w,
        None => {
            let mut w = HashMap::new();
            for a in &input.assignments {
                if let Some(weight) = a.weight {
                    w.entry(a.category.clone()).or_insert(weight);
                }
            }
            w
        }
    };
    let assignments: Vec<Assignment> = input
        .assignments
        .into_iter()
        .map(|a| Assignment {
            id: a.id,
            class_id: String::new(),
            name: String::new(),
            category: a.category,
            points: a.points,
            due_date: String::new(),
            weight: a.weight.unwrap_or(1.0),
        })
        .collect();
    let grades: Vec<Grade> = input
        .grades
        .into_iter()
        .enumerate()
        .map(|(i, g)| Grade {
            id: i as i64 + 1,
            student_id: 0,
            assignment_id: g.assignment_id,
            score: g.score,
            submitted: g.submitted,
        })
        .collect();

    let categories = calc::category_breakdown(&assignments, &grades, &weights);
    let weighted = calc::weighted_from_breakdown(&categories);
    let letter = calc::letter_grade(weighted);
    Ok(json!({
        "weightedGrade": weighted,
        "letter": letter,
        "colorClass": letter.color_class(),
        "categories": categories,
    }))
}

pub fn try_handle(_state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let handler: fn(&Value) -> HandlerResult = match req.method.as_str() {
        "calc.percentage" => calc_percentage,
        "calc.letter" => calc_letter,
        "calc.weighted" => calc_weighted,
        _ => return None,
    };
    Some(respond(&req.id, handler(&req.params)))
}
