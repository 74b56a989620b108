use crate::ipc::error::{err, ok};
use crate::ipc::helpers::get_optional_bool;
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "seedPath": state.config.seed_path.as_ref().map(|p| p.to_string_lossy().to_string()),
            "simulateLatency": state.config.simulate_latency,
        }),
    )
}

fn handle_session_reset(state: &mut AppState, req: &Request) -> serde_json::Value {
    let seed = match get_optional_bool(&req.params, "seed") {
        Ok(v) => v.unwrap_or(false),
        Err(error) => return error.response(&req.id),
    };
    if seed && state.config.seed_path.is_none() {
        return err(&req.id, "bad_params", "no seed file configured", None);
    }
    match state.reset(seed) {
        Ok(summary) => ok(&req.id, json!({ "seeded": summary })),
        Err(e) => err(&req.id, "seed_failed", format!("{e:#}"), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "session.reset" => Some(handle_session_reset(state, req)),
        _ => None,
    }
}
