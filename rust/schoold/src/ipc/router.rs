use super::handlers;
use super::types::{AppState, Request};
use crate::ipc::error::err;
use std::time::{Duration, Instant};
use tracing::debug;

pub fn handle_request(state: &mut AppState, req: Request) -> serde_json::Value {
    let started = Instant::now();
    if state.config.simulate_latency {
        if let Some(delay) = simulated_latency(&req.method) {
            std::thread::sleep(delay);
        }
    }

    let resp = dispatch(state, &req);
    debug!(
        id = %req.id,
        method = %req.method,
        ok = resp.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request handled"
    );
    resp
}

fn dispatch(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Some(resp) = handlers::core::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::students::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::classes::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::assignments::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::grades::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::attendance::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::gradebook::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::dashboard::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::calc::try_handle(state, req) {
        return resp;
    }

    err(
        &req.id,
        "not_implemented",
        format!("unknown method: {}", req.method),
        None,
    )
}

/// Delay a store call the way a remote backend would.
fn simulated_latency(method: &str) -> Option<Duration> {
    let (family, op) = method.split_once('.')?;
    if !matches!(
        family,
        "students" | "classes" | "assignments" | "grades" | "attendance"
    ) {
        return None;
    }
    let ms = match (family, op) {
        (_, "get" | "stats") => 200,
        (_, "list" | "byClass" | "byStudent" | "byAssignment" | "byDate" | "search" | "filter"
        | "roster" | "grid") => 250,
        (_, "delete") => 300,
        ("attendance", "upsert" | "updateById" | "updateByKey" | "cycle" | "markAllPresent") => 300,
        (_, "create" | "update" | "upsert" | "updateById" | "updateByKey") => 400,
        _ => return None,
    };
    Some(Duration::from_millis(ms))
}
