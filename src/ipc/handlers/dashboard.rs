use crate::calc::chart_selection;
use crate::catalog::{self, OVERALL_ATTEMPT};
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{required_str, to_json};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_dataset(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    let revision = state.scores.revision();
    let dataset = state.dataset();
    Ok(json!({
        "revision": revision,
        "dataset": to_json(dataset.as_ref())?,
    }))
}

fn selection_json(state: &AppState) -> Result<serde_json::Value, HandlerErr> {
    Ok(json!({ "selection": to_json(&state.selection)? }))
}

fn handle_toggle(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let attempt = required_str(&req.params, "attempt")?;
    if attempt != OVERALL_ATTEMPT && !catalog::is_regular_attempt(attempt) {
        return Err(HandlerErr::bad_params("unknown attempt")
            .with_details(json!({ "attempt": attempt })));
    }
    state.selection.toggle(attempt);
    selection_json(state)
}

fn handle_charts(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    let dataset = state.dataset();
    let charts = chart_selection(&dataset, state.selection.attempts());
    Ok(json!({
        "selection": to_json(&state.selection)?,
        "charts": to_json(&charts)?,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "dashboard.dataset" => handle_dataset(state),
        "dashboard.selection" => selection_json(state),
        "dashboard.toggleAttempt" => handle_toggle(state, req),
        "dashboard.charts" => handle_charts(state),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
