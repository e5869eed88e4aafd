use crate::analysis::{self, AnalysisData, ANALYSIS_FAILED_MESSAGE};
use crate::catalog;
use crate::error::ErrorCode;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{optional_f64, required_str};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

/// Builds the prompt for one chart over the requested (or currently selected) attempts.
fn prompt_for(state: &mut AppState, req: &Request) -> Result<String, HandlerErr> {
    let chart_id = required_str(&req.params, "chartId")?;
    let chart = catalog::chart_config(chart_id).ok_or_else(|| {
        HandlerErr::bad_params("unknown chart").with_details(json!({ "chartId": chart_id }))
    })?;
    let attempts: Vec<String> = match req.params.get("attempts") {
        Some(v) => serde_json::from_value(v.clone())
            .map_err(|e| HandlerErr::bad_params(format!("invalid params.attempts: {}", e)))?,
        None => state.selection.attempts().to_vec(),
    };
    let target = optional_f64(&req.params, "targetScore")?;

    let dataset = state.dataset();
    let data: AnalysisData = attempts
        .iter()
        .filter_map(|a| {
            dataset
                .attempt(a)
                .map(|view| (a.clone(), view.series(chart.id).to_vec()))
        })
        .collect();
    if data.is_empty() {
        return Err(HandlerErr::bad_params("no data for the requested attempts"));
    }

    analysis::build_prompt(chart.title, &data, target)
        .map_err(|e| HandlerErr::new("internal", e.to_string()))
}

fn handle_run(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let prompt = prompt_for(state, req)?;
    match analysis::generate(&state.config, &prompt) {
        Ok(text) => Ok(json!({ "text": text })),
        Err(e) => {
            tracing::warn!(error = %e, "analysis request failed");
            Err(HandlerErr::new(e.code(), ANALYSIS_FAILED_MESSAGE)
                .with_details(e.details().unwrap_or_else(|| json!({}))))
        }
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "analysis.prompt" => prompt_for(state, req).map(|p| json!({ "prompt": p })),
        "analysis.run" => handle_run(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
