use crate::calc::Dataset;
use crate::db::{self, CHARTS_KEY, SCORES_KEY};
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::to_json;
use crate::ipc::types::{AppState, Request};
use crate::report;
use crate::roster::now_stamp;
use crate::scores::ScorePatch;
use serde_json::json;

fn handle_model(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    let dataset = state.dataset();
    Ok(json!({ "report": to_json(&report::build_model(&dataset))? }))
}

fn handle_handoff_store(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    let dataset = state.dataset();
    let scores = state.scores.to_patch();
    let conn = state.db()?;
    let stamp = now_stamp();
    let charts_bytes = db::store_payload(conn, CHARTS_KEY, dataset.as_ref(), &stamp)?;
    let scores_bytes = db::store_payload(conn, SCORES_KEY, &scores, &stamp)?;
    tracing::info!(charts_bytes, scores_bytes, "report data stored");
    Ok(json!({
        "keys": [CHARTS_KEY, SCORES_KEY],
        "storedAt": stamp,
    }))
}

/// Reads both keys back; either one missing or corrupt fails the whole load.
fn handle_handoff_load(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    let conn = state.db()?;
    let loaded = db::load_payload::<Dataset>(conn, CHARTS_KEY).and_then(|dataset| {
        db::load_payload::<ScorePatch>(conn, SCORES_KEY).map(|scores| (dataset, scores))
    });
    let (dataset, scores) = match loaded {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "report data unavailable");
            return Err(e.into());
        }
    };
    Ok(json!({
        "report": to_json(&report::build_model(&dataset))?,
        "scores": to_json(&scores)?,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "report.model" => handle_model(state),
        "report.handoff.store" => handle_handoff_store(state),
        "report.handoff.load" => handle_handoff_load(state),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
