use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{optional_str, to_json};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_list(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    match optional_str(&req.params, "grade") {
        Some(grade) => {
            let roster = state.roster.grade(grade);
            Ok(json!({
                "grade": grade,
                "students": to_json(&state.roster.students(grade))?,
                "lastUpdated": roster.and_then(|r| r.last_updated.clone()),
            }))
        }
        None => Ok(json!({ "grades": to_json(&state.roster)? })),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "roster.list" => handle_list(state, req),
        "roster.banners" => to_json(&state.roster.banners()).map(|b| json!({ "banners": b })),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
