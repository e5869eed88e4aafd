use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{raw_text, required_str, to_json};
use crate::ipc::types::{AppState, Request};
use crate::review::{ReviewProgress, ReviewSession};
use crate::roster::{now_stamp, StudentField};
use serde_json::json;

fn view_json(state: &AppState) -> Result<serde_json::Value, HandlerErr> {
    Ok(json!({
        "active": state.review.is_active(),
        "review": to_json(&state.review.view())?,
    }))
}

fn handle_start_edit(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let grade = required_str(&req.params, "grade")?;
    state.review = ReviewSession::start_edit(&state.roster, grade)?;
    view_json(state)
}

fn handle_update_student(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = required_str(&req.params, "studentId")?;
    let field_raw = required_str(&req.params, "field")?;
    let field = StudentField::parse(field_raw).ok_or_else(|| {
        HandlerErr::bad_params("field must be one of: rollNumber, name, grade, classroom")
            .with_details(json!({ "field": field_raw }))
    })?;
    let value = raw_text(&req.params, "value")?;
    state.review.update_student(student_id, field, &value)?;
    tracing::debug!(student_id, field = field.as_str(), "review draft edited");
    view_json(state)
}

fn handle_confirm(state: &mut AppState, _req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let (roster, progress) = state.review.confirm(&state.roster, &now_stamp())?;
    state.roster = roster;
    let message = match &progress {
        ReviewProgress::Finished { message } => {
            tracing::info!(%message, "review finished");
            Some(message.clone())
        }
        ReviewProgress::Advanced { .. } => None,
    };
    Ok(json!({
        "progress": to_json(&progress)?,
        "message": message,
        "review": to_json(&state.review.view())?,
        "banners": to_json(&state.roster.banners())?,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "review.get" => view_json(state),
        "review.startEdit" => handle_start_edit(state, req),
        "review.updateStudent" => handle_update_student(state, req),
        "review.confirm" => handle_confirm(state, req),
        "review.cancel" => Ok(json!({ "cancelled": state.review.cancel() })),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
