use crate::entry::{EntryError, EntrySheet, PreTestSheet, SingleAttemptSheet};
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{optional_str, parse_param, raw_text, required_str, to_json};
use crate::ipc::types::{AppState, Request};
use crate::scores::{validate_patch, ScorePatch};
use serde_json::json;

fn handle_scores_get(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let attempt = optional_str(&req.params, "attempt");
    let grade = optional_str(&req.params, "grade");
    match (attempt, grade) {
        (Some(a), Some(g)) => Ok(json!({ "scores": to_json(&state.scores.grade(a, g))? })),
        (Some(a), None) => Ok(json!({ "scores": to_json(&state.scores.attempt(a))? })),
        (None, None) => Ok(json!({ "scores": to_json(&state.scores)? })),
        (None, Some(_)) => Err(HandlerErr::bad_params("params.grade requires params.attempt")),
    }
}

fn apply_patch(state: &mut AppState, patch: &ScorePatch) -> u64 {
    state.scores = state.scores.merged(patch);
    state.scores.revision()
}

fn handle_scores_save(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let patch: ScorePatch = parse_param(&req.params, "scores")?;
    validate_patch(&patch)?;
    let revision = apply_patch(state, &patch);
    tracing::info!(attempts = patch.len(), revision, "scores saved");
    Ok(json!({ "revision": revision }))
}

fn open_sheet(state: &AppState) -> Result<&EntrySheet, EntryError> {
    state.entry.as_ref().ok_or(EntryError::NoSheet)
}

fn sheet_json(state: &AppState) -> Result<serde_json::Value, HandlerErr> {
    Ok(json!({ "sheet": open_sheet(state)?.view() }))
}

fn handle_entry_open(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let attempt = required_str(&req.params, "attempt")?;
    let grade = required_str(&req.params, "grade")?;
    let classroom = optional_str(&req.params, "classroom");
    let sheet = SingleAttemptSheet::open(&state.scores, &state.roster, attempt, grade, classroom)?;
    state.entry = Some(EntrySheet::SingleAttempt(sheet));
    sheet_json(state)
}

fn handle_entry_open_pre_test(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let group = required_str(&req.params, "group")?;
    let classroom = optional_str(&req.params, "classroom");
    let sheet = PreTestSheet::open(&state.scores, &state.roster, group, classroom)?;
    state.entry = Some(EntrySheet::PreTest(sheet));
    sheet_json(state)
}

fn handle_entry_set_cell(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = required_str(&req.params, "studentId")?;
    let value = raw_text(&req.params, "value")?;
    let sheet = state.entry.as_mut().ok_or(EntryError::NoSheet)?;

    let edit = match sheet {
        EntrySheet::SingleAttempt(s) => {
            let subject = required_str(&req.params, "subject")?;
            s.set_cell(student_id, subject, &value)?
        }
        EntrySheet::PreTest(s) => {
            let round = req
                .params
                .get("round")
                .and_then(|v| v.as_u64())
                .and_then(|r| u8::try_from(r).ok())
                .ok_or_else(|| HandlerErr::bad_params("missing params.round"))?;
            s.set_cell(student_id, round, &value)?
        }
    };
    if !edit.applied {
        tracing::debug!(student_id, value = %value, "score edit rejected");
    }
    Ok(json!({ "edit": to_json(&edit)?, "sheet": sheet.view() }))
}

fn handle_entry_set_classroom(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let classroom = optional_str(&req.params, "classroom");
    let sheet = state.entry.as_mut().ok_or(EntryError::NoSheet)?;
    sheet.set_classroom(classroom)?;
    sheet_json(state)
}

fn handle_entry_save(state: &mut AppState, _req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let patch = open_sheet(state)?.to_patch();
    let revision = apply_patch(state, &patch);
    state.entry = None;
    tracing::info!(revision, "score sheet saved");
    Ok(json!({ "revision": revision }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "scores.get" => handle_scores_get(state, req),
        "scores.save" => handle_scores_save(state, req),
        "entry.open" => handle_entry_open(state, req),
        "entry.openPreTest" => handle_entry_open_pre_test(state, req),
        "entry.get" => sheet_json(state),
        "entry.setCell" => handle_entry_set_cell(state, req),
        "entry.setClassroom" => handle_entry_set_classroom(state, req),
        "entry.save" => handle_entry_save(state, req),
        "entry.close" => Ok(json!({ "closed": state.entry.take().is_some() })),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
