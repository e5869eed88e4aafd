use crate::catalog;
use crate::db;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::required_path;
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_health(state: &mut AppState, _req: &Request) -> Result<serde_json::Value, HandlerErr> {
    Ok(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
        "analysisConfigured": state.config.has_api_key(),
        "studentCount": state.roster.student_count(),
        "uncataloguedGrades": state.roster.uncatalogued_grades(),
        "reviewActive": state.review.is_active(),
        "entryOpen": state.entry.is_some(),
    }))
}

fn handle_workspace_select(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let path = required_path(&req.params, "path")?;
    let conn = db::open_db(&path).map_err(|e| HandlerErr::internal("db_open_failed", e))?;
    tracing::info!(workspace = %path.display(), "workspace selected");
    state.workspace = Some(path.clone());
    state.db = Some(conn);
    Ok(json!({ "workspacePath": path.to_string_lossy() }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "health" => handle_health(state, req),
        "workspace.select" => handle_workspace_select(state, req),
        "catalog.get" => Ok(catalog::catalog_json()),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
