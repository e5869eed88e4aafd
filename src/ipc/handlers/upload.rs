use crate::export;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{required_path, to_json};
use crate::ipc::types::{AppState, Request};
use crate::review::ReviewSession;
use crate::upload::{self, UploadFile};
use serde::Deserialize;
use serde_json::json;
use std::path::PathBuf;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileParam {
    path: PathBuf,
    name: Option<String>,
    mime_type: Option<String>,
}

impl From<FileParam> for UploadFile {
    fn from(p: FileParam) -> Self {
        let mut file = UploadFile::new(p.path);
        if let Some(name) = p.name.filter(|n| !n.trim().is_empty()) {
            file.name = name;
        }
        file.mime_type = p.mime_type.filter(|m| !m.trim().is_empty());
        file
    }
}

fn handle_parse(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let files: Vec<FileParam> = match req.params.get("files") {
        Some(v) => serde_json::from_value(v.clone())
            .map_err(|e| HandlerErr::bad_params(format!("invalid params.files: {}", e)))?,
        None => Vec::new(),
    };
    let files: Vec<UploadFile> = files.into_iter().map(UploadFile::from).collect();

    let parsed = upload::process_batch(&files)?;
    let session = ReviewSession::start_import(parsed)?;
    if state.review.is_active() {
        tracing::info!("replacing unfinished review with new upload");
    }
    state.review = session;
    Ok(json!({ "review": to_json(&state.review.view())? }))
}

fn handle_template(req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let out_dir = required_path(&req.params, "outDir")?;
    let path =
        export::write_template(&out_dir).map_err(|e| HandlerErr::internal("export_failed", e))?;
    Ok(json!({ "path": path.to_string_lossy() }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "upload.parse" => handle_parse(state, req),
        "upload.template" => handle_template(req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
