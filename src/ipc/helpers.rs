use crate::ipc::error::HandlerErr;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;

pub fn required_str<'a>(params: &'a Value, key: &str) -> Result<&'a str, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing params.{}", key)))
}

pub fn optional_str<'a>(params: &'a Value, key: &str) -> Option<&'a str> {
    params.get(key).and_then(|v| v.as_str())
}

pub fn optional_f64(params: &Value, key: &str) -> Result<Option<f64>, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_f64()
            .map(Some)
            .ok_or_else(|| HandlerErr::bad_params(format!("params.{} must be a number", key))),
    }
}

pub fn required_path(params: &Value, key: &str) -> Result<PathBuf, HandlerErr> {
    required_str(params, key).map(PathBuf::from)
}

/// Text field that may also arrive as a JSON number (score cells typed as numbers).
pub fn raw_text(params: &Value, key: &str) -> Result<String, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(_) => Err(HandlerErr::bad_params(format!(
            "params.{} must be a string or number",
            key
        ))),
    }
}

pub fn parse_param<T: DeserializeOwned>(params: &Value, key: &str) -> Result<T, HandlerErr> {
    let v = params
        .get(key)
        .cloned()
        .ok_or_else(|| HandlerErr::bad_params(format!("missing params.{}", key)))?;
    serde_json::from_value(v).map_err(|e| {
        HandlerErr::bad_params(format!("invalid params.{}", key))
            .with_details(serde_json::json!({ "error": e.to_string() }))
    })
}

pub fn to_json<T: Serialize>(value: &T) -> Result<Value, HandlerErr> {
    serde_json::to_value(value).map_err(|e| HandlerErr::new("internal", e.to_string()))
}
