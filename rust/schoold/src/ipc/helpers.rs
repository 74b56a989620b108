use crate::error::StoreError;
use crate::ipc::error::{err, ok};
use crate::repo::parse_date;
use chrono::{Local, NaiveDate};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<Value>,
}

impl HandlerErr {
    pub fn bad_params(message: impl Into<String>) -> Self {
        HandlerErr {
            code: "bad_params",
            message: message.into(),
            details: None,
        }
    }

    pub fn response(self, id: &str) -> Value {
        err(id, self.code, self.message, self.details)
    }
}

impl From<StoreError> for HandlerErr {
    fn from(e: StoreError) -> Self {
        HandlerErr {
            code: e.code(),
            details: e.details(),
            message: e.to_string(),
        }
    }
}

pub type HandlerResult = Result<Value, HandlerErr>;

pub fn respond(id: &str, result: HandlerResult) -> Value {
    match result {
        Ok(result) => ok(id, result),
        Err(error) => error.response(id),
    }
}

pub fn get_required_str(params: &Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn get_optional_str(params: &Value, key: &str) -> Result<Option<String>, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(HandlerErr::bad_params(format!("{} must be a string", key))),
    }
}

pub fn get_required_i64(params: &Value, key: &str) -> Result<i64, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Err(HandlerErr::bad_params(format!("missing {}", key))),
        Some(v) => v
            .as_i64()
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be an integer", key))),
    }
}

pub fn get_optional_bool(params: &Value, key: &str) -> Result<Option<bool>, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(_) => Err(HandlerErr::bad_params(format!("{} must be a boolean", key))),
    }
}

pub fn get_required_f64(params: &Value, key: &str) -> Result<f64, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Err(HandlerErr::bad_params(format!("missing {}", key))),
        Some(v) => v
            .as_f64()
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be a number", key))),
    }
}

/// Deserialize the whole params object into `T`.
pub fn parse_params<T: DeserializeOwned>(params: &Value) -> Result<T, HandlerErr> {
    let source = if params.is_null() {
        Value::Object(Default::default())
    } else {
        params.clone()
    };
    serde_json::from_value(source).map_err(|e| HandlerErr::bad_params(e.to_string()))
}

/// Deserialize `params.patch`, which must be an object.
pub fn parse_patch<T: DeserializeOwned>(params: &Value) -> Result<T, HandlerErr> {
    let Some(patch) = params.get("patch").filter(|v| v.is_object()) else {
        return Err(HandlerErr::bad_params("missing patch"));
    };
    serde_json::from_value(patch.clone())
        .map_err(|e| HandlerErr::bad_params(format!("invalid patch: {}", e)))
}

/// `params.today` when given, otherwise the local calendar date.
pub fn today_param(params: &Value) -> Result<NaiveDate, HandlerErr> {
    match get_optional_str(params, "today")? {
        Some(raw) => parse_date(&raw)
            .ok_or_else(|| HandlerErr::bad_params(format!("invalid today: {}", raw))),
        None => Ok(Local::now().date_naive()),
    }
}

pub fn to_json<T: Serialize>(value: &T) -> Result<Value, HandlerErr> {
    serde_json::to_value(value).map_err(|e| HandlerErr {
        code: "internal",
        message: e.to_string(),
        details: None,
    })
}
