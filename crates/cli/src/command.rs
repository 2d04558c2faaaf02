use locator_core::{list_locators, ResolveError, Resolver};
use locator_protocol::{ErrorEnvelope, ErrorKind, LocatorsRequest, ResolveRequest};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::time::Instant;

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    Ok,
    Error,
}

#[derive(Debug, Serialize, Clone, Default)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl ResponseMeta {
    fn is_empty(&self) -> bool {
        self.model_id.is_none() && self.duration_ms.is_none()
    }
}

/// `{"status":"ok","data":...}` or `{"status":"error","error":{"kind","message"}}`.
#[derive(Debug, Serialize)]
pub struct CommandResponse {
    pub status: CommandStatus,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorEnvelope>,
    #[serde(skip_serializing_if = "ResponseMeta::is_empty")]
    pub meta: ResponseMeta,
}

impl CommandResponse {
    /// Fails only when `data` cannot be encoded, which is a server fault rather than an
    /// error envelope.
    pub fn ok<T: Serialize>(data: &T) -> serde_json::Result<Self> {
        Ok(Self {
            status: CommandStatus::Ok,
            data: serde_json::to_value(data)?,
            error: None,
            meta: ResponseMeta::default(),
        })
    }

    pub fn error(envelope: ErrorEnvelope) -> Self {
        Self {
            status: CommandStatus::Error,
            data: Value::Null,
            error: Some(envelope),
            meta: ResponseMeta::default(),
        }
    }

    pub fn from_error(err: &ResolveError) -> Self {
        Self::error(err.to_envelope())
    }

    pub fn is_error(&self) -> bool {
        matches!(self.status, CommandStatus::Error)
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }

    fn with_meta(mut self, model_id: Option<&str>, started: Instant) -> Self {
        #[allow(clippy::cast_possible_truncation)]
        let elapsed = started.elapsed().as_millis() as u64;
        self.meta = ResponseMeta {
            model_id: model_id.map(ToString::to_string),
            duration_ms: Some(elapsed),
        };
        self
    }
}

fn parse<T: DeserializeOwned>(raw: &[u8]) -> Result<T, Box<CommandResponse>> {
    serde_json::from_slice(raw).map_err(|err| {
        Box::new(CommandResponse::error(ErrorEnvelope::invalid_input(format!(
            "Invalid JSON request: {err}"
        ))))
    })
}

pub async fn execute_resolve(
    resolver: &Resolver,
    raw: &[u8],
) -> serde_json::Result<CommandResponse> {
    let started = Instant::now();
    let request: ResolveRequest = match parse(raw) {
        Ok(request) => request,
        Err(response) => return Ok(*response),
    };
    let response = match resolver.resolve(&request).await {
        Ok(response) => CommandResponse::ok(&response)?,
        Err(err) => {
            log::warn!("resolve failed: {err}");
            CommandResponse::from_error(&err)
        }
    };
    Ok(response.with_meta(Some(resolver.model_id()), started))
}

pub fn execute_locators(raw: &[u8]) -> serde_json::Result<CommandResponse> {
    let started = Instant::now();
    let request: LocatorsRequest = match parse(raw) {
        Ok(request) => request,
        Err(response) => return Ok(*response),
    };
    let response = match list_locators(&request) {
        Ok(elements) => CommandResponse::ok(&elements)?,
        Err(err) => CommandResponse::from_error(&err),
    };
    Ok(response.with_meta(None, started))
}
