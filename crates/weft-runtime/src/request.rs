use std::fmt::{self, Display, Formatter};

use slotmap::new_key_type;
use smol_str::SmolStr;
use tracing::{debug, info};
use weft_compiler::property::{DATA, REQUEST_ECHO};
use weft_lang::Value;
use weft_markup::{NodeId, markers};

use crate::error::{RequestError, RuntimeError};
use crate::host::Host;
use crate::runtime::{Runtime, ValueId};

new_key_type! {
    pub struct RequestId;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    #[default]
    Get,
    Post,
}

impl Display for Method {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
        }
    }
}

/// An outbound fetch handed to [`Host::request`].
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub url: String,
    pub method: Method,
    pub params: serde_json::Value,
}

impl Request {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: Method::Get,
            params: serde_json::Value::Null,
        }
    }

    /// Reads a `request` value: either a URL or `{url, method, params}`.
    pub fn from_value(value: &Value) -> Result<Self, RequestError> {
        let invalid = || RequestError::InvalidRequest(value.to_json().to_string());

        match value {
            Value::String(url) => Ok(Request::get(url.as_str())),
            Value::Object(entries) => {
                let url = entries.get("url").and_then(Value::as_str).ok_or_else(invalid)?;
                let method = match entries.get("method") {
                    None | Some(Value::Undefined | Value::Null) => Method::Get,
                    Some(Value::String(m)) if m.eq_ignore_ascii_case("get") => Method::Get,
                    Some(Value::String(m)) if m.eq_ignore_ascii_case("post") => Method::Post,
                    Some(_) => return Err(invalid()),
                };

                Ok(Self {
                    url: url.to_string(),
                    method,
                    params: entries
                        .get("params")
                        .map(Value::to_json)
                        .unwrap_or(serde_json::Value::Null),
                })
            }
            _ => Err(invalid()),
        }
    }
}

/// Raw outcome of a request as delivered by the host.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub body: String,
}

impl Response {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parses the body, or describes why the response cannot be used.
    pub fn json(&self) -> Result<Value, RequestError> {
        if !self.is_success() {
            return Err(RequestError::Status(self.status));
        }
        serde_json::from_str::<serde_json::Value>(&self.body)
            .map(Value::from)
            .map_err(|e| RequestError::InvalidJson(e.to_string()))
    }
}

#[derive(Debug)]
pub(crate) struct PendingRequest {
    pub request: Request,
    pub target: ValueId,
    pub echo: Option<NodeId>,
}

/// The value a failed request leaves in its target: `{error, status}`.
pub fn error_payload(error: &RequestError) -> Value {
    Value::object([
        (SmolStr::new("error"), Value::from(error.to_string())),
        (
            SmolStr::new("status"),
            error
                .status()
                .map(|s| Value::from(f64::from(s)))
                .unwrap_or(Value::Null),
        ),
    ])
}

impl<H: Host> Runtime<H> {
    /// Side effect of a `request` value: issues the fetch described by its
    /// output, or replays the echoed response left by an earlier render.
    pub(crate) fn issue(&mut self, id: ValueId, first: bool) {
        let Some((output, scope)) = self.values.get(id).map(|c| (c.output.clone(), c.scope)) else {
            return;
        };
        if output.is_nullish() {
            return;
        }

        let request = match Request::from_value(&output) {
            Ok(request) => request,
            Err(source) => {
                self.report(RuntimeError::Request {
                    url: output.to_string(),
                    source,
                });
                return;
            }
        };
        let Some(target) = self.scope_value(scope, DATA) else {
            self.report(RuntimeError::Request {
                url: request.url,
                source: RequestError::MissingTarget,
            });
            return;
        };
        let Some(node) = self.scopes.get(scope).map(|s| s.node) else {
            return;
        };

        if first && let Some(body) = self.host.attribute(node, markers::ECHO) {
            debug!(url = %request.url, "Applying echoed response");
            self.deliver(target, &request.url, Ok(Response::ok(body)));
            return;
        }

        let echo = self
            .scope_value(scope, REQUEST_ECHO)
            .map(|echo| self.get(echo))
            .is_some_and(|v| v.truthy())
            .then_some(node);
        debug!(url = %request.url, method = %request.method, "Issuing request");
        let rid = self.requests.insert(PendingRequest {
            request: request.clone(),
            target,
            echo,
        });
        self.host.request(rid, &request);
    }

    /// Applies the outcome of request `id` to its target value. Returns
    /// false for unknown or already completed requests.
    pub fn complete_request(&mut self, id: RequestId, result: Result<Response, RequestError>) -> bool {
        let Some(pending) = self.requests.remove(id) else {
            return false;
        };

        if let (Some(node), Ok(response)) = (pending.echo, &result)
            && response.is_success()
            && let Err(source) = self.host.set_attribute(node, markers::ECHO, &response.body)
        {
            self.report(RuntimeError::SideEffect {
                name: REQUEST_ECHO.into(),
                source,
            });
        }
        self.deliver(pending.target, &pending.request.url, result);

        if self.requests.is_empty() {
            info!("All requests completed");
            if let Some(callback) = self.on_settle.as_mut() {
                callback();
            }
        }
        true
    }

    fn deliver(&mut self, target: ValueId, url: &str, result: Result<Response, RequestError>) {
        let value = match result.and_then(|response| response.json()) {
            Ok(value) => value,
            Err(source) => {
                let payload = error_payload(&source);
                self.report(RuntimeError::Request {
                    url: url.to_string(),
                    source,
                });
                payload
            }
        };

        if self.values.contains_key(target) {
            self.set(target, value);
        }
    }

    pub fn pending_requests(&self) -> usize {
        self.requests.len()
    }

    pub fn is_settled(&self) -> bool {
        self.requests.is_empty()
    }

    /// Called each time the last pending request completes.
    pub fn on_settle(&mut self, callback: impl FnMut() + 'static) {
        self.on_settle = Some(Box::new(callback));
    }
}
