use std::collections::HashMap;

use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use serde_json::Value;

/// Implemented by domain error enums that know which status code and error
/// code the response should carry.
pub trait ApiRequestError: std::error::Error {
    fn status_code(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }

    fn code(&self) -> &'static str {
        "ERR"
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] diesel_async::pooled_connection::deadpool::PoolError),

    #[error("outbound http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("password hashing error: {0}")]
    PasswordHash(#[from] bcrypt::BcryptError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Serialize for ServerError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry("message", &self.to_string())?;
        map.end()
    }
}

#[derive(Debug)]
pub enum AppError {
    Server {
        error: ServerError,

        #[cfg(debug_assertions)]
        backtrace: Option<backtrace::Backtrace>,
    },
    Request {
        code: &'static str,
        msg: String,
        status: StatusCode,
    },
}

impl AppError {
    pub fn request(code: &'static str, msg: impl Into<String>, status: StatusCode) -> Self {
        AppError::Request {
            code,
            msg: msg.into(),
            status,
        }
    }

    fn server(error: ServerError) -> Self {
        AppError::Server {
            error,

            #[cfg(debug_assertions)]
            backtrace: Some(backtrace::Backtrace::new()),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    code: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    msg: Option<String>,

    #[cfg(debug_assertions)]
    #[serde(skip_serializing_if = "Option::is_none")]
    debug_info: Option<HashMap<&'static str, Value>>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status_code, error_response) = match self {
            AppError::Server {
                error,
                #[cfg(debug_assertions)]
                backtrace,
            } => {
                tracing::error!(%error, "request failed with a server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    #[cfg(debug_assertions)]
                    {
                        let frames_info = backtrace.as_ref().map(filter_backtrace);
                        ErrorResponse {
                            code: "SERVER_ERR".into(),
                            msg: Some("Internal server error".into()),
                            debug_info: Some(HashMap::from([
                                (
                                    "backtrace",
                                    serde_json::to_value(&frames_info).unwrap_or(Value::Null),
                                ),
                                (
                                    "error",
                                    serde_json::to_value(&error).unwrap_or(Value::Null),
                                ),
                            ])),
                        }
                    },
                    #[cfg(not(debug_assertions))]
                    ErrorResponse {
                        code: "SERVER_ERR".into(),
                        msg: Some("Internal server error".into()),
                    },
                )
            }
            AppError::Request { code, msg, status } => (
                status,
                ErrorResponse {
                    code: code.into(),
                    msg: Some(msg),

                    #[cfg(debug_assertions)]
                    debug_info: None,
                },
            ),
        };

        (status_code, Json(error_response)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<ServerError>,
{
    fn from(e: E) -> Self {
        AppError::server(e.into())
    }
}

impl From<(&'static str, StatusCode)> for AppError {
    fn from((msg, status): (&'static str, StatusCode)) -> Self {
        AppError::request("ERR", msg, status)
    }
}

impl From<(String, StatusCode)> for AppError {
    fn from((msg, status): (String, StatusCode)) -> Self {
        AppError::request("ERR", msg, status)
    }
}

impl From<&'static str> for AppError {
    fn from(msg: &'static str) -> Self {
        AppError::request("ERR", msg, StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::request("ERR", msg, StatusCode::INTERNAL_SERVER_ERROR)
    }
}

#[derive(Serialize, Debug)]
#[cfg(debug_assertions)]
struct FrameInfo {
    name: String,
    loc: String,
}

#[cfg(debug_assertions)]
fn filter_backtrace(backtrace: &backtrace::Backtrace) -> Vec<FrameInfo> {
    const MODULE_PREFIX: &str = concat!(env!("CARGO_PKG_NAME"), "::");
    let mut frames_info: Vec<FrameInfo> = Vec::new();

    for frame in backtrace.frames() {
        for symbol in frame.symbols() {
            if let (Some(name), Some(filename), Some(lineno)) = (
                symbol.name().map(|n| n.to_string()),
                symbol.filename().map(|f| f.to_owned()),
                symbol.lineno(),
            ) {
                if name.contains(MODULE_PREFIX) {
                    frames_info.push(FrameInfo {
                        name,
                        loc: format!("{}:{}", filename.to_string_lossy(), lineno),
                    });
                }
            }
        }
    }

    frames_info
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn unique_violation_is_a_database_server_error() {
        let e = diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::UniqueViolation,
            Box::new("duplicate key value violates unique constraint".to_string()),
        );
        match AppError::from(ServerError::from(e)) {
            AppError::Server { error, .. } => {
                assert!(matches!(error, ServerError::Database(_)))
            }
            AppError::Request { .. } => panic!("expected a server error"),
        }
    }

    #[test]
    fn tuple_conversion_keeps_status() {
        let e = AppError::from(("nope", StatusCode::FORBIDDEN));
        match e {
            AppError::Request { status, .. } => assert_eq!(status, StatusCode::FORBIDDEN),
            _ => panic!("expected a request error"),
        }
    }
}
