use aulos_fetch::FetchError;
use axum::response::{IntoResponse, Response};
use http::{StatusCode, header};
use thiserror::Error;

/// Failures that happen before the response status has been committed.
///
/// Everything here maps onto an explicit HTTP error response; once a 206 or
/// 200 is on the wire, failures tear the connection down instead.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("{0}")]
    BadRequest(String),

    #[error("invalid auth key")]
    Unauthorized,

    #[error(transparent)]
    Upstream(#[from] FetchError),

    #[error("requested range is beyond the resource size {total}")]
    RangeNotSatisfiable { total: u64 },
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message).into_response(),
            Self::Unauthorized => {
                (StatusCode::UNAUTHORIZED, "invalid auth key").into_response()
            }
            Self::RangeNotSatisfiable { total } => (
                StatusCode::RANGE_NOT_SATISFIABLE,
                [(header::CONTENT_RANGE, format!("bytes */{total}"))],
            )
                .into_response(),
            Self::Upstream(FetchError::UpstreamStatus { status, body }) => {
                let status =
                    StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
                (status, body.unwrap_or_default()).into_response()
            }
            Self::Upstream(err) => {
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
            }
        }
    }
}

impl From<aulos_net::NetError> for ProxyError {
    fn from(err: aulos_net::NetError) -> Self {
        Self::Upstream(FetchError::Net(err))
    }
}
