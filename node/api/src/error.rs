// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Error envelope returned by every non-2xx response.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub details: String,
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            details: message.clone(),
            message,
            status: StatusCode::NOT_FOUND,
        }
    }

    pub fn internal(message: impl Into<String>, details: impl ToString) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
            details: details.to_string(),
        }
    }
}

impl From<landwatch_db::Error> for ApiError {
    fn from(err: landwatch_db::Error) -> Self {
        Self::internal("An unexpected error has occurred", err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "message": self.message,
            "details": self.details,
        }));
        (self.status, body).into_response()
    }
}
