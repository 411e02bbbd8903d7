// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::Json;
use serde::Serialize;

/// Liveness probe response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Liveness probe handler.
///
/// Always returns 200 if the process is running. The identity provider is
/// not contacted.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "success".to_string(),
    })
}
