//! REST API request/response data transfer objects

use serde::Serialize;
use std::collections::HashMap;

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub version: String,
    pub handles: HashMap<String, HandleDto>,
    pub uptime_seconds: u64,
}

#[derive(Debug, Serialize)]
pub struct HandleDto {
    pub initialized: bool,
    pub methods: Vec<String>,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl ErrorResponse {
    pub fn new(error: &str, code: &str) -> Self {
        Self {
            error: error.to_string(),
            code: code.to_string(),
        }
    }
}
