//! Service layer types

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// State of one dispatch handle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandleStatus {
    pub initialized: bool,
    pub methods: Vec<String>,
}

/// Health check result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResult {
    pub healthy: bool,
    pub version: String,
    pub handles: HashMap<String, HandleStatus>,
}
