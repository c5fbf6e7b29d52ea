use crate::model::role::RoleMeta;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbNamesResponse {
    pub db_name: Vec<String>,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RolesResponse {
    pub roles: Vec<RoleMeta>,
}

/// Body returned by `create-report`. `url` is empty when creation failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportCreatedResponse {
    pub message: String,
    pub url: String,
}
