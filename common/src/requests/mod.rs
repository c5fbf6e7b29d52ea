use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
/// Request payload for the column edit check.
/// `sheet_id` is the provider document id of the report.
pub struct AccessCheckRequest {
    pub email: String,
    pub sheet_id: String,
    pub column_name: String,
}

#[derive(Debug, Clone, Deserialize)]
/// Request payload for query validation against one source database.
pub struct SqlValidationRequest {
    pub query: String,
    pub db_name: String,
}
