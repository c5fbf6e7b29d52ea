use serde::{Deserialize, Serialize};

/// Shape of one result column reported by query validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub col_name: String,
    /// Declared store type, e.g. `INTEGER`. Empty for computed expressions.
    pub data_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlValidationResponse {
    pub columns: Vec<ColumnInfo>,
    pub count: i64,
}
