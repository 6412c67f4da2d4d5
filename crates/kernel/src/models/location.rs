//! Administrative locations: provinces and their districts.

use serde::{Deserialize, Serialize};

/// Province, keyed by its administrative code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Province {
    pub code: String,
    pub name: String,
}

/// District, keyed by its administrative code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct District {
    pub code: String,
    pub name: String,
    /// Identifier used by the GHN shipping service.
    pub ghn_ref_id: i64,
    pub province_code: String,
}
