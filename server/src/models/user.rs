use serde::{Deserialize, Serialize};

/// Placeholder user row shown on the users page. There is no users table
/// yet; rows come from `users::mock_users`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: String,
    pub status: String,
    pub last_active: String,
}

impl DashboardUser {
    pub fn is_active(&self) -> bool {
        self.status == "Active"
    }
}
