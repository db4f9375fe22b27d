use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Public user representation; `is_subscribed` is relative to the viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserView {
    pub email: String,
    pub id: Uuid,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
}

#[derive(Debug, Deserialize)]
pub struct SetPasswordRequest {
    pub current_password: String,
    pub new_password: String,
}
