//! Request/response payloads for auth endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::storage::UserRecord;

#[derive(Deserialize, ToSchema, Debug, Default)]
pub struct SendCodeRequest {
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Serialize, ToSchema, Debug)]
pub struct SendCodeResponse {
    pub message: String,
    pub email: String,
}

/// Body shared by `verify-otp` and `mobile-login`.
#[derive(Deserialize, ToSchema, Debug, Default)]
pub struct CodeRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub otp: Option<String>,
}

#[derive(Serialize, ToSchema, Clone, Debug, PartialEq, Eq)]
pub struct UserSummary {
    pub id: String,
    pub email: String,
    pub name: String,
}

impl From<&UserRecord> for UserSummary {
    fn from(user: &UserRecord) -> Self {
        Self {
            id: user.id.to_string(),
            email: user.email.clone(),
            name: user.name.clone(),
        }
    }
}

#[derive(Serialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct VerifyCodeResponse {
    pub message: String,
    pub is_new_user: bool,
    pub user: UserSummary,
}

#[derive(Serialize, ToSchema, Debug)]
pub struct MobileUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: String,
}

#[derive(Serialize, ToSchema, Debug)]
pub struct MobileLoginResponse {
    pub token: String,
    pub user: MobileUser,
}

#[derive(Deserialize, ToSchema, Debug, Default)]
pub struct UpdateNameRequest {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Serialize, ToSchema, Debug)]
pub struct UpdateNameResponse {
    pub message: String,
    pub user: UserSummary,
}

#[derive(Serialize, ToSchema, Debug)]
pub struct MessageResponse {
    pub message: String,
}
