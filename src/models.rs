use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::role::Role;

#[derive(Deserialize, ToSchema)]
pub struct RegisterReq {
    #[schema(example = "student@example.com", format = "email")]
    pub email: String,
    #[schema(example = "student123")]
    pub password: String,
    #[schema(example = "Student One")]
    pub name: String,
    /// Defaults to student. Staff roles need a warden's bearer token.
    #[serde(default)]
    pub role: Option<Role>,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginReqDto {
    #[schema(example = "warden@example.com", format = "email")]
    pub email: String,
    #[schema(example = "warden123")]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i64,
    /// Normalized email of the caller
    pub sub: String,
    pub name: String,
    pub role: Role,
    pub exp: usize,
    pub jti: String,
}
