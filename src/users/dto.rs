use serde::{Deserialize, Serialize};

use super::model::User;

/// Request body for user registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Request body for setting the avatar URL.
#[derive(Debug, Deserialize)]
pub struct AvatarRequest {
    pub avatar_url: String,
}

#[derive(Debug, Serialize)]
pub struct UserList {
    pub count: usize,
    pub users: Vec<User>,
}
