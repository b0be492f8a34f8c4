use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity carried inside the token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenUser {
    pub id: Uuid,
}

/// JWT payload: `{ "user": { "id": ... }, "iat": ..., "exp": ... }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user: TokenUser,
    pub iat: i64, // issued at (unix timestamp)
    pub exp: i64, // expires at (unix timestamp)
}
