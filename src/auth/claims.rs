use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT payload used for authentication.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub sub: Uuid,          // user ID
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub ver: i32,           // user's token_version at signing time
    pub iat: usize,
    pub exp: usize,
    pub iss: String,
    pub aud: String,
}
