//! Request and response bodies for the backend API.
//!
//! Cart lines themselves use the shared [`gosporty_core::CartItem`] shape;
//! these are the remaining envelopes.

use gosporty_core::{LineKey, UserId};
use serde::{Deserialize, Serialize};

/// Body of `PUT /cart/update`.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateQuantityRequest<'a> {
    #[serde(flatten)]
    pub line: &'a LineKey,
    pub qty: u32,
}

/// Body of `POST /login` responses.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    /// Bare JWT, sent back as `Authorization: Bearer <token>`.
    pub token: String,
    #[serde(default)]
    pub user: Option<LoginUser>,
}

/// The user returned alongside a login token.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginUser {
    #[serde(rename = "_id")]
    pub id: UserId,
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_admin: bool,
}

/// Error envelope used by the backend: `{ "error": "..." }`.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(alias = "message")]
    pub error: String,
}
