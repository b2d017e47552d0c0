//! Request and response bodies
//!
//! Requests are validated at the boundary: unknown fields, wrong types and
//! conflicting expiry options are rejected before anything is stored.

use cinder_core::UnixMillis;
use cinder_paste::{CreatedPaste, Expiry, ExpiryPreset, NewPaste, PasteView};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// `POST /api/pastes`
#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreatePasteRequest {
    /// `base64(nonce || ciphertext || tag)`
    pub content: String,
    /// Absolute expiry in epoch milliseconds
    #[serde(default)]
    pub expires_at: Option<UnixMillis>,
    /// Named expiry window, exclusive with `expiresAt`
    #[serde(default)]
    pub expiry: Option<ExpiryPreset>,
    #[serde(default)]
    pub burn_after_read: bool,
    #[serde(default)]
    pub password: Option<String>,
}

impl CreatePasteRequest {
    pub fn into_new_paste(self) -> Result<NewPaste, ApiError> {
        let expiry = match (self.expires_at, self.expiry) {
            (Some(_), Some(_)) => {
                return Err(ApiError::BadRequest(
                    "expiresAt and expiry are mutually exclusive".into(),
                ));
            }
            (Some(at), None) => Expiry::At(at),
            (None, Some(preset)) => Expiry::from(preset),
            (None, None) => Expiry::Never,
        };

        Ok(NewPaste {
            content: self.content,
            expiry,
            burn_after_read: self.burn_after_read,
            password: self.password,
        })
    }
}

/// `201` body for a created paste
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePasteResponse {
    pub id: String,
    /// Page URL without the key; the client appends `#<key>`
    pub url: String,
    pub expires_at: Option<UnixMillis>,
}

impl CreatePasteResponse {
    pub fn new(created: &CreatedPaste, origin: &str) -> Self {
        Self {
            id: created.id.to_string(),
            url: format!("{}/{}", origin.trim_end_matches('/'), created.id),
            expires_at: created.expires_at,
        }
    }
}

/// Query string for `GET /api/pastes/{id}`
#[derive(Debug, Default, Deserialize)]
pub struct ReadQuery {
    #[serde(default)]
    pub password: Option<String>,
}

/// `200` body for a read; never carries the password hash
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasteResponse {
    pub content: String,
    pub burn_after_read: bool,
    pub created_at: UnixMillis,
    pub expires_at: Option<UnixMillis>,
    pub views: u64,
}

impl From<PasteView> for PasteResponse {
    fn from(view: PasteView) -> Self {
        Self {
            content: view.content,
            burn_after_read: view.burn_after_read,
            created_at: view.created_at,
            expires_at: view.expires_at,
            views: view.views,
        }
    }
}

/// `DELETE /api/pastes/{id}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub success: bool,
}

/// Error body for every non-2xx response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub requires_password: bool,
}
