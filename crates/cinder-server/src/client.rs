//! Offline client operations
//!
//! These do what the browser does: encrypt before upload and decrypt after
//! download, with the key travelling only in the URL fragment.

use cinder_core::PasteId;
use cinder_crypto::{CipherEngine, CryptoError, ShareLink, SymmetricKey};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// The link has no `#key` fragment, so there is nothing to decrypt with
    #[error("Share link carries no key; cannot decrypt")]
    MissingKey,

    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

/// Output of [`seal`]
pub struct Sealed {
    /// Value to send as `content` when creating the paste
    pub content: String,
    /// URL-safe key to append after `#`
    pub fragment: String,
    /// Full share link, when the origin and id were known
    pub share_url: Option<String>,
}

/// Encrypt `plaintext` under a freshly generated key
pub fn seal(plaintext: &str, target: Option<(&str, &PasteId)>) -> Result<Sealed, ClientError> {
    let key = SymmetricKey::generate();
    let content = CipherEngine::seal(plaintext, &key)?;
    let share_url = target.map(|(origin, id)| ShareLink::build(origin, id, &key));

    Ok(Sealed {
        content,
        fragment: key.to_url_fragment(),
        share_url,
    })
}

/// Decrypt `content` with the key carried in `share_url`
pub fn open(share_url: &str, content: &str) -> Result<String, ClientError> {
    let key = ShareLink::extract_key(share_url)?.ok_or(ClientError::MissingKey)?;
    Ok(CipherEngine::open(content, &key)?)
}
