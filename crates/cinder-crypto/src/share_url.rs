//! Share links carrying the key in the URL fragment
//!
//! A share link is `<origin>/<id>#<url-safe key>`. Browsers never send the
//! fragment with a request, so the server sees only `<origin>/<id>`.

use cinder_core::PasteId;

use crate::error::CryptoResult;
use crate::key::SymmetricKey;

/// A parsed share link
#[derive(Debug, Clone)]
pub struct ShareLink {
    /// Everything before the fragment; safe to request from the server
    pub page_url: String,
    /// Paste id taken from the last path segment, if it is a valid id
    pub paste_id: Option<PasteId>,
    /// Key from the fragment, if one is present
    pub key: Option<SymmetricKey>,
}

impl ShareLink {
    /// Build `<origin>/<id>#<key>`
    pub fn build(origin: &str, id: &PasteId, key: &SymmetricKey) -> String {
        format!(
            "{}/{}#{}",
            origin.trim_end_matches('/'),
            id,
            key.to_url_fragment()
        )
    }

    /// Parse a share link
    ///
    /// A missing or empty fragment yields `key: None`; a fragment that is
    /// present but malformed is a `KeyFormat` error.
    pub fn parse(url: &str) -> CryptoResult<Self> {
        let (page_url, fragment) = match url.split_once('#') {
            Some((page, fragment)) => (page, Some(fragment)),
            None => (url, None),
        };

        let key = match fragment.filter(|f| !f.is_empty()) {
            Some(fragment) => Some(SymmetricKey::from_url_fragment(fragment)?),
            None => None,
        };

        let path = page_url.split('?').next().unwrap_or_default();
        let paste_id = path
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .and_then(|segment| PasteId::parse(segment).ok());

        Ok(Self {
            page_url: page_url.to_string(),
            paste_id,
            key,
        })
    }

    /// Extract only the key from a share link
    ///
    /// Returns `Ok(None)` when the link has no fragment, meaning the caller
    /// cannot decrypt.
    pub fn extract_key(url: &str) -> CryptoResult<Option<SymmetricKey>> {
        Ok(Self::parse(url)?.key)
    }
}
