//! # Cinder Crypto
//!
//! Client-side cryptography for Cinder pastes. The server only ever sees the
//! output of [`CipherEngine::seal`]; the key travels in the URL fragment.
//!
//! ## Features
//!
//! - AES-256-GCM authenticated encryption with a fresh 96-bit nonce per call
//! - Fixed-width `nonce || ciphertext+tag` envelope, base64 on the wire
//! - Key export/import as standard base64 and as a URL-fragment-safe form
//! - Share links of the form `<origin>/<id>#<key>`
//! - Argon2id password hashes for the optional server-side password gate
//!
//! ## Example
//!
//! ```rust,ignore
//! use cinder_crypto::{CipherEngine, ShareLink, SymmetricKey};
//!
//! let key = SymmetricKey::generate();
//! let content = CipherEngine::seal("hello", &key)?;
//!
//! // `content` goes to the server, the key goes into the fragment
//! let url = ShareLink::build("https://paste.example", &id, &key);
//!
//! let key = ShareLink::extract_key(&url)?.expect("fragment present");
//! assert_eq!(CipherEngine::open(&content, &key)?, "hello");
//! ```

pub mod cipher;
pub mod error;
pub mod key;
pub mod password;
pub mod share_url;

// Re-exports
pub use cipher::{CipherEngine, EncryptedPayload, MIN_PAYLOAD_SIZE, NONCE_SIZE, TAG_SIZE};
pub use error::{CryptoError, CryptoResult};
pub use key::{KEY_SIZE, SymmetricKey, decode_key_from_url, encode_key_for_url};
pub use password::PasswordHash;
pub use share_url::ShareLink;
