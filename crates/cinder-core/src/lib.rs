//! # Cinder Core
//!
//! Value types shared by every Cinder crate.
//!
//! ## Key Types
//!
//! - [`PasteId`]: Short opaque identifier naming a stored paste
//! - [`UnixMillis`]: Wall-clock timestamp in milliseconds since the epoch
//! - [`Clock`]: Time abstraction so expiry can be tested deterministically

pub mod clock;
pub mod error;
pub mod id;

pub use clock::{Clock, ManualClock, SystemClock, UnixMillis};
pub use error::IdError;
pub use id::{DEFAULT_ID_LENGTH, MAX_ID_LENGTH, MIN_ID_LENGTH, PasteId};
