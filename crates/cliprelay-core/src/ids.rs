//! Typed ID wrappers over `Uuid`.
//!
//! [`SegmentId`] names one production event; [`ConnectionId`] names one
//! accepted producer-side socket session. Both render as the canonical
//! hyphenated lowercase form.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Generate a newtype ID wrapper over `Uuid`.
///
/// The macro produces a struct with:
/// - `new()` to create a random v4 UUID
/// - `Display` and `FromStr` delegating to the inner UUID
/// - `From<Uuid>` and `Into<Uuid>` conversions
/// - `Default` that generates a new random ID
macro_rules! typed_id {
    ($($(#[doc = $doc:expr])* $name:ident),+ $(,)?) => {
        $(
            $(#[doc = $doc])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
            #[serde(transparent)]
            pub struct $name(Uuid);

            impl $name {
                /// Create a new random ID.
                #[must_use]
                pub fn new() -> Self {
                    Self(Uuid::new_v4())
                }

                /// Return the inner UUID value.
                #[must_use]
                pub fn as_uuid(&self) -> &Uuid {
                    &self.0
                }
            }

            impl Default for $name {
                fn default() -> Self {
                    Self::new()
                }
            }

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "{}", self.0)
                }
            }

            impl FromStr for $name {
                type Err = uuid::Error;

                fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                    Uuid::parse_str(s).map(Self)
                }
            }

            impl From<Uuid> for $name {
                fn from(uuid: Uuid) -> Self {
                    Self(uuid)
                }
            }

            impl From<$name> for Uuid {
                fn from(id: $name) -> Self {
                    id.0
                }
            }
        )+
    };
}

typed_id! {
    /// Unique identifier for a captured segment.
    SegmentId,
    /// Unique identifier for an accepted producer connection.
    ConnectionId,
}

/// Length of a segment id on the wire.
pub const SEGMENT_ID_LEN: usize = 16;

impl SegmentId {
    /// Decode from the 16-byte GUID layout used on the wire
    /// (first three fields little-endian).
    #[must_use]
    pub fn from_wire_bytes(bytes: [u8; SEGMENT_ID_LEN]) -> Self {
        Self(Uuid::from_bytes_le(bytes))
    }

    /// Encode into the 16-byte GUID layout used on the wire.
    #[must_use]
    pub fn to_wire_bytes(&self) -> [u8; SEGMENT_ID_LEN] {
        self.0.to_bytes_le()
    }
}
