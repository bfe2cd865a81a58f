//! Serialization strategy
//!
//! Cached values are text. The codec is injected into every store so the
//! encoding can be swapped and tested independently of the caching logic.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;

/// Literal stored for a cached negative result.
///
/// Checked before the codec runs; it is never decoded as entity data.
pub const ABSENT: &str = "null";

/// Marshals values to and from their cached text form.
pub trait Codec: Send + Sync + 'static {
    fn encode<T: Serialize>(&self, value: &T) -> Result<String>;

    fn decode<T: DeserializeOwned>(&self, raw: &str) -> Result<T>;
}

/// JSON codec backed by serde_json.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<String> {
        Ok(serde_json::to_string(value)?)
    }

    fn decode<T: DeserializeOwned>(&self, raw: &str) -> Result<T> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// True if the raw cached text is the negative-result sentinel.
pub fn is_absent(raw: &str) -> bool {
    raw == ABSENT
}
