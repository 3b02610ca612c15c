//! Identifier types shared by the stores and the REST API.
//!
//! Records are addressed by small integer IDs everywhere outside the primary
//! document store. The document store assigns each document a [NativeId],
//! which is mapped onto the integer ID space with [NativeId::to_database_id].

use std::{
    fmt::Display,
    str::FromStr,
    sync::{
        LazyLock,
        atomic::{AtomicU32, Ordering},
    },
    time::{SystemTime, UNIX_EPOCH},
};

use crate::Error;

/// Alias for the integer type used for mapping to database IDs.
pub type DatabaseId = i64;

/// The integer ID of a transaction.
pub type TransactionId = DatabaseId;

/// The number of bytes in a [NativeId].
const NATIVE_ID_LEN: usize = 12;

/// The width of a [NativeId] rendered as hex.
const NATIVE_ID_HEX_LEN: usize = NATIVE_ID_LEN * 2;

/// Per-process base for the leading bytes of generated native IDs.
static NATIVE_ID_BASE: LazyLock<u32> = LazyLock::new(rand::random);

static NATIVE_ID_COUNTER: AtomicU32 = AtomicU32::new(0);

/// The opaque identifier the document store assigns to each document.
///
/// Rendered as 24 lowercase hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeId([u8; NATIVE_ID_LEN]);

impl NativeId {
    /// Generate a fresh native ID.
    ///
    /// The leading four bytes come from a per-process random base plus a
    /// counter, so IDs generated by the same process never share them until the
    /// counter wraps. They are followed by the unix timestamp in seconds and
    /// four random bytes.
    pub fn generate() -> Self {
        let count = NATIVE_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
        let prefix = NATIVE_ID_BASE.wrapping_add(count);
        let seconds = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs() as u32)
            .unwrap_or_default();
        let suffix: u32 = rand::random();

        let mut bytes = [0; NATIVE_ID_LEN];
        bytes[0..4].copy_from_slice(&prefix.to_be_bytes());
        bytes[4..8].copy_from_slice(&seconds.to_be_bytes());
        bytes[8..12].copy_from_slice(&suffix.to_be_bytes());

        Self(bytes)
    }

    /// The integer ID for this native ID: its leading four bytes read as an
    /// unsigned big-endian integer.
    ///
    /// This is not injective, two native IDs sharing a prefix map to the same
    /// integer ID.
    pub fn to_database_id(&self) -> DatabaseId {
        u32::from_be_bytes([self.0[0], self.0[1], self.0[2], self.0[3]]) as DatabaseId
    }

    /// Guess the native ID for an integer `id` by left-padding its decimal
    /// form with zeros and reading the result as hex.
    ///
    /// This is only an exact inverse for documents whose native ID was written
    /// in that padded form.
    ///
    /// # Errors
    /// Returns [Error::MalformedNativeId] if the padded string is not valid hex,
    /// e.g. for negative IDs.
    pub fn from_database_id(id: DatabaseId) -> Result<Self, Error> {
        format!("{id:0>NATIVE_ID_HEX_LEN$}").parse()
    }
}

impl FromStr for NativeId {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        if text.len() != NATIVE_ID_HEX_LEN || !text.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::MalformedNativeId(text.to_owned()));
        }

        let mut bytes = [0; NATIVE_ID_LEN];

        for (index, byte) in bytes.iter_mut().enumerate() {
            let pair = &text[index * 2..index * 2 + 2];
            *byte = u8::from_str_radix(pair, 16)
                .map_err(|_| Error::MalformedNativeId(text.to_owned()))?;
        }

        Ok(Self(bytes))
    }
}

impl Display for NativeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }

        Ok(())
    }
}
