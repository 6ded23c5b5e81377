use crate::errors::{BasaltError, BasaltResult, ErrorKind};
use chrono::{DateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use rand::Rng;
use std::fmt::{Debug, Display, Formatter};
use std::sync::atomic::{AtomicU32, Ordering};

// 5 random bytes fixed for the lifetime of the process
static PROCESS_UNIQUE: Lazy<[u8; 5]> = Lazy::new(|| rand::thread_rng().gen());

static COUNTER: Lazy<AtomicU32> =
    Lazy::new(|| AtomicU32::new(rand::thread_rng().gen_range(0..0x00ff_ffff)));

/// A 12-byte identifier assigned to documents that are inserted without an
/// `_id`.
///
/// # Layout
///
/// | bytes | content                                   |
/// |-------|-------------------------------------------|
/// | 0..4  | seconds since the Unix epoch, big-endian  |
/// | 4..9  | random value, fixed per process           |
/// | 9..12 | counter, big-endian, random start         |
///
/// Ids generated by one process therefore sort by creation second and are
/// unique within it.
///
/// # Examples
///
/// ```rust,ignore
/// use basalt::collection::ObjectId;
///
/// let id = ObjectId::new();
/// let parsed = ObjectId::parse_str(&id.to_hex())?;
/// assert_eq!(id, parsed);
/// ```
#[derive(PartialEq, Eq, Ord, PartialOrd, Hash, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ObjectId {
    bytes: [u8; 12],
}

impl ObjectId {
    /// Generates a new unique `ObjectId`.
    pub fn new() -> Self {
        let timestamp = Utc::now().timestamp() as u32;
        let counter = COUNTER.fetch_add(1, Ordering::SeqCst) & 0x00ff_ffff;

        let mut bytes = [0u8; 12];
        bytes[0..4].copy_from_slice(&timestamp.to_be_bytes());
        bytes[4..9].copy_from_slice(&*PROCESS_UNIQUE);
        bytes[9..12].copy_from_slice(&counter.to_be_bytes()[1..4]);
        ObjectId { bytes }
    }

    /// Creates an `ObjectId` from its raw bytes.
    pub fn from_bytes(bytes: [u8; 12]) -> Self {
        ObjectId { bytes }
    }

    /// Parses a 24 character hexadecimal string.
    ///
    /// # Errors
    ///
    /// Returns [ErrorKind::InvalidId] if the string has the wrong length or
    /// contains non-hex characters.
    pub fn parse_str(hex: &str) -> BasaltResult<ObjectId> {
        if hex.len() != 24 || !hex.is_ascii() {
            log::error!("Invalid ObjectId string: {}", hex);
            return Err(BasaltError::new(
                &format!("Invalid ObjectId string '{}': expected 24 hex characters", hex),
                ErrorKind::InvalidId,
            ));
        }

        let mut bytes = [0u8; 12];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)?;
        }
        Ok(ObjectId { bytes })
    }

    pub fn bytes(&self) -> [u8; 12] {
        self.bytes
    }

    /// Creation time encoded in the first four bytes.
    pub fn timestamp(&self) -> DateTime<Utc> {
        let seconds = u32::from_be_bytes([self.bytes[0], self.bytes[1], self.bytes[2], self.bytes[3]]);
        Utc.timestamp_opt(seconds as i64, 0)
            .single()
            .unwrap_or_default()
    }

    /// Lowercase hexadecimal form.
    pub fn to_hex(&self) -> String {
        self.bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for ObjectId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Debug for ObjectId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ObjectId(\"{}\")", self.to_hex())
    }
}
