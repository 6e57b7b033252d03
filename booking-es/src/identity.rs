use booking_es_types::StreamId;
use nutype::nutype;
use uuid::Uuid;

/// Prefix shared by every booking stream key.
pub const STREAM_PREFIX: &str = "booking-";

/// Opaque booking identity.
///
/// Generated once when a booking is created and never changed. Tokens are
/// non-empty, at most 128 characters, and limited to ASCII alphanumerics,
/// `-` and `_`, which keeps every derived stream key valid.
#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 128, predicate = is_identity_token),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        Hash,
        AsRef,
        Deref,
        Display,
        Serialize,
        Deserialize
    )
)]
pub struct BookingId(String);

fn is_identity_token(s: &str) -> bool {
    s.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

impl BookingId {
    /// Generates a fresh random identity: 32 lowercase hex digits.
    pub fn generate() -> Self {
        Self::try_new(Uuid::new_v4().simple().to_string())
            .expect("32 hex digits are always a valid booking id")
    }

    /// The key of this booking's event stream: `"booking-" + id`.
    pub fn stream_id(&self) -> StreamId {
        StreamId::try_new(format!("{STREAM_PREFIX}{self}"))
            .expect("a valid booking id always yields a valid stream id")
    }
}
