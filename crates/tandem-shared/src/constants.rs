/// Length of the human-shareable pairing code.
pub const PAIRING_CODE_LEN: usize = 8;

/// Pairing-code alphabet.  Excludes 0/O/1/I/L to avoid transcription errors
/// when codes are read aloud or typed from a partner's screen.
pub const PAIRING_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

/// Absolute time-to-live of a streak photo, in hours.
pub const STREAK_PHOTO_TTL_HOURS: i64 = 24;

/// Maximum number of live (unexpired) streak photos per uploader.
pub const MAX_LIVE_ITEMS_PER_UPLOADER: i64 = 3;

/// Hard length cap on an anonymous breakup note.
pub const MAX_BREAKUP_NOTE_LEN: usize = 500;

/// Maximum chat message length in characters.
pub const MAX_MESSAGE_LEN: usize = 2000;

/// Maximum mood status length in characters.
pub const MAX_MOOD_LEN: usize = 80;

/// Maximum length of an opaque content reference (photo / voice hosting key).
pub const MAX_CONTENT_REF_LEN: usize = 512;

/// Maximum memory title length in characters.
pub const MAX_MEMORY_TITLE_LEN: usize = 120;

/// Maximum memory body length in characters.
pub const MAX_MEMORY_BODY_LEN: usize = 4000;

/// Default HTTP API port (server).
pub const DEFAULT_HTTP_PORT: u16 = 8080;
