// document constants
pub const DOC_ID: &str = "_id";
pub const DOC_EXPIRES_AT: &str = "_expiresAt";
pub const RESERVED_FIELDS: [&str; 2] = [DOC_ID, DOC_EXPIRES_AT];

// sentinel returned by ttl() when a document never expires
pub const NO_EXPIRATION_MILLIS: i64 = -1;

// index key constants
pub const INDEX_KEY_PREFIX: &[u8] = b"$idx";
pub const KEY_SEPARATOR: u8 = 0x00;
pub const ESCAPE_MARKER: u8 = 0xFF;

// index value type tags
pub const TAG_NULL: u8 = 0x10;
pub const TAG_BOOL: u8 = 0x20;
pub const TAG_NUMBER: u8 = 0x30;
pub const TAG_STRING: u8 = 0x50;
pub const TAG_BYTES: u8 = 0x60;
pub const TAG_INSTANT: u8 = 0x70;
pub const TAG_GEO: u8 = 0x80;

