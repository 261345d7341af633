//! Constants of the `.orbc` binary executable format.

/// File magic: `ORB` followed by the format version byte.
pub const MAGIC: [u8; 4] = *b"ORB\x01";

// Constant-pool entry tags.
pub const TAG_NULL: u8 = 0;
pub const TAG_TRUE: u8 = 1;
pub const TAG_FALSE: u8 = 2;
pub const TAG_INT: u8 = 3;
pub const TAG_FLOAT: u8 = 4;
pub const TAG_STRING: u8 = 5;
pub const TAG_FUNCTION: u8 = 6;

/// Sentinel string-table index meaning "no name".
pub const NO_NAME: u32 = u32::MAX;

// Hard limits applied while reading, so a corrupt or hostile file cannot
// drive allocations from its own length fields.
pub const MAX_STRINGS: u32 = 1 << 16;
pub const MAX_STRING_LEN: u32 = 1 << 20;
pub const MAX_PROTOS: u32 = 1 << 12;
pub const MAX_CONSTANTS: u32 = 1 << 16;
pub const MAX_CODE_LEN: u32 = 1 << 20;
