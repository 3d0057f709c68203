/// Name under which entries declared before any section header are stored.
/// Empty section names are rejected by the grammar, so this never collides
/// with a declared section.
pub const DEFAULT_SECTION: &str = "";

pub const ASSIGN_CHAR: char = '=';
pub const COMMENT_CHAR: char = ';';
pub const ESCAPE_CHAR: char = '\\';
pub const SECTION_START: char = '[';
pub const SECTION_END: char = ']';

/// Dropped by the scanner wherever they appear, even after a backslash
pub const DISCARDED_CHARS: [char; 4] = ['\t', '\r', '\x0b', '\x0c'];

/// Characters that have to be escaped to appear literally inside a token
pub const ESCAPED_CHARS: [char; 5] = [
    ESCAPE_CHAR,
    COMMENT_CHAR,
    ASSIGN_CHAR,
    SECTION_START,
    SECTION_END,
];

/// Only drop-in files with this extension are merged
pub const DROPIN_EXTENSION: &str = "conf";
