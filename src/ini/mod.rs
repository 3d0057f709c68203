mod constants;
mod document;
mod ini_file;
mod scanner;

pub use self::constants::*;
pub use self::document::{Document, EntryKey, EntryValue, LookupError, Section, SectionKey};
pub use self::ini_file::{IniFile, LoadError};
pub use self::scanner::{
    InvalidToken, ParseError, ScanError, ScanOutcome, ScanState, Scanner, Step, Target, Triple,
};
