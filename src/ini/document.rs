use log::{debug, trace};
use ordered_multimap::ListOrderedMultimap;

use std::io;

use super::constants::*;
use super::scanner::{ParseError, ScanOutcome, ScanState, Triple};

pub type SectionKey = String;
pub type EntryKey = String;
pub type EntryValue = String;

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum LookupError {
    #[error("section {0:?} not found")]
    SectionNotFound(SectionKey),
    #[error("key {key:?} not found in section {section:?}")]
    KeyNotFound { section: SectionKey, key: EntryKey },
}

/// Key/value pairs of one section. Keys are unique, setting an existing key
/// replaces its value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Section {
    pub(crate) entries: ListOrderedMultimap<EntryKey, EntryValue>,
}

impl Section {
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Iterates over entries in the order their keys were first declared
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.entries.keys_len()
    }

    fn set(&mut self, key: EntryKey, value: EntryValue) {
        self.entries.insert(key, value);
    }
}

/// A parsed configuration document
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Document {
    pub(crate) sections: ListOrderedMultimap<SectionKey, Section>,
}

impl Document {
    pub fn new() -> Self {
        Self {
            sections: Default::default(),
        }
    }

    /// Parse `data` into a new document
    pub fn load_from_str(data: &str) -> Result<Self, ParseError> {
        let mut doc = Self::new();
        doc.load(data)?;

        Ok(doc)
    }

    /// Replaces the content of this document with what's parsed from `data`.
    ///
    /// On error the document is left in an unspecified, partially loaded state.
    pub fn load(&mut self, data: &str) -> Result<(), ParseError> {
        self.sections.clear();

        let mut state = ScanState::new();
        for (i, line) in data.lines().enumerate() {
            match state.scan_line(i + 1, line)? {
                ScanOutcome::Triple(Triple {
                    section,
                    key,
                    value,
                }) => {
                    trace!("{section:?}: {key:?} = {value:?}");
                    self.set(section, key, value);
                }
                ScanOutcome::NoTriple => {}
            }
        }

        debug!("Loaded {} section(s)", self.len());

        Ok(())
    }

    /// Look up `key` in the default section
    pub fn get(&self, key: &str) -> Result<&str, LookupError> {
        self.get_in(DEFAULT_SECTION, key)
    }

    /// Look up `key` in `section`
    pub fn get_in(&self, section: &str, key: &str) -> Result<&str, LookupError> {
        self.section(section)
            .ok_or_else(|| LookupError::SectionNotFound(section.to_owned()))?
            .get(key)
            .ok_or_else(|| LookupError::KeyNotFound {
                section: section.to_owned(),
                key: key.to_owned(),
            })
    }

    pub fn has_key(&self, section: &str, key: &str) -> bool {
        self.section(section)
            .map_or(false, |s| s.contains_key(key))
    }

    pub fn has_section(&self, name: &str) -> bool {
        self.sections.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Iterates over sections in the order they were first declared
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Section)> {
        self.sections.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of sections, including the default section if it has entries
    pub fn len(&self) -> usize {
        self.sections.keys_len()
    }

    /// Merges all entries of `other` into this document, values from `other`
    /// win
    pub fn merge_from(&mut self, other: &Document) {
        for (section, entries) in other.iter() {
            for (key, value) in entries.iter() {
                self.set(section, key, value);
            }
        }
    }

    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.get(name)
    }

    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.iter().map(|(name, _)| name)
    }

    /// Sets `key=value` in `section`, creating the section if necessary
    pub fn set<S, K, V>(&mut self, section: S, key: K, value: V)
    where
        S: Into<String>,
        K: Into<String>,
        V: Into<String>,
    {
        self.sections
            .entry(section.into())
            .or_insert_entry(Section::default())
            .into_mut()
            .set(key.into(), value.into());
    }

    /// Serializes the document, escaping structural characters.
    ///
    /// Entries of the default section come first, without a header. Spaces
    /// and control characters inside keys and values can't be expressed in the
    /// format and will be lost when reading the output back.
    ///
    /// Fails with [`io::ErrorKind::InvalidInput`] before writing anything if
    /// the document holds something that would not load back: a key that is
    /// empty once whitespace is dropped, a section name containing control
    /// characters, or a line break anywhere.
    pub fn write_to<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        self.check_writable()?;

        if let Some(default) = self.section(DEFAULT_SECTION) {
            for (k, v) in default.iter() {
                writeln!(writer, "{}={}", escape(k), escape(v))?;
            }
            writeln!(writer)?;
        }

        for (section, entries) in self.iter() {
            if section == DEFAULT_SECTION {
                continue;
            }
            writeln!(writer, "[{}]", escape(section))?;
            for (k, v) in entries.iter() {
                writeln!(writer, "{}={}", escape(k), escape(v))?;
            }
            writeln!(writer)?;
        }

        Ok(())
    }

    fn check_writable(&self) -> io::Result<()> {
        let invalid = |msg: String| io::Error::new(io::ErrorKind::InvalidInput, msg);

        for (section, entries) in self.iter() {
            if section
                .chars()
                .any(|c| c == '\n' || DISCARDED_CHARS.contains(&c))
            {
                return Err(invalid(format!(
                    "section name {section:?} contains control characters"
                )));
            }

            for (k, v) in entries.iter() {
                if !k.chars().any(|c| c != ' ' && !DISCARDED_CHARS.contains(&c)) {
                    return Err(invalid(format!(
                        "key {k:?} in section {section:?} is empty without whitespace"
                    )));
                }
                if k.contains('\n') || v.contains('\n') {
                    return Err(invalid(format!(
                        "entry {k:?} in section {section:?} contains a line break"
                    )));
                }
            }
        }

        Ok(())
    }
}

fn escape(s: &str) -> String {
    let mut res = String::with_capacity(s.len());
    for c in s.chars() {
        if ESCAPED_CHARS.contains(&c) {
            res.push(ESCAPE_CHAR);
        }
        res.push(c);
    }
    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ini::scanner::{InvalidToken, ScanError};

    mod load {
        use super::*;

        #[test]
        fn example_document() {
            let data = "default_key = 1
[server]
host = localhost ; comment
port = 8080";

            let doc = Document::load_from_str(data).unwrap();

            assert_eq!(doc.len(), 2);
            assert_eq!(doc.get("default_key"), Ok("1"));
            assert_eq!(doc.get_in("server", "host"), Ok("localhost"));
            assert_eq!(doc.get_in("server", "port"), Ok("8080"));
            assert_eq!(
                doc.get_in("server", "missing"),
                Err(LookupError::KeyNotFound {
                    section: "server".into(),
                    key: "missing".into(),
                })
            );
        }

        #[test]
        fn only_comments_and_blank_lines_create_empty_document() {
            let data = "; foo

   \t
; [bar]
";

            let doc = Document::load_from_str(data).unwrap();

            assert!(doc.is_empty());
        }

        #[test]
        fn bare_section_header_creates_no_section() {
            let doc = Document::load_from_str("[empty]").unwrap();

            assert!(!doc.has_section("empty"));
            assert_eq!(
                doc.get_in("empty", "key"),
                Err(LookupError::SectionNotFound("empty".into()))
            );
        }

        #[test]
        fn same_section_occurring_multiple_times_is_merged() {
            let data = "[Section A]
KeyOne = value1
KeyTwo = value2
[Section B]
KeyOne = other
[Section A]
KeyOne = value1.2
KeyThree = value3";

            let doc = Document::load_from_str(data).unwrap();

            assert_eq!(doc.len(), 2);
            let section = doc.section("Section A").unwrap();
            assert_eq!(section.len(), 3);
            assert_eq!(section.get("KeyOne"), Some("value1.2"));
            assert_eq!(section.get("KeyTwo"), Some("value2"));
            assert_eq!(section.get("KeyThree"), Some("value3"));
            assert_eq!(doc.get_in("Section B", "KeyOne"), Ok("other"));
        }

        #[test]
        fn section_names_keep_spaces_and_escapes() {
            let data = "[my section]
a = 1
[a\\]b]
b = 2";

            let doc = Document::load_from_str(data).unwrap();

            assert_eq!(doc.get_in("my section", "a"), Ok("1"));
            assert_eq!(doc.get_in("a]b", "b"), Ok("2"));
        }

        #[test]
        fn entries_before_a_header_go_to_default_section() {
            let data = "a = 1
[s]
a = 2";

            let doc = Document::load_from_str(data).unwrap();

            assert_eq!(doc.get("a"), Ok("1"));
            assert_eq!(doc.get_in(DEFAULT_SECTION, "a"), Ok("1"));
            assert_eq!(doc.get_in("s", "a"), Ok("2"));
        }

        #[test]
        fn escaped_values_round_trip() {
            let doc = Document::load_from_str("note = a\\;b\npath = C:\\\\dir").unwrap();

            assert_eq!(doc.get("note"), Ok("a;b"));
            assert_eq!(doc.get("path"), Ok("C:\\dir"));
        }

        #[test]
        fn crlf_line_endings() {
            let doc = Document::load_from_str("[s]\r\na = 1\r\nb = 2\r\n").unwrap();

            assert_eq!(doc.get_in("s", "a"), Ok("1"));
            assert_eq!(doc.get_in("s", "b"), Ok("2"));
        }

        #[test]
        fn replaces_previous_content() {
            let mut doc = Document::load_from_str("a = 1").unwrap();

            doc.load("[s]\nb = 2").unwrap();

            assert_eq!(doc.get("a"), Err(LookupError::SectionNotFound("".into())));
            assert_eq!(doc.get_in("s", "b"), Ok("2"));
        }

        #[test]
        fn empty_key_fails_with_position() {
            let err = Document::load_from_str("a = 1\n\n  = 2").unwrap_err();

            assert_eq!(
                err,
                ParseError {
                    line: 3,
                    col: 3,
                    kind: ScanError::InvalidToken(InvalidToken::EmptyKey),
                }
            );
        }

        #[test]
        fn unterminated_section_header_fails() {
            let err = Document::load_from_str("a = 1\n[abc\nb = 2").unwrap_err();

            assert_eq!(err.line(), 2);
            assert_eq!(err.kind(), &ScanError::IncompleteLine);
        }

        #[test]
        fn stops_at_first_error() {
            let err = Document::load_from_str("x[y]\n=z").unwrap_err();

            assert_eq!(err.line(), 1);
            assert_eq!(
                err.kind(),
                &ScanError::InvalidToken(InvalidToken::MisplacedSectionStart)
            );
        }
    }

    mod get {
        use super::*;

        #[test]
        fn missing_default_section() {
            let doc = Document::load_from_str("[s]\na = 1").unwrap();

            assert_eq!(
                doc.get("a"),
                Err(LookupError::SectionNotFound(DEFAULT_SECTION.into()))
            );
        }

        #[test]
        fn no_partial_matches() {
            let doc = Document::load_from_str("[server]\nport = 1").unwrap();

            assert!(doc.get_in("serv", "port").is_err());
            assert!(doc.get_in("server", "por").is_err());
            assert!(doc.get_in("Server", "port").is_err());
        }

        #[test]
        fn has_key_and_contains_key() {
            let doc = Document::load_from_str("a = 1\n[server]\nport = 1").unwrap();

            assert!(doc.has_key(DEFAULT_SECTION, "a"));
            assert!(doc.has_key("server", "port"));
            assert!(!doc.has_key("server", "a"));
            assert!(!doc.has_key("missing", "port"));

            let server = doc.section("server").unwrap();
            assert!(server.contains_key("port"));
            assert!(!server.contains_key("host"));
        }
    }

    mod merge_from {
        use super::*;

        #[test]
        fn other_values_win() {
            let mut doc = Document::load_from_str("a = 1\n[s]\nb = 2\nc = 3").unwrap();
            let other = Document::load_from_str("[s]\nb = 20\n[t]\nd = 4").unwrap();

            doc.merge_from(&other);

            assert_eq!(doc.get("a"), Ok("1"));
            assert_eq!(doc.get_in("s", "b"), Ok("20"));
            assert_eq!(doc.get_in("s", "c"), Ok("3"));
            assert_eq!(doc.get_in("t", "d"), Ok("4"));
            assert_eq!(doc.section_names().collect::<Vec<_>>(), vec!["", "s", "t"]);
        }
    }

    mod write_to {
        use super::*;

        #[test]
        fn default_section_first() {
            let mut doc = Document::new();
            doc.set("s", "b", "2");
            doc.set(DEFAULT_SECTION, "a", "1");

            let mut output: Vec<u8> = Vec::new();
            doc.write_to(&mut output).unwrap();

            assert_eq!(std::str::from_utf8(&output).unwrap(), "a=1\n\n[s]\nb=2\n\n");
        }

        #[test]
        fn escaped_output_reads_back() {
            let mut doc = Document::new();
            doc.set("a]b", "k=1", "x;y[z]\\");
            doc.set("plain", "key", "");

            let mut output: Vec<u8> = Vec::new();
            doc.write_to(&mut output).unwrap();
            let written = std::str::from_utf8(&output).unwrap();

            assert_eq!(
                written,
                "[a\\]b]\nk\\=1=x\\;y\\[z\\]\\\\\n\n[plain]\nkey=\n\n"
            );
            assert_eq!(Document::load_from_str(written), Ok(doc));
        }

        fn assert_rejected(doc: &Document) {
            let mut output: Vec<u8> = Vec::new();
            let err = doc.write_to(&mut output).unwrap_err();

            assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
            assert!(output.is_empty());
        }

        #[test]
        fn empty_key_is_rejected() {
            let mut doc = Document::new();
            doc.set("s", "ok", "1");
            doc.set("s", "", "v");

            assert_rejected(&doc);
        }

        #[test]
        fn whitespace_only_key_is_rejected() {
            let mut doc = Document::new();
            doc.set(DEFAULT_SECTION, " \t ", "v");

            assert_rejected(&doc);
        }

        #[test]
        fn section_name_with_control_characters_is_rejected() {
            let mut doc = Document::new();
            doc.set("\t", "k", "v");
            assert_rejected(&doc);

            let mut doc = Document::new();
            doc.set("a\tb", "k", "v");
            assert_rejected(&doc);
        }

        #[test]
        fn line_break_is_rejected() {
            let mut doc = Document::new();
            doc.set("s", "k", "a\nb");

            assert_rejected(&doc);
        }

        #[test]
        fn section_name_of_spaces_reads_back() {
            let mut doc = Document::new();
            doc.set(" ", "k", "v");

            let mut output: Vec<u8> = Vec::new();
            doc.write_to(&mut output).unwrap();
            let written = std::str::from_utf8(&output).unwrap();

            assert_eq!(Document::load_from_str(written), Ok(doc));
        }
    }
}
