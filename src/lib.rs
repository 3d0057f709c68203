//! Strict parser for `[section]` / `key = value` configuration files.
//!
//! ```
//! use ini_scan::Document;
//!
//! let doc = Document::load_from_str("name = demo\n[server]\nport = 8080 ; http").unwrap();
//! assert_eq!(doc.get("name"), Ok("demo"));
//! assert_eq!(doc.get_in("server", "port"), Ok("8080"));
//! ```

mod ini;

pub use self::ini::*;
