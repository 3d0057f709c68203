use std::collections::HashMap;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};

use log::debug;
use walkdir::WalkDir;

use super::constants::DROPIN_EXTENSION;
use super::document::Document;
use super::scanner::ParseError;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read {path:?}: {source}")]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{path:?}:{source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },
}

/// A [`Document`] loaded from a file
#[derive(Debug, Default, PartialEq)]
pub struct IniFile {
    pub(crate) path: PathBuf,
    document: Document,
}

impl Deref for IniFile {
    type Target = Document;

    fn deref(&self) -> &Self::Target {
        &self.document
    }
}

impl DerefMut for IniFile {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.document
    }
}

impl IniFile {
    pub fn new() -> Self {
        IniFile {
            path: PathBuf::new(),
            document: Document::new(),
        }
    }

    pub fn load_from_path(path: &Path) -> Result<Self, LoadError> {
        let mut file = Self::new();
        file.load(path)?;

        Ok(file)
    }

    /// Replaces the loaded document with the content of `path`.
    ///
    /// The file is decoded as UTF-8; invalid byte sequences are replaced with
    /// U+FFFD instead of failing the load.
    pub fn load(&mut self, path: &Path) -> Result<(), LoadError> {
        debug!("Loading {path:?}");

        self.path = path.into();
        let buf = fs::read(path).map_err(|e| LoadError::SourceUnavailable {
            path: path.into(),
            source: e,
        })?;

        self.document.load(&String::from_utf8_lossy(&buf)).map_err(|e| LoadError::Parse {
            path: path.into(),
            source: e,
        })
    }

    /// Merges `*.conf` files from `<source_path>/<file name>.d/` on top of the
    /// loaded document.
    ///
    /// This lets a packaged base file stay untouched while local overrides
    /// live in separate files, e.g. `/etc/app/app.ini.d/50-local.conf` layered
    /// over a vendor `app.ini`.
    ///
    /// If several source paths contain a drop-in with the same name, only the
    /// one found first is used. Drop-ins are merged in alpha-numerical order.
    pub fn load_dropins_from<'i, I: IntoIterator<Item = &'i Path>>(
        &mut self,
        source_paths: I,
    ) -> Result<(), LoadError> {
        let mut dropin_dir_name = match self.path.file_name() {
            Some(name) => name.to_os_string(),
            None => return Ok(()),
        };
        dropin_dir_name.push(".d");

        let mut dropin_paths: HashMap<OsString, PathBuf> = HashMap::new();

        for source_path in source_paths {
            let dropin_dir = source_path.join(&dropin_dir_name);

            for entry in WalkDir::new(&dropin_dir).min_depth(1).max_depth(1) {
                let dropin_file = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        if let Some(io_error) = e.io_error() {
                            match io_error.kind() {
                                io::ErrorKind::NotFound => {} // ignore missing drop-in directories
                                _ => {
                                    return Err(LoadError::SourceUnavailable {
                                        path: dropin_dir,
                                        source: e.into(),
                                    })
                                }
                            }
                        }
                        continue;
                    }
                };

                if dropin_file.file_type().is_dir()
                    || dropin_file.path().extension().unwrap_or_default() != DROPIN_EXTENSION
                {
                    continue;
                }

                let dropin_name = dropin_file.file_name();
                if dropin_paths.contains_key(dropin_name) {
                    // We already saw this name
                    continue;
                }

                dropin_paths.insert(dropin_name.to_owned(), dropin_file.path().to_owned());
            }
        }

        let mut dropin_files: Vec<&OsString> = dropin_paths.keys().collect();
        dropin_files.sort_unstable();

        for dropin_file in dropin_files {
            let dropin_path = &dropin_paths[dropin_file];

            debug!("Loading drop-in file {dropin_path:?}");

            let dropin = IniFile::load_from_path(dropin_path)?;
            self.document.merge_from(&dropin);
        }

        Ok(())
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}
