//! Locating, reading and resolving the data files of a planning run.
//!
//! A data directory holds one `model` file and optionally one `config` file,
//! each in RON, TOML or JSON. Names inside the model are resolved through a
//! [`Resolver`] so that every dangling or duplicate name is reported against
//! the file it came from.

use procnet_core::error::ConfigurationError;
use procnet_orders::OrderError;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

// ===========================================================================
// Errors
// ===========================================================================

#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    #[error("no {kind} file (.ron, .toml or .json) in {dir}")]
    MissingRequired { kind: DataFile, dir: PathBuf },

    #[error("{file} is not a RON, TOML or JSON file")]
    UnsupportedFormat { file: PathBuf },

    /// The same data file exists in two formats.
    #[error("both {a} and {b} exist")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    #[error("unresolved {expected_kind} reference '{name}' in {file}")]
    UnresolvedRef {
        file: PathBuf,
        name: String,
        expected_kind: &'static str,
    },

    #[error("duplicate name '{name}' in {file}")]
    DuplicateName { file: PathBuf, name: String },

    /// The model resolved, but the planning engine rejects it.
    #[error("invalid model in {file}: {source}")]
    Planning {
        file: PathBuf,
        #[source]
        source: ConfigurationError,
    },

    /// An order series could not be generated or distributed.
    #[error("invalid orders in {file}: {source}")]
    Orders {
        file: PathBuf,
        #[source]
        source: OrderError,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Data files
// ===========================================================================

/// The files a data directory may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFile {
    Model,
    Config,
}

impl DataFile {
    pub fn base_name(self) -> &'static str {
        match self {
            DataFile::Model => "model",
            DataFile::Config => "config",
        }
    }

    /// Find this file in `dir`. `Ok(None)` when it is absent in every format.
    pub fn locate(self, dir: &Path) -> Result<Option<PathBuf>, DataLoadError> {
        let mut present = Format::ALL
            .iter()
            .map(|f| dir.join(format!("{}.{}", self.base_name(), f.extension())))
            .filter(|path| path.is_file());
        let first = present.next();
        match (first, present.next()) {
            (Some(a), Some(b)) => Err(DataLoadError::ConflictingFormats { a, b }),
            (first, _) => Ok(first),
        }
    }

    pub fn require(self, dir: &Path) -> Result<PathBuf, DataLoadError> {
        self.locate(dir)?.ok_or_else(|| DataLoadError::MissingRequired {
            kind: self,
            dir: dir.to_path_buf(),
        })
    }
}

impl std::fmt::Display for DataFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.base_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

impl Format {
    pub const ALL: [Format; 3] = [Format::Ron, Format::Toml, Format::Json];

    pub fn extension(self) -> &'static str {
        match self {
            Format::Ron => "ron",
            Format::Toml => "toml",
            Format::Json => "json",
        }
    }

    pub fn of(path: &Path) -> Result<Self, DataLoadError> {
        let ext = path.extension().and_then(|e| e.to_str());
        Self::ALL
            .into_iter()
            .find(|f| Some(f.extension()) == ext)
            .ok_or_else(|| DataLoadError::UnsupportedFormat {
                file: path.to_path_buf(),
            })
    }

    fn parse<T: DeserializeOwned>(self, content: &str) -> Result<T, String> {
        match self {
            Format::Ron => ron::from_str(content).map_err(|e| e.to_string()),
            Format::Toml => toml::from_str(content).map_err(|e| e.to_string()),
            Format::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
        }
    }
}

/// Read `path` and deserialize it in the format its extension names.
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = Format::of(path)?;
    let content = std::fs::read_to_string(path)?;
    format.parse(&content).map_err(|detail| DataLoadError::Parse {
        file: path.to_path_buf(),
        detail,
    })
}

// ===========================================================================
// Name resolution
// ===========================================================================

/// Lookups and value checks whose failures name one model file.
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    file: &'a Path,
}

impl<'a> Resolver<'a> {
    pub fn new(file: &'a Path) -> Self {
        Self { file }
    }

    pub fn file(&self) -> &'a Path {
        self.file
    }

    pub fn resolve<'m, V>(
        &self,
        names: &'m HashMap<String, V>,
        name: &str,
        expected_kind: &'static str,
    ) -> Result<&'m V, DataLoadError> {
        names.get(name).ok_or_else(|| DataLoadError::UnresolvedRef {
            file: self.file.to_path_buf(),
            name: name.to_string(),
            expected_kind,
        })
    }

    pub fn ensure_unique<V>(&self, names: &HashMap<String, V>, name: &str) -> Result<(), DataLoadError> {
        if names.contains_key(name) {
            return Err(self.duplicate(name));
        }
        Ok(())
    }

    pub fn duplicate(&self, name: &str) -> DataLoadError {
        DataLoadError::DuplicateName {
            file: self.file.to_path_buf(),
            name: name.to_string(),
        }
    }

    pub fn parse_error(&self, detail: String) -> DataLoadError {
        DataLoadError::Parse {
            file: self.file.to_path_buf(),
            detail,
        }
    }

    pub fn planning(&self, source: ConfigurationError) -> DataLoadError {
        DataLoadError::Planning {
            file: self.file.to_path_buf(),
            source,
        }
    }

    pub fn orders(&self, source: OrderError) -> DataLoadError {
        DataLoadError::Orders {
            file: self.file.to_path_buf(),
            source,
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
