//! Deployment descriptor (`values.yaml`) updates.
//!
//! Only `global.domains` is touched. Every other key and every existing
//! domain entry is carried through as an opaque YAML value.

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use thiserror::Error;

use crate::credentials::CredentialPair;
use crate::files;

const GLOBAL_KEY: &str = "global";
const DOMAINS_KEY: &str = "domains";

/// Errors raised while reading, updating, or writing the descriptor.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum DescriptorError {
    /// Raised when file system operations fail.
    #[error("failed to access {path}: {message}")]
    Io {
        /// Descriptor path.
        path: Utf8PathBuf,
        /// Operating system error string.
        message: String,
    },
    /// Raised when the descriptor is not valid YAML or cannot be rendered.
    #[error("failed to parse {path}: {message}")]
    Parse {
        /// Descriptor path.
        path: Utf8PathBuf,
        /// Parser error string.
        message: String,
    },
    /// Raised when `global` or `global.domains` has the wrong type.
    #[error("invalid descriptor {path}: {message}")]
    InvalidStructure {
        /// Descriptor path.
        path: Utf8PathBuf,
        /// Description of the offending structure.
        message: String,
    },
    /// Raised when a record is built without an address.
    #[error("domain record for `{name}` has an empty address")]
    EmptyAddress {
        /// Server name.
        name: String,
    },
}

/// One configured instance as written under `global.domains`.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct DomainRecord {
    /// Server name from the inventory.
    pub name: String,
    /// Public address of the instance.
    #[serde(rename = "ADDRESS")]
    pub address: String,
    /// Registered OAuth client id.
    #[serde(rename = "OAUTH_CLIENT_ID")]
    pub client_id: String,
    /// Registered OAuth client secret.
    #[serde(rename = "OAUTH_CLIENT_SECRET")]
    pub client_secret: String,
}

impl DomainRecord {
    /// Builds a record, rejecting an empty address.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError::EmptyAddress`] when `address` is blank.
    pub fn new(
        name: &str,
        address: &str,
        credentials: &CredentialPair,
    ) -> Result<Self, DescriptorError> {
        let trimmed = address.trim();
        if trimmed.is_empty() {
            return Err(DescriptorError::EmptyAddress {
                name: name.to_owned(),
            });
        }
        Ok(Self {
            name: name.to_owned(),
            address: trimmed.to_owned(),
            client_id: credentials.client_id().to_owned(),
            client_secret: credentials.client_secret().to_owned(),
        })
    }
}

/// In-memory descriptor with `global.domains` guaranteed to be a sequence.
#[derive(Clone, Debug, PartialEq)]
pub struct Descriptor {
    path: Utf8PathBuf,
    document: Value,
}

impl Descriptor {
    /// Loads the descriptor at `path`. The file must exist.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError::Io`] when the file cannot be read, and
    /// parse or structure errors from [`Descriptor::from_yaml_str`].
    pub fn load(path: &Utf8Path) -> Result<Self, DescriptorError> {
        let contents = files::read_utf8(path).map_err(|err| DescriptorError::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        Self::from_yaml_str(path, &contents)
    }

    /// Parses descriptor YAML that will later be written back to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError::Parse`] for malformed YAML and
    /// [`DescriptorError::InvalidStructure`] when the root, `global`, or
    /// `global.domains` has an unexpected type.
    pub fn from_yaml_str(path: &Utf8Path, contents: &str) -> Result<Self, DescriptorError> {
        let mut document = if contents.trim().is_empty() {
            Value::Null
        } else {
            serde_yaml::from_str(contents).map_err(|err| DescriptorError::Parse {
                path: path.to_path_buf(),
                message: err.to_string(),
            })?
        };
        ensure_domains(path, &mut document)?;
        Ok(Self {
            path: path.to_path_buf(),
            document,
        })
    }

    /// Destination path.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Entries under `global.domains`, in order.
    #[must_use]
    pub fn domains(&self) -> &[Value] {
        self.document
            .get(GLOBAL_KEY)
            .and_then(|global| global.get(DOMAINS_KEY))
            .and_then(Value::as_sequence)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Appends `record` after the existing entries.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError::Parse`] if the record cannot be converted
    /// to YAML.
    pub fn append(&mut self, record: &DomainRecord) -> Result<(), DescriptorError> {
        let value = serde_yaml::to_value(record).map_err(|err| DescriptorError::Parse {
            path: self.path.clone(),
            message: err.to_string(),
        })?;
        domains_mut(&self.path, &mut self.document)?.push(value);
        Ok(())
    }

    /// Renders the whole document.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError::Parse`] if serialisation fails.
    pub fn to_yaml_string(&self) -> Result<String, DescriptorError> {
        serde_yaml::to_string(&self.document).map_err(|err| DescriptorError::Parse {
            path: self.path.clone(),
            message: err.to_string(),
        })
    }

    /// Writes the document back to its path.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError::Io`] when the file cannot be written.
    pub fn persist(&self) -> Result<(), DescriptorError> {
        let rendered = self.to_yaml_string()?;
        files::write_utf8(&self.path, &rendered).map_err(|err| DescriptorError::Io {
            path: self.path.clone(),
            message: err.to_string(),
        })
    }
}

fn ensure_domains(path: &Utf8Path, document: &mut Value) -> Result<(), DescriptorError> {
    if document.is_null() {
        *document = Value::Mapping(Mapping::new());
    }
    let root = document
        .as_mapping_mut()
        .ok_or_else(|| invalid(path, "document root must be a mapping"))?;

    let global = root
        .entry(Value::from(GLOBAL_KEY))
        .or_insert(Value::Null);
    if global.is_null() {
        *global = Value::Mapping(Mapping::new());
    }
    let global_map = global
        .as_mapping_mut()
        .ok_or_else(|| invalid(path, "`global` must be a mapping"))?;

    let domains = global_map
        .entry(Value::from(DOMAINS_KEY))
        .or_insert(Value::Null);
    if domains.is_null() {
        *domains = Value::Sequence(Vec::new());
    }
    if !domains.is_sequence() {
        return Err(invalid(path, "`global.domains` must be a list"));
    }
    Ok(())
}

fn domains_mut<'a>(
    path: &Utf8Path,
    document: &'a mut Value,
) -> Result<&'a mut Vec<Value>, DescriptorError> {
    document
        .get_mut(GLOBAL_KEY)
        .and_then(|global| global.get_mut(DOMAINS_KEY))
        .and_then(Value::as_sequence_mut)
        .ok_or_else(|| invalid(path, "`global.domains` must be a list"))
}

fn invalid(path: &Utf8Path, message: &str) -> DescriptorError {
    DescriptorError::InvalidStructure {
        path: path.to_path_buf(),
        message: message.to_owned(),
    }
}
