//! Protocol registry
//!
//! Loads one YAML descriptor per protocol from a directory and validates the
//! set as a whole. Each descriptor is consumed as a flat key/value mapping;
//! its short name is the file stem (`pindel.yml` -> `pindel`), which is what
//! variant-call files are matched against.

use log::{debug, error, info, warn};
use serde_yaml::Value;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::error::{ArchiveError, ConfigError, Result};

/// Descriptor keys, in IDF row order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdfField {
    InvestigationTitle,
    ExpDesign,
    ExpDesignOntology,
    ExpDesignFactorName,
    ExpDesignFactorType,
    PersonLastName,
    PersonFirstName,
    PersonMidInitial,
    PersonEmail,
    PersonAddress,
    PersonAffiliation,
    PersonRole,
    PubMedId,
    PubAuthors,
    PubTitle,
    PubStatus,
    ExpDescription,
    ProtocolNames,
    ProtocolTypes,
    ProtocolDescriptions,
    ProtocolOntologies,
    ProtocolParameters,
    OntologyName,
    OntologyFile,
    OntologyVersion,
}

impl IdfField {
    pub const ALL: [IdfField; 25] = [
        IdfField::InvestigationTitle,
        IdfField::ExpDesign,
        IdfField::ExpDesignOntology,
        IdfField::ExpDesignFactorName,
        IdfField::ExpDesignFactorType,
        IdfField::PersonLastName,
        IdfField::PersonFirstName,
        IdfField::PersonMidInitial,
        IdfField::PersonEmail,
        IdfField::PersonAddress,
        IdfField::PersonAffiliation,
        IdfField::PersonRole,
        IdfField::PubMedId,
        IdfField::PubAuthors,
        IdfField::PubTitle,
        IdfField::PubStatus,
        IdfField::ExpDescription,
        IdfField::ProtocolNames,
        IdfField::ProtocolTypes,
        IdfField::ProtocolDescriptions,
        IdfField::ProtocolOntologies,
        IdfField::ProtocolParameters,
        IdfField::OntologyName,
        IdfField::OntologyFile,
        IdfField::OntologyVersion,
    ];

    /// Key as written in the descriptor document
    pub fn key(self) -> &'static str {
        match self {
            IdfField::InvestigationTitle => "investigationTitle",
            IdfField::ExpDesign => "expDesign",
            IdfField::ExpDesignOntology => "expDesignOntology",
            IdfField::ExpDesignFactorName => "expDesignFactorName",
            IdfField::ExpDesignFactorType => "expDesignFactorType",
            IdfField::PersonLastName => "personLastName",
            IdfField::PersonFirstName => "personFirstName",
            IdfField::PersonMidInitial => "personMidInitial",
            IdfField::PersonEmail => "personEmail",
            IdfField::PersonAddress => "personAddress",
            IdfField::PersonAffiliation => "personAffiliation",
            IdfField::PersonRole => "personRole",
            IdfField::PubMedId => "pubMedId",
            IdfField::PubAuthors => "pubAuthors",
            IdfField::PubTitle => "pubTitle",
            IdfField::PubStatus => "pubStatus",
            IdfField::ExpDescription => "expDescription",
            IdfField::ProtocolNames => "protocolNames",
            IdfField::ProtocolTypes => "protocolTypes",
            IdfField::ProtocolDescriptions => "protocolDescriptions",
            IdfField::ProtocolOntologies => "protocolOntologies",
            IdfField::ProtocolParameters => "protocolParameters",
            IdfField::OntologyName => "ontologyName",
            IdfField::OntologyFile => "ontologyFile",
            IdfField::OntologyVersion => "ontologyVersion",
        }
    }

    /// Row label in the IDF
    pub fn label(self) -> &'static str {
        match self {
            IdfField::InvestigationTitle => "Investigation Title",
            IdfField::ExpDesign => "Experimental Design",
            IdfField::ExpDesignOntology => "Experimental Design Term Source REF",
            IdfField::ExpDesignFactorName => "Experimental Factor Name",
            IdfField::ExpDesignFactorType => "Experimental Factor Type",
            IdfField::PersonLastName => "Person Last Name",
            IdfField::PersonFirstName => "Person First Name",
            IdfField::PersonMidInitial => "Person Mid Initials",
            IdfField::PersonEmail => "Person Email",
            IdfField::PersonAddress => "Person Address",
            IdfField::PersonAffiliation => "Person Affiliation",
            IdfField::PersonRole => "Person Roles",
            IdfField::PubMedId => "PubMed ID",
            IdfField::PubAuthors => "Publication Author List",
            IdfField::PubTitle => "Publication Title",
            IdfField::PubStatus => "Publication Status",
            IdfField::ExpDescription => "Experiment Description",
            IdfField::ProtocolNames => "Protocol Name",
            IdfField::ProtocolTypes => "Protocol Type",
            IdfField::ProtocolDescriptions => "Protocol Description",
            IdfField::ProtocolOntologies => "Protocol Term Source REF",
            IdfField::ProtocolParameters => "Protocol Parameters",
            IdfField::OntologyName => "Term Source Name",
            IdfField::OntologyFile => "Term Source File",
            IdfField::OntologyVersion => "Term Source Version",
        }
    }

    fn from_key(key: &str) -> Option<IdfField> {
        IdfField::ALL.iter().copied().find(|f| f.key() == key)
    }
}

/// One protocol descriptor
#[derive(Debug, Clone)]
pub struct ProtocolRecord {
    short_name: String,
    path: PathBuf,
    protocol_name: String,
    values: HashMap<IdfField, Option<String>>,
}

impl ProtocolRecord {
    /// Name derived from the descriptor file stem
    pub fn short_name(&self) -> &str {
        &self.short_name
    }

    /// The `protocolNames` value, e.g. `center1:pindel`
    pub fn protocol_name(&self) -> &str {
        &self.protocol_name
    }

    /// Center identifier: the protocol name up to its first colon
    pub fn center_id(&self) -> &str {
        self.protocol_name
            .split_once(':')
            .map(|(center, _)| center)
            .unwrap_or(&self.protocol_name)
    }

    /// Rendered value of a descriptor field; `None` for YAML null
    pub fn value(&self, field: IdfField) -> Option<&str> {
        self.values.get(&field).and_then(|v| v.as_deref())
    }
}

/// Protocol reference resolved for one variant-call file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolRef {
    pub protocol_ref: String,
    pub center_id: String,
}

/// Immutable, validated set of protocol descriptors
#[derive(Debug, Clone)]
pub struct ProtocolRegistry {
    records: Vec<ProtocolRecord>,
}

impl ProtocolRegistry {
    /// Load every `.yml`/`.yaml` descriptor in `dir`, in file name order.
    pub fn load(dir: &Path) -> Result<Self> {
        let mut paths = Vec::new();
        let entries = std::fs::read_dir(dir).map_err(|e| ArchiveError::io(dir, e))?;
        for entry in entries {
            let path = entry.map_err(|e| ArchiveError::io(dir, e))?.path();
            let is_descriptor = path
                .extension()
                .is_some_and(|e| e == "yml" || e == "yaml");
            if is_descriptor && path.is_file() {
                paths.push(path);
            }
        }
        paths.sort();

        let mut records = Vec::new();
        let mut missing = Vec::new();
        let mut undecodable = Vec::new();
        for path in &paths {
            let content =
                std::fs::read_to_string(path).map_err(|e| ArchiveError::io(path, e))?;
            match parse_descriptor(path, &content) {
                Ok(Ok(record)) => records.push(record),
                Ok(Err(fields)) => {
                    for field in fields {
                        missing.push(format!("{}: missing {}", path.display(), field));
                    }
                }
                Err(e) => {
                    error!("{}", e);
                    undecodable.push(e);
                }
            }
        }

        if !missing.is_empty() {
            return Err(ConfigError::MissingFields(missing).into());
        }
        if let Some(first) = undecodable.into_iter().next() {
            return Err(first.into());
        }
        if records.is_empty() {
            return Err(ConfigError::EmptyRegistry(dir.to_path_buf()).into());
        }

        let registry = Self::from_records(records)?;
        info!(
            "Loaded {} protocol descriptor(s) from {}",
            registry.len(),
            dir.display()
        );
        Ok(registry)
    }

    /// Validate uniqueness over an already-decoded descriptor set
    pub fn from_records(records: Vec<ProtocolRecord>) -> Result<Self> {
        let mut names = HashSet::new();
        let mut short_names = HashSet::new();
        for record in &records {
            if !names.insert(record.protocol_name.as_str()) {
                return Err(ConfigError::DuplicateProtocol {
                    name: record.protocol_name.clone(),
                    path: record.path.clone(),
                }
                .into());
            }
            if !short_names.insert(record.short_name.as_str()) {
                return Err(ConfigError::Decode {
                    path: record.path.clone(),
                    msg: format!(
                        "descriptor short name '{}' is defined more than once",
                        record.short_name
                    ),
                }
                .into());
            }
        }
        Ok(Self { records })
    }

    /// Resolve a protocol short name to its protocol reference and center
    pub fn lookup(&self, short_name: &str) -> Option<ProtocolRef> {
        self.records
            .iter()
            .find(|r| r.short_name() == short_name)
            .map(|r| ProtocolRef {
                protocol_ref: r.protocol_name().to_string(),
                center_id: r.center_id().to_string(),
            })
    }

    pub fn records(&self) -> &[ProtocolRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}

/// Decode one descriptor. The inner `Err` lists missing keys; both error
/// kinds are collected by the caller so every offending document is reported.
fn parse_descriptor(
    path: &Path,
    content: &str,
) -> Result<std::result::Result<ProtocolRecord, Vec<&'static str>>, ConfigError> {
    let decode_err = |msg: String| ConfigError::Decode {
        path: path.to_path_buf(),
        msg,
    };

    let doc: Value = serde_yaml::from_str(content).map_err(|e| decode_err(e.to_string()))?;
    let Value::Mapping(mapping) = doc else {
        return Err(decode_err("descriptor is not a key/value mapping".to_string()));
    };

    let mut raw: HashMap<IdfField, &Value> = HashMap::new();
    for (key, value) in &mapping {
        let Some(key) = key.as_str() else {
            return Err(decode_err(format!("non-string key {:?}", key)));
        };
        match IdfField::from_key(key) {
            Some(field) => {
                raw.insert(field, value);
            }
            None => warn!(
                "{}: '{}' does not match a descriptor field, ignoring",
                path.display(),
                key
            ),
        }
    }

    let missing: Vec<&'static str> = IdfField::ALL
        .iter()
        .filter(|f| !raw.contains_key(*f))
        .map(|f| f.key())
        .collect();
    if !missing.is_empty() {
        return Ok(Err(missing));
    }

    let mut values = HashMap::new();
    for (field, value) in raw {
        let text = render_value(value)
            .map_err(|msg| decode_err(format!("field {}: {}", field.key(), msg)))?;
        values.insert(field, text);
    }

    let protocol_name = values
        .get(&IdfField::ProtocolNames)
        .cloned()
        .flatten()
        .filter(|name| !name.is_empty())
        .ok_or_else(|| decode_err("protocolNames must be a non-empty value".to_string()))?;

    let short_name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| decode_err("descriptor file name is not valid UTF-8".to_string()))?
        .to_string();

    debug!("Descriptor {} -> protocol {}", short_name, protocol_name);

    Ok(Ok(ProtocolRecord {
        short_name,
        path: path.to_path_buf(),
        protocol_name,
        values,
    }))
}

/// Render a YAML value as IDF cell text. Null becomes `None`; lists are
/// joined with `;`.
fn render_value(value: &Value) -> std::result::Result<Option<String>, String> {
    match value {
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(Some(b.to_string())),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::String(s) => Ok(Some(s.clone())),
        Value::Sequence(items) => {
            let parts = items
                .iter()
                .map(|item| match item {
                    Value::Sequence(_) | Value::Mapping(_) => {
                        Err("nested collections are not supported".to_string())
                    }
                    other => render_value(other).map(Option::unwrap_or_default),
                })
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(Some(parts.join(";")))
        }
        Value::Mapping(_) => Err("mappings are not supported".to_string()),
        Value::Tagged(tagged) => render_value(&tagged.value),
    }
}

/// Full descriptor document for tests
#[cfg(test)]
pub(crate) fn descriptor_yaml(protocol_name: &str) -> String {
    IdfField::ALL
        .iter()
        .map(|f| match f {
            IdfField::ProtocolNames => format!("{}: \"{}\"\n", f.key(), protocol_name),
            IdfField::PubMedId => format!("{}: 12345\n", f.key()),
            IdfField::PersonMidInitial => format!("{}:\n", f.key()),
            _ => format!("{}: \"{} value\"\n", f.key(), f.key()),
        })
        .collect()
}
