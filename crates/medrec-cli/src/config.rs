use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use medrec_ledger::LedgerConfig;

/// Journal used when neither the config file nor `--journal` names one.
pub const DEFAULT_JOURNAL: &str = ".medrec/records.journal";

/// Contents of the `medrec` TOML configuration file.
///
/// ```toml
/// [ledger]
/// journal_path = "data/records.journal"
/// submit_timeout_ms = 5000
///
/// [client]
/// caller = "0xdoctor"
///
/// [access]
/// allowed_callers = ["0xdoctor", "0xnurse"]
///
/// [access.read_grants]
/// PAT001 = ["0xdoctor"]
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub ledger: LedgerConfig,
    pub client: ClientSection,
    pub access: AccessSection,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSection {
    pub caller: Option<String>,
}

/// An empty `allowed_callers` leaves appends open to every caller; an empty
/// `read_grants` leaves every subject readable by anyone.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessSection {
    pub allowed_callers: Vec<String>,
    /// Subject to the callers consented to read its records.
    pub read_grants: BTreeMap<String, Vec<String>>,
}

impl CliConfig {
    pub fn from_toml_str(raw: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(raw).context("invalid configuration")?;
        config.ledger.validate()?;
        Ok(config)
    }

    /// Load `path` if given, otherwise start from defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                Self::from_toml_str(&raw).with_context(|| format!("loading {}", path.display()))
            }
            None => Ok(Self::default()),
        }
    }

    /// Apply command-line overrides and fill in the default journal.
    pub fn with_overrides(mut self, journal: Option<PathBuf>, caller: Option<String>) -> Self {
        if let Some(journal) = journal {
            self.ledger.journal_path = Some(journal);
        }
        if self.ledger.journal_path.is_none() {
            self.ledger.journal_path = Some(PathBuf::from(DEFAULT_JOURNAL));
        }
        if caller.is_some() {
            self.client.caller = caller;
        }
        self
    }
}
