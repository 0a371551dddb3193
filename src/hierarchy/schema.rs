use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// Administrative level at which a store is partitioned.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    /// Top-level region ("województwo").
    Voivodship,
    /// Parliamentary electoral district ("okręg").
    Constituency,
    /// Mid-level region ("powiat").
    District,
    /// Lowest administrative unit ("gmina").
    Commune,
}

impl Granularity {
    /// Every granularity, coarsest first.
    pub const ALL: [Granularity; 4] = [
        Granularity::Voivodship,
        Granularity::Constituency,
        Granularity::District,
        Granularity::Commune,
    ];

    /// Entity kind whose records are the units of this granularity.
    pub fn kind(self) -> EntityKind {
        match self {
            Granularity::Voivodship => EntityKind::Voivodship,
            Granularity::Constituency => EntityKind::Constituency,
            Granularity::District => EntityKind::District,
            Granularity::Commune => EntityKind::Commune,
        }
    }

    /// Plural label used on the command line and in reports.
    pub fn label(self) -> &'static str {
        match self {
            Granularity::Voivodship => "voivodships",
            Granularity::Constituency => "constituencies",
            Granularity::District => "districts",
            Granularity::Commune => "communes",
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Granularity {
    type Err = StoreError;

    fn from_str(raw: &str) -> Result<Self> {
        let lower = raw.trim().to_lowercase();
        let granularity = match lower.as_str() {
            "voivodship" | "voivodships" | "województwa" | "wojewodztwa" => Granularity::Voivodship,
            "constituency" | "constituencies" | "okręgi" | "okregi" => Granularity::Constituency,
            "district" | "districts" | "powiaty" => Granularity::District,
            "commune" | "communes" | "gminy" => Granularity::Commune,
            _ => {
                return Err(StoreError::Config(format!(
                    "unknown granularity '{raw}' (expected voivodships, constituencies, districts or communes)"
                )))
            }
        };
        Ok(granularity)
    }
}

/// Every record kind the hierarchy index can relate to a unit.
///
/// Result rows are not listed: they live in per-constituency tables and are
/// reported separately.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Voivodship record.
    Voivodship,
    /// Constituency record.
    Constituency,
    /// District record.
    District,
    /// Commune record.
    Commune,
    /// Polling district ("obwód").
    PollingDistrict,
    /// Tally protocol of one polling district.
    Protocol,
    /// Committee list.
    List,
    /// Candidate on a list.
    Candidate,
    /// Won seat.
    Mandate,
}

impl EntityKind {
    /// Every kind, administrative levels first.
    pub const ALL: [EntityKind; 9] = [
        EntityKind::Voivodship,
        EntityKind::Constituency,
        EntityKind::District,
        EntityKind::Commune,
        EntityKind::PollingDistrict,
        EntityKind::Protocol,
        EntityKind::List,
        EntityKind::Candidate,
        EntityKind::Mandate,
    ];
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Voivodship => "voivodship",
            EntityKind::Constituency => "constituency",
            EntityKind::District => "district",
            EntityKind::Commune => "commune",
            EntityKind::PollingDistrict => "polling district",
            EntityKind::Protocol => "protocol",
            EntityKind::List => "list",
            EntityKind::Candidate => "candidate",
            EntityKind::Mandate => "mandate",
        };
        f.write_str(name)
    }
}

/// Table names of the election data model.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableNames {
    /// Voivodship table.
    pub voivodships: String,
    /// Constituency table.
    pub constituencies: String,
    /// District table.
    pub districts: String,
    /// Commune table.
    pub communes: String,
    /// Polling district table.
    pub polling_districts: String,
    /// Protocol table.
    pub protocols: String,
    /// Committee list table.
    pub lists: String,
    /// Candidate table.
    pub candidates: String,
    /// Mandate table.
    pub mandates: String,
    /// Result tables are named `<results_prefix><constituency number>`.
    pub results_prefix: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            voivodships: "województwa".into(),
            constituencies: "okręgi".into(),
            districts: "powiaty".into(),
            communes: "gminy".into(),
            polling_districts: "obwody".into(),
            protocols: "protokoły".into(),
            lists: "listy".into(),
            candidates: "kandydaci".into(),
            mandates: "mandaty".into(),
            results_prefix: "wyniki_".into(),
        }
    }
}

/// Names of the fields linking records to each other.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkFields {
    /// District to voivodship.
    pub district_voivodship: String,
    /// Commune to district.
    pub commune_district: String,
    /// Serialized list of district IDs on a constituency.
    pub constituency_districts: String,
    /// Constituency number used to name its results table.
    pub constituency_number: String,
    /// Polling district to commune.
    pub polling_district_commune: String,
    /// Optional; when present it must agree with the commune's constituency.
    pub polling_district_constituency: String,
    /// Protocol to polling district.
    pub protocol_polling_district: String,
    /// Candidate to constituency.
    pub candidate_constituency: String,
    /// Candidate to list.
    pub candidate_list: String,
    /// Mandate to candidate.
    pub mandate_candidate: String,
    /// Result row to polling district.
    pub result_polling_district: String,
}

impl Default for LinkFields {
    fn default() -> Self {
        Self {
            district_voivodship: "voivodship".into(),
            commune_district: "district".into(),
            constituency_districts: "districts".into(),
            constituency_number: "number".into(),
            polling_district_commune: "commune".into(),
            polling_district_constituency: "constituency".into(),
            protocol_polling_district: "obwod".into(),
            candidate_constituency: "constituency".into(),
            candidate_list: "list".into(),
            mandate_candidate: "candidate".into(),
            result_polling_district: "obwod".into(),
        }
    }
}

/// Table and field names of a dataset.
///
/// Every entry has a default matching the preprocessed Sejm dataset, so a
/// TOML file only needs to list what differs:
///
/// ```toml
/// [tables]
/// communes = "communes"
///
/// [links]
/// commune_district = "parent"
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Schema {
    /// Table names.
    pub tables: TableNames,
    /// Link field names.
    pub links: LinkFields,
}

impl Schema {
    /// Parses a schema from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|err| StoreError::Config(format!("invalid schema: {err}")))
    }

    /// Reads a schema file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|err| {
            StoreError::Config(format!("failed to read schema {}: {err}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    /// Renders the schema as TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|err| StoreError::Config(format!("failed to serialize schema: {err}")))
    }

    /// Table holding records of `kind`.
    pub fn table(&self, kind: EntityKind) -> &str {
        let t = &self.tables;
        match kind {
            EntityKind::Voivodship => &t.voivodships,
            EntityKind::Constituency => &t.constituencies,
            EntityKind::District => &t.districts,
            EntityKind::Commune => &t.communes,
            EntityKind::PollingDistrict => &t.polling_districts,
            EntityKind::Protocol => &t.protocols,
            EntityKind::List => &t.lists,
            EntityKind::Candidate => &t.candidates,
            EntityKind::Mandate => &t.mandates,
        }
    }

    /// Name of the results table of the constituency numbered `number`.
    pub fn results_table(&self, number: &str) -> String {
        format!("{}{number}", self.tables.results_prefix)
    }

    /// Whether `name` follows the results table naming scheme.
    pub fn is_results_table(&self, name: &str) -> bool {
        name.len() > self.tables.results_prefix.len() && name.starts_with(&self.tables.results_prefix)
    }
}
