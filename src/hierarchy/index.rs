use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Result, StoreError};
use crate::storage::{Fields, Store, Table, Value};

use super::schema::{EntityKind, Granularity, Schema};

type Children = HashMap<String, Vec<String>>;

/// District claimed by more than one constituency.
///
/// The first claiming constituency keeps the district; the others are listed
/// in `ignored` and do not cover it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Ambiguity {
    /// Contested district.
    pub district: String,
    /// Constituency the district was assigned to.
    pub kept: String,
    /// Constituencies whose claim was dropped.
    pub ignored: Vec<String>,
}

/// Every record related to one unit at one granularity.
///
/// Members are listed in the order they are reached walking down from the
/// unit; every list is free of duplicates.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UnitClosure {
    /// Granularity of the unit.
    pub granularity: Granularity,
    /// Unit identifier.
    pub unit: String,
    /// Voivodship IDs.
    pub voivodships: Vec<String>,
    /// Constituency IDs.
    pub constituencies: Vec<String>,
    /// District IDs.
    pub districts: Vec<String>,
    /// Commune IDs.
    pub communes: Vec<String>,
    /// Polling district IDs.
    pub polling_districts: Vec<String>,
    /// Protocol IDs.
    pub protocols: Vec<String>,
    /// List IDs of the related candidates.
    pub lists: Vec<String>,
    /// Candidate IDs.
    pub candidates: Vec<String>,
    /// Mandate IDs.
    pub mandates: Vec<String>,
    /// Result row IDs keyed by results table name.
    pub results: BTreeMap<String, Vec<String>>,
}

impl UnitClosure {
    /// Related IDs of one kind.
    pub fn ids(&self, kind: EntityKind) -> &[String] {
        match kind {
            EntityKind::Voivodship => &self.voivodships,
            EntityKind::Constituency => &self.constituencies,
            EntityKind::District => &self.districts,
            EntityKind::Commune => &self.communes,
            EntityKind::PollingDistrict => &self.polling_districts,
            EntityKind::Protocol => &self.protocols,
            EntityKind::List => &self.lists,
            EntityKind::Candidate => &self.candidates,
            EntityKind::Mandate => &self.mandates,
        }
    }

    /// Number of result rows over all results tables.
    pub fn result_rows(&self) -> usize {
        self.results.values().map(Vec::len).sum()
    }
}

#[derive(Debug, Default)]
struct Level {
    order: Vec<String>,
    members: HashSet<String>,
}

impl Level {
    fn from_table(table: &Table) -> Self {
        let order: Vec<String> = table.ids().map(str::to_string).collect();
        let members = order.iter().cloned().collect();
        Self { order, members }
    }
}

/// Precomputed parent and child relations of a read-only store.
///
/// Built once; every lookup afterwards is a map access. Tables missing from
/// the store are treated as empty.
#[derive(Debug)]
pub struct HierarchyIndex {
    schema: Schema,
    levels: [Level; 4],
    polling_districts: Vec<String>,

    district_voivodship: HashMap<String, String>,
    commune_district: HashMap<String, String>,
    district_constituency: HashMap<String, String>,
    constituency_voivodship: HashMap<String, String>,
    commune_constituency: HashMap<String, String>,
    commune_voivodship: HashMap<String, String>,
    polling_district_constituency: HashMap<String, String>,

    voivodship_constituencies: Children,
    voivodship_districts: Children,
    constituency_districts: Children,
    district_communes: Children,
    constituency_communes: Children,

    commune_polling_districts: Children,
    polling_district_protocol: HashMap<String, String>,
    constituency_candidates: Children,
    candidate_list: HashMap<String, String>,
    candidate_mandates: Children,
    constituency_results: HashMap<String, String>,
    polling_district_results: Children,

    ambiguities: Vec<Ambiguity>,
}

impl HierarchyIndex {
    /// Builds the index with the default schema.
    pub fn new(store: &Store) -> Result<Self> {
        Self::build(store, Schema::default())
    }

    /// Builds the index of `store`, which must be read-only.
    ///
    /// Fails with [`StoreError::MalformedHierarchy`] on any dangling or
    /// contradictory link.
    pub fn build(store: &Store, schema: Schema) -> Result<Self> {
        if !store.is_read_only() {
            return Err(StoreError::NotFrozen(
                "hierarchy index needs a store that cannot change underneath it".into(),
            ));
        }
        let tables = SourceTables::load(store, &schema)?;
        let mut index = Self {
            levels: [
                Level::from_table(&tables.voivodships),
                Level::from_table(&tables.constituencies),
                Level::from_table(&tables.districts),
                Level::from_table(&tables.communes),
            ],
            polling_districts: tables.polling_districts.ids().map(str::to_string).collect(),
            schema,
            district_voivodship: HashMap::new(),
            commune_district: HashMap::new(),
            district_constituency: HashMap::new(),
            constituency_voivodship: HashMap::new(),
            commune_constituency: HashMap::new(),
            commune_voivodship: HashMap::new(),
            polling_district_constituency: HashMap::new(),
            voivodship_constituencies: HashMap::new(),
            voivodship_districts: HashMap::new(),
            constituency_districts: HashMap::new(),
            district_communes: HashMap::new(),
            constituency_communes: HashMap::new(),
            commune_polling_districts: HashMap::new(),
            polling_district_protocol: HashMap::new(),
            constituency_candidates: HashMap::new(),
            candidate_list: HashMap::new(),
            candidate_mandates: HashMap::new(),
            constituency_results: HashMap::new(),
            polling_district_results: HashMap::new(),
            ambiguities: Vec::new(),
        };
        index.link_regions(&tables)?;
        index.link_constituencies(&tables)?;
        index.link_polling_districts(&tables)?;
        index.link_candidates(&tables)?;
        index.link_results(store, &tables)?;

        info!(
            voivodships = index.levels[0].order.len(),
            constituencies = index.levels[1].order.len(),
            districts = index.levels[2].order.len(),
            communes = index.levels[3].order.len(),
            polling_districts = index.polling_districts.len(),
            ambiguities = index.ambiguities.len(),
            "built hierarchy index"
        );
        Ok(index)
    }

    /// Schema the index was built with.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Unit IDs of a granularity in table order.
    pub fn units(&self, granularity: Granularity) -> &[String] {
        &self.levels[granularity.index()].order
    }

    /// Whether `unit` exists at `granularity`.
    pub fn contains(&self, granularity: Granularity, unit: &str) -> bool {
        self.levels[granularity.index()].members.contains(unit)
    }

    /// Districts claimed by several constituencies.
    pub fn ambiguities(&self) -> &[Ambiguity] {
        &self.ambiguities
    }

    /// Results table of a constituency, when the store has one.
    pub fn results_table(&self, constituency: &str) -> Option<&str> {
        self.constituency_results.get(constituency).map(String::as_str)
    }

    /// Polling districts with no protocol, in table order.
    pub fn polling_districts_without_protocol(&self) -> Vec<&str> {
        self.polling_districts
            .iter()
            .filter(|pd| !self.polling_district_protocol.contains_key(pd.as_str()))
            .map(String::as_str)
            .collect()
    }

    /// Constituencies whose results table is absent, in table order.
    pub fn constituencies_without_results(&self) -> Vec<&str> {
        self.units(Granularity::Constituency)
            .iter()
            .filter(|c| !self.constituency_results.contains_key(c.as_str()))
            .map(String::as_str)
            .collect()
    }

    /// Every record related to `unit`.
    pub fn closure(&self, granularity: Granularity, unit: &str) -> Result<UnitClosure> {
        if !self.contains(granularity, unit) {
            return Err(StoreError::unit_not_found(unit));
        }
        let (voivodships, constituencies, districts, communes) = match granularity {
            Granularity::Voivodship => {
                let constituencies = children(&self.voivodship_constituencies, unit).to_vec();
                let districts = children(&self.voivodship_districts, unit).to_vec();
                let communes = flatten(&self.district_communes, &districts);
                (vec![unit.to_string()], constituencies, districts, communes)
            }
            Granularity::Constituency => {
                let districts = children(&self.constituency_districts, unit).to_vec();
                let communes = children(&self.constituency_communes, unit).to_vec();
                (
                    parent(&self.constituency_voivodship, unit),
                    vec![unit.to_string()],
                    districts,
                    communes,
                )
            }
            Granularity::District => (
                parent(&self.district_voivodship, unit),
                parent(&self.district_constituency, unit),
                vec![unit.to_string()],
                children(&self.district_communes, unit).to_vec(),
            ),
            Granularity::Commune => (
                parent(&self.commune_voivodship, unit),
                parent(&self.commune_constituency, unit),
                parent(&self.commune_district, unit),
                vec![unit.to_string()],
            ),
        };

        let polling_districts = flatten(&self.commune_polling_districts, &communes);
        let protocols = polling_districts
            .iter()
            .filter_map(|pd| self.polling_district_protocol.get(pd).cloned())
            .collect();
        let candidates = flatten(&self.constituency_candidates, &constituencies);
        let mut lists: Vec<String> = Vec::new();
        for candidate in &candidates {
            if let Some(list) = self.candidate_list.get(candidate) {
                if !lists.contains(list) {
                    lists.push(list.clone());
                }
            }
        }
        let mandates = flatten(&self.candidate_mandates, &candidates);

        let mut results: BTreeMap<String, Vec<String>> = constituencies
            .iter()
            .filter_map(|c| self.constituency_results.get(c))
            .map(|table| (table.clone(), Vec::new()))
            .collect();
        for pd in &polling_districts {
            let rows = children(&self.polling_district_results, pd);
            if rows.is_empty() {
                continue;
            }
            let table = self
                .polling_district_constituency
                .get(pd)
                .and_then(|c| self.constituency_results.get(c));
            if let Some(table) = table {
                results
                    .entry(table.clone())
                    .or_default()
                    .extend(rows.iter().cloned());
            }
        }

        Ok(UnitClosure {
            granularity,
            unit: unit.to_string(),
            voivodships,
            constituencies,
            districts,
            communes,
            polling_districts,
            protocols,
            lists,
            candidates,
            mandates,
            results,
        })
    }

    /// IDs of one kind related to `unit`.
    pub fn related(
        &self,
        granularity: Granularity,
        unit: &str,
        kind: EntityKind,
    ) -> Result<Vec<String>> {
        Ok(self.closure(granularity, unit)?.ids(kind).to_vec())
    }

    /// Result row IDs related to `unit`, keyed by results table name.
    pub fn related_results(
        &self,
        granularity: Granularity,
        unit: &str,
    ) -> Result<BTreeMap<String, Vec<String>>> {
        Ok(self.closure(granularity, unit)?.results)
    }

    fn link_regions(&mut self, tables: &SourceTables) -> Result<()> {
        let links = &self.schema.links;
        for (id, fields) in tables.districts.iter() {
            let voivodship = link(
                &tables.districts,
                id,
                fields,
                &links.district_voivodship,
                &tables.voivodships,
            )?;
            push(&mut self.voivodship_districts, &voivodship, id);
            self.district_voivodship.insert(id.to_string(), voivodship);
        }
        for (id, fields) in tables.communes.iter() {
            let district = link(
                &tables.communes,
                id,
                fields,
                &links.commune_district,
                &tables.districts,
            )?;
            push(&mut self.district_communes, &district, id);
            self.commune_district.insert(id.to_string(), district);
        }
        Ok(())
    }

    fn link_constituencies(&mut self, tables: &SourceTables) -> Result<()> {
        let field = self.schema.links.constituency_districts.clone();
        let mut claims: BTreeMap<String, Ambiguity> = BTreeMap::new();

        for (id, fields) in tables.constituencies.iter() {
            let listed = district_list(id, fields.get(&field))?;
            if listed.is_empty() {
                return Err(StoreError::malformed(format!(
                    "constituency '{id}' lists no districts"
                )));
            }
            let mut owned = Vec::new();
            for district in listed {
                if !tables.districts.contains(&district) {
                    return Err(StoreError::malformed(format!(
                        "constituency '{id}' lists unknown district '{district}'"
                    )));
                }
                match self.district_constituency.get(&district) {
                    None => {
                        self.district_constituency
                            .insert(district.clone(), id.to_string());
                        owned.push(district);
                    }
                    Some(kept) if kept == id => {}
                    Some(kept) => {
                        warn!(
                            district = %district,
                            kept = %kept,
                            ignored = %id,
                            "district claimed by several constituencies"
                        );
                        claims
                            .entry(district.clone())
                            .or_insert_with(|| Ambiguity {
                                district: district.clone(),
                                kept: kept.clone(),
                                ignored: Vec::new(),
                            })
                            .ignored
                            .push(id.to_string());
                    }
                }
            }
            if owned.is_empty() {
                return Err(StoreError::malformed(format!(
                    "constituency '{id}' owns no district of its own"
                )));
            }
            let voivodship = self.common_voivodship(id, &owned)?;
            push(&mut self.voivodship_constituencies, &voivodship, id);
            self.constituency_voivodship
                .insert(id.to_string(), voivodship);
            self.constituency_districts.insert(id.to_string(), owned);
        }
        self.ambiguities = claims.into_values().collect();

        for district in tables.districts.ids() {
            if !self.district_constituency.contains_key(district) {
                return Err(StoreError::malformed(format!(
                    "district '{district}' belongs to no constituency"
                )));
            }
        }
        for (commune, district) in &self.commune_district {
            let constituency = &self.district_constituency[district];
            self.commune_constituency
                .insert(commune.clone(), constituency.clone());
            self.commune_voivodship
                .insert(commune.clone(), self.district_voivodship[district].clone());
        }
        for commune in tables.communes.ids() {
            if let Some(constituency) = self.commune_constituency.get(commune) {
                push(&mut self.constituency_communes, constituency, commune);
            }
        }
        Ok(())
    }

    fn common_voivodship(&self, constituency: &str, districts: &[String]) -> Result<String> {
        let mut found: Option<&String> = None;
        for district in districts {
            let voivodship = &self.district_voivodship[district];
            match found {
                None => found = Some(voivodship),
                Some(first) if first == voivodship => {}
                Some(first) => {
                    return Err(StoreError::malformed(format!(
                        "constituency '{constituency}' spans voivodships '{first}' and '{voivodship}'"
                    )))
                }
            }
        }
        found.cloned().ok_or_else(|| {
            StoreError::malformed(format!("constituency '{constituency}' has no voivodship"))
        })
    }

    fn link_polling_districts(&mut self, tables: &SourceTables) -> Result<()> {
        let links = &self.schema.links;
        for (id, fields) in tables.polling_districts.iter() {
            let commune = link(
                &tables.polling_districts,
                id,
                fields,
                &links.polling_district_commune,
                &tables.communes,
            )?;
            let derived = self.commune_constituency[&commune].clone();
            if let Some(declared) = fields
                .get(&links.polling_district_constituency)
                .filter(|value| !value.is_null())
            {
                let declared = declared.as_key().unwrap_or_default();
                if declared != derived {
                    return Err(StoreError::malformed(format!(
                        "polling district '{id}' declares constituency '{declared}' but its commune '{commune}' is in '{derived}'"
                    )));
                }
            }
            push(&mut self.commune_polling_districts, &commune, id);
            self.polling_district_constituency
                .insert(id.to_string(), derived);
        }

        for (id, fields) in tables.protocols.iter() {
            let pd = link(
                &tables.protocols,
                id,
                fields,
                &links.protocol_polling_district,
                &tables.polling_districts,
            )?;
            if let Some(previous) = self.polling_district_protocol.insert(pd.clone(), id.to_string())
            {
                return Err(StoreError::malformed(format!(
                    "polling district '{pd}' has protocols '{previous}' and '{id}'"
                )));
            }
        }
        Ok(())
    }

    fn link_candidates(&mut self, tables: &SourceTables) -> Result<()> {
        let links = &self.schema.links;
        for (id, fields) in tables.candidates.iter() {
            let constituency = link(
                &tables.candidates,
                id,
                fields,
                &links.candidate_constituency,
                &tables.constituencies,
            )?;
            let list = link(
                &tables.candidates,
                id,
                fields,
                &links.candidate_list,
                &tables.lists,
            )?;
            push(&mut self.constituency_candidates, &constituency, id);
            self.candidate_list.insert(id.to_string(), list);
        }
        for (id, fields) in tables.mandates.iter() {
            let candidate = link(
                &tables.mandates,
                id,
                fields,
                &links.mandate_candidate,
                &tables.candidates,
            )?;
            push(&mut self.candidate_mandates, &candidate, id);
        }
        Ok(())
    }

    fn link_results(&mut self, store: &Store, tables: &SourceTables) -> Result<()> {
        let number_field = self.schema.links.constituency_number.clone();
        let pd_field = self.schema.links.result_polling_district.clone();
        let mut owners: HashMap<String, String> = HashMap::new();

        for (constituency, fields) in tables.constituencies.iter() {
            let Some(number) = fields.get(&number_field).and_then(Value::as_key) else {
                debug!(constituency, "constituency has no number, skipping results");
                continue;
            };
            let name = self.schema.results_table(&number);
            if let Some(other) = owners.insert(name.clone(), constituency.to_string()) {
                return Err(StoreError::malformed(format!(
                    "constituencies '{other}' and '{constituency}' share results table '{name}'"
                )));
            }
            let Some(results) = store.table_opt(&name)? else {
                debug!(constituency, table = %name, "results table absent");
                continue;
            };
            for (row, row_fields) in results.iter() {
                let pd = link(&results, row, row_fields, &pd_field, &tables.polling_districts)?;
                let owner = &self.polling_district_constituency[&pd];
                if owner != constituency {
                    return Err(StoreError::malformed(format!(
                        "results row '{row}' of '{name}' points at polling district '{pd}' of constituency '{owner}'"
                    )));
                }
                push(&mut self.polling_district_results, &pd, row);
            }
            self.constituency_results
                .insert(constituency.to_string(), name);
        }
        Ok(())
    }
}

struct SourceTables {
    voivodships: Arc<Table>,
    constituencies: Arc<Table>,
    districts: Arc<Table>,
    communes: Arc<Table>,
    polling_districts: Arc<Table>,
    protocols: Arc<Table>,
    lists: Arc<Table>,
    candidates: Arc<Table>,
    mandates: Arc<Table>,
}

impl SourceTables {
    fn load(store: &Store, schema: &Schema) -> Result<Self> {
        let get = |kind: EntityKind| -> Result<Arc<Table>> {
            let name = schema.table(kind);
            Ok(store
                .table_opt(name)?
                .unwrap_or_else(|| Arc::new(Table::new(name))))
        };
        Ok(Self {
            voivodships: get(EntityKind::Voivodship)?,
            constituencies: get(EntityKind::Constituency)?,
            districts: get(EntityKind::District)?,
            communes: get(EntityKind::Commune)?,
            polling_districts: get(EntityKind::PollingDistrict)?,
            protocols: get(EntityKind::Protocol)?,
            lists: get(EntityKind::List)?,
            candidates: get(EntityKind::Candidate)?,
            mandates: get(EntityKind::Mandate)?,
        })
    }
}

/// Resolves a required link field of `id` to a record of `target`.
fn link(source: &Table, id: &str, fields: &Fields, field: &str, target: &Table) -> Result<String> {
    let key = fields
        .get(field)
        .and_then(Value::as_key)
        .ok_or_else(|| {
            StoreError::malformed(format!(
                "{} record '{id}' has no '{field}' link",
                source.name()
            ))
        })?;
    if !target.contains(&key) {
        return Err(StoreError::malformed(format!(
            "{} record '{id}' points at missing {} record '{key}'",
            source.name(),
            target.name()
        )));
    }
    Ok(key)
}

/// District IDs of a constituency, stored as a list or as a JSON array string.
fn district_list(constituency: &str, value: Option<&Value>) -> Result<Vec<String>> {
    let items = match value {
        Some(Value::List(items)) => items.clone(),
        Some(Value::Str(raw)) => serde_json::from_str::<Vec<Value>>(raw).map_err(|err| {
            StoreError::malformed(format!(
                "constituency '{constituency}' has an unreadable district list: {err}"
            ))
        })?,
        _ => {
            return Err(StoreError::malformed(format!(
                "constituency '{constituency}' has no district list"
            )))
        }
    };
    let mut districts: Vec<String> = Vec::with_capacity(items.len());
    for item in &items {
        let district = item.as_key().ok_or_else(|| {
            StoreError::malformed(format!(
                "constituency '{constituency}' lists a non-identifier district {item}"
            ))
        })?;
        if !districts.contains(&district) {
            districts.push(district);
        }
    }
    Ok(districts)
}

fn push(map: &mut Children, key: &str, child: &str) {
    map.entry(key.to_string())
        .or_default()
        .push(child.to_string());
}

fn children<'a>(map: &'a Children, key: &str) -> &'a [String] {
    map.get(key).map(Vec::as_slice).unwrap_or(&[])
}

fn flatten(map: &Children, keys: &[String]) -> Vec<String> {
    keys.iter()
        .flat_map(|key| children(map, key).iter().cloned())
        .collect()
}

fn parent(map: &HashMap<String, String>, key: &str) -> Vec<String> {
    map.get(key).cloned().into_iter().collect()
}
