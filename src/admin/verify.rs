use std::collections::HashSet;

use serde::Serialize;
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::hierarchy::{EntityKind, Granularity, HierarchyIndex, Schema};
use crate::storage::Store;

const MAX_FINDINGS: usize = 32;
const SAMPLE_IDS: usize = 5;

/// Indicates the severity level of a verification finding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifySeverity {
    /// Expected gap in the data, reported for completeness.
    Info,
    /// Data the index tolerates but that analyses should know about.
    Warning,
    /// Inconsistency that makes the hierarchy unusable.
    Error,
}

/// Represents a single issue discovered during verification.
#[derive(Clone, Debug, Serialize)]
pub struct VerifyFinding {
    /// The severity level of this finding.
    pub severity: VerifySeverity,
    /// Human-readable description of the issue.
    pub message: String,
}

/// Record counts of the hierarchy tables.
#[derive(Clone, Debug, Default, Serialize)]
pub struct VerifyCounts {
    /// Records in the voivodships table.
    pub voivodships: usize,
    /// Records in the constituencies table.
    pub constituencies: usize,
    /// Records in the districts table.
    pub districts: usize,
    /// Records in the communes table.
    pub communes: usize,
    /// Records in the polling districts table.
    pub polling_districts: usize,
    /// Records in the protocols table.
    pub protocols: usize,
    /// Records in the lists table.
    pub lists: usize,
    /// Records in the candidates table.
    pub candidates: usize,
    /// Records in the mandates table.
    pub mandates: usize,
    /// Rows over every results table.
    pub result_rows: usize,
}

/// Complete report of a verification run.
#[derive(Clone, Debug, Serialize)]
pub struct VerifyReport {
    /// Whether the hierarchy index could be built.
    pub success: bool,
    /// Issues discovered, most severe first.
    pub findings: Vec<VerifyFinding>,
    /// Sizes of the tables examined.
    pub counts: VerifyCounts,
}

/// Checks that `store` forms a consistent hierarchy under `schema`.
///
/// A malformed hierarchy is reported as an error finding rather than
/// returned; only I/O and decoding failures surface as `Err`.
pub fn verify(store: &Store, schema: &Schema) -> Result<VerifyReport> {
    let counts = count(store, schema)?;
    let mut findings = Vec::new();

    match HierarchyIndex::build(store, schema.clone()) {
        Ok(index) => inspect(store, &index, &mut findings),
        Err(StoreError::MalformedHierarchy(message)) => {
            push(&mut findings, VerifySeverity::Error, message);
        }
        Err(err) => return Err(err),
    }
    findings.sort_by_key(|f| std::cmp::Reverse(rank(f.severity)));
    debug!(findings = findings.len(), "verified store");

    Ok(VerifyReport {
        success: !findings
            .iter()
            .any(|f| f.severity == VerifySeverity::Error),
        findings,
        counts,
    })
}

fn inspect(store: &Store, index: &HierarchyIndex, findings: &mut Vec<VerifyFinding>) {
    for ambiguity in index.ambiguities() {
        push(
            findings,
            VerifySeverity::Warning,
            format!(
                "district '{}' is listed by constituencies {} besides '{}'",
                ambiguity.district,
                ambiguity.ignored.join(", "),
                ambiguity.kept
            ),
        );
    }

    let orphans = index.polling_districts_without_protocol();
    if !orphans.is_empty() {
        push(
            findings,
            VerifySeverity::Warning,
            format!(
                "{} polling districts have no protocol ({})",
                orphans.len(),
                sample(&orphans)
            ),
        );
    }

    let silent = index.constituencies_without_results();
    if !silent.is_empty() {
        push(
            findings,
            VerifySeverity::Info,
            format!(
                "{} constituencies have no results table ({})",
                silent.len(),
                sample(&silent)
            ),
        );
    }

    let owned: HashSet<&str> = index
        .units(Granularity::Constituency)
        .iter()
        .filter_map(|c| index.results_table(c))
        .collect();
    for name in store.table_names() {
        if index.schema().is_results_table(&name) && !owned.contains(name.as_str()) {
            push(
                findings,
                VerifySeverity::Warning,
                format!("results table '{name}' matches no constituency number"),
            );
        }
    }
}

fn count(store: &Store, schema: &Schema) -> Result<VerifyCounts> {
    let len = |name: &str| -> Result<usize> {
        Ok(store.table_opt(name)?.map(|t| t.len()).unwrap_or(0))
    };
    let mut result_rows = 0;
    for name in store.table_names() {
        if schema.is_results_table(&name) {
            result_rows += len(&name)?;
        }
    }
    Ok(VerifyCounts {
        voivodships: len(schema.table(EntityKind::Voivodship))?,
        constituencies: len(schema.table(EntityKind::Constituency))?,
        districts: len(schema.table(EntityKind::District))?,
        communes: len(schema.table(EntityKind::Commune))?,
        polling_districts: len(schema.table(EntityKind::PollingDistrict))?,
        protocols: len(schema.table(EntityKind::Protocol))?,
        lists: len(schema.table(EntityKind::List))?,
        candidates: len(schema.table(EntityKind::Candidate))?,
        mandates: len(schema.table(EntityKind::Mandate))?,
        result_rows,
    })
}

fn sample(ids: &[&str]) -> String {
    let mut out = ids
        .iter()
        .take(SAMPLE_IDS)
        .copied()
        .collect::<Vec<_>>()
        .join(", ");
    if ids.len() > SAMPLE_IDS {
        out.push_str(", ...");
    }
    out
}

fn rank(severity: VerifySeverity) -> u8 {
    match severity {
        VerifySeverity::Info => 0,
        VerifySeverity::Warning => 1,
        VerifySeverity::Error => 2,
    }
}

fn push(findings: &mut Vec<VerifyFinding>, severity: VerifySeverity, message: impl Into<String>) {
    if findings.len() < MAX_FINDINGS {
        findings.push(VerifyFinding {
            severity,
            message: message.into(),
        });
    }
}
