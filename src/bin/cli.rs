//! Binary entry point for the pkwstore command line tool.
#![forbid(unsafe_code)]

#[path = "cli/config.rs"]
mod config;
#[path = "cli/ui.rs"]
mod ui;

use std::error::Error;
use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use pkwstore::{
    admin::{stats, verify, StatsReport, VerifyReport, VerifySeverity},
    hierarchy::{EntityKind, Granularity, HierarchyIndex, Schema},
    partition::Partitioner,
    storage::{codec, Projected, Projection, Query, Record, Store, StoreOptions, Value},
};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

use config::CliConfig;
use ui::{format_duration, Theme, Ui};

#[derive(Parser, Debug)]
#[command(
    name = "pkwstore",
    version,
    about = "Inspect and partition election data stores",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        value_name = "DIR",
        env = "PKWSTORE_DB",
        help = "Store directory (defaults to store.default in cli.toml)"
    )]
    db: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        value_name = "FILE",
        env = "PKWSTORE_CONFIG",
        help = "Path to cli.toml (defaults to the user config directory)"
    )]
    config: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        value_name = "FILE",
        help = "TOML file overriding table and link field names"
    )]
    schema: Option<PathBuf>,

    #[arg(long, global = true, value_name = "CHAR", help = "Field delimiter of table files")]
    delimiter: Option<char>,

    #[arg(long, global = true, value_name = "ROWS", help = "Load at most ROWS rows per table")]
    limit: Option<usize>,

    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Output format for structured responses"
    )]
    format: OutputFormat,

    #[arg(long, global = true, value_enum, default_value_t = Theme::Auto, help = "Color theme")]
    theme: Theme,

    #[arg(short, long, global = true, help = "Suppress decorations and progress output")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(about = "List tables with record counts and field names")]
    Tables,

    #[command(about = "Print one record")]
    Get {
        #[arg(value_name = "TABLE")]
        table: String,

        #[arg(value_name = "ID")]
        id: String,
    },

    #[command(about = "Print records matching every --where term")]
    Find {
        #[arg(value_name = "TABLE")]
        table: String,

        #[arg(
            long = "where",
            value_name = "FIELD=VALUE",
            action = ArgAction::Append,
            help = "Equality term; values are typed like table cells (repeatable)"
        )]
        terms: Vec<String>,

        #[arg(long, value_name = "f1,f2", help = "Project these fields instead of whole records")]
        fields: Option<String>,

        #[arg(long, help = "Stop after the first match")]
        first: bool,
    },

    #[command(about = "Check the administrative hierarchy for consistency")]
    Verify,

    #[command(about = "Split the store per unit and summarize each part")]
    Partition {
        #[arg(
            long,
            short,
            value_name = "LEVEL",
            default_value = "voivodships",
            help = "voivodships, constituencies, districts or communes"
        )]
        granularity: Granularity,

        #[arg(
            long,
            value_name = "LEVEL=ID",
            value_parser = parse_within,
            help = "Only the units inside this parent unit, e.g. voivodships=w1"
        )]
        within: Option<Within>,
    },

    #[command(about = "Print the effective schema")]
    Schema,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Per-unit line of the `partition` command.
#[derive(Debug, Serialize)]
struct UnitSummary {
    unit: String,
    name: Option<String>,
    districts: usize,
    communes: usize,
    polling_districts: usize,
    protocols: usize,
    candidates: usize,
    mandates: usize,
    result_rows: usize,
}

#[derive(Debug, Serialize)]
struct PartitionReport {
    granularity: Granularity,
    #[serde(skip_serializing_if = "Option::is_none")]
    within: Option<Within>,
    units: Vec<UnitSummary>,
}

/// Parent unit a partition run is limited to.
#[derive(Clone, Debug, Serialize)]
struct Within {
    granularity: Granularity,
    unit: String,
}

fn parse_within(raw: &str) -> Result<Within, String> {
    let (level, unit) = raw
        .split_once('=')
        .ok_or_else(|| format!("invalid --within '{raw}', expected LEVEL=ID"))?;
    if unit.is_empty() {
        return Err(format!("invalid --within '{raw}', missing unit id"));
    }
    let granularity = level.parse::<Granularity>().map_err(|err| err.to_string())?;
    Ok(Within {
        granularity,
        unit: unit.to_string(),
    })
}

fn main() {
    init_tracing();
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let config = CliConfig::load(cli.config.clone())?;
    debug!(config = ?config.path(), "loaded cli config");
    let ui = Ui::new(cli.theme, cli.quiet || cli.format == OutputFormat::Json);
    let schema = resolve_schema(&cli, &config)?;

    match &cli.command {
        Command::Tables => {
            let store = open_store(&cli, &config)?;
            let report = stats(&store)?;
            emit(cli.format, &report, || print_tables_text(&ui, &report))?;
        }
        Command::Get { table, id } => {
            let store = open_store(&cli, &config)?;
            let record = store.table(table)?.record(id)?;
            emit(cli.format, &record, || {
                ui.section(
                    &format!("{table} / {id}"),
                    record.fields.iter().map(|(k, v)| (k.as_str(), v)),
                )
            })?;
        }
        Command::Find {
            table,
            terms,
            fields,
            first,
        } => {
            let store = open_store(&cli, &config)?;
            let table = store.table(table)?;
            let query = parse_query(terms)?;
            match fields {
                Some(raw) => {
                    let projection = parse_projection(raw)?;
                    let rows: Vec<Value> = if *first {
                        table.project_one(&query, &projection).into_iter().map(projected).collect()
                    } else {
                        table.project(&query, &projection).into_iter().map(projected).collect()
                    };
                    emit(cli.format, &rows, || {
                        for row in &rows {
                            println!("{row}");
                        }
                    })?;
                }
                None => {
                    let records = if *first {
                        table.find_one(&query).into_iter().collect()
                    } else {
                        table.find(&query)
                    };
                    emit(cli.format, &records, || {
                        for record in &records {
                            ui.section(
                                &record.id,
                                record.fields.iter().map(|(k, v)| (k.as_str(), v)),
                            );
                        }
                        ui.info(&format!("{} matching records", records.len()));
                    })?;
                }
            }
        }
        Command::Verify => {
            let store = open_store(&cli, &config)?;
            let report = verify(&store, &schema)?;
            emit(cli.format, &report, || print_verify_text(&ui, &report))?;
            if !report.success {
                std::process::exit(2);
            }
        }
        Command::Partition {
            granularity,
            within,
        } => {
            let store = open_store(&cli, &config)?;
            let report = run_partition(&ui, &store, schema, *granularity, within.clone())?;
            emit(cli.format, &report, || print_partition_text(&ui, &report))?;
        }
        Command::Schema => {
            emit(cli.format, &schema, || print!("{}", schema_text(&schema)))?;
        }
    }
    Ok(())
}

fn resolve_schema(cli: &Cli, config: &CliConfig) -> Result<Schema, Box<dyn Error>> {
    let path = cli.schema.as_ref().or(config.schema_path());
    Ok(match path {
        Some(path) => Schema::load(path)?,
        None => Schema::default(),
    })
}

fn open_store(cli: &Cli, config: &CliConfig) -> Result<Store, Box<dyn Error>> {
    let path = cli
        .db
        .as_ref()
        .or(config.default_db_path())
        .ok_or("no store directory given and no default set in cli.toml")?;
    let mut options = StoreOptions::read_only();
    options.load_limit = cli.limit.or(config.load_limit());
    if let Some(delimiter) = cli.delimiter {
        options.delimiter = u8::try_from(delimiter)
            .map_err(|_| format!("delimiter '{delimiter}' is not a single byte"))?;
    } else if let Some(delimiter) = config.delimiter()? {
        options.delimiter = delimiter;
    }
    Ok(Store::open_with_options(path, options)?)
}

fn run_partition(
    ui: &Ui,
    store: &Store,
    schema: Schema,
    granularity: Granularity,
    within: Option<Within>,
) -> Result<PartitionReport, Box<dyn Error>> {
    let task = ui.task("building hierarchy index");
    let index = HierarchyIndex::build(store, schema)?;
    let elapsed = task.finish();
    debug!(elapsed = %format_duration(elapsed), "hierarchy index ready");

    let partitioner = Partitioner::new(store, &index);
    let units = match &within {
        Some(parent) => partitioner
            .units_within(granularity, parent.granularity, &parent.unit)?
            .len(),
        None => index.units(granularity).len(),
    };
    let bar = ui.progress(&format!("partitioning {granularity}"), units as u64);
    let name_field = "name";
    let summarize = |unit: &Record, sub: &Store| {
        let len = |kind: EntityKind| {
            sub.table(index.schema().table(kind))
                .map(|t| t.len())
                .unwrap_or(0)
        };
        let result_rows = sub
            .table_names()
            .iter()
            .filter(|name| index.schema().is_results_table(name))
            .filter_map(|name| sub.table(name).ok())
            .map(|t| t.len())
            .sum();
        let summary = UnitSummary {
            unit: unit.id.clone(),
            name: unit
                .get(name_field)
                .and_then(|v| v.as_str().map(str::to_string)),
            districts: len(EntityKind::District),
            communes: len(EntityKind::Commune),
            polling_districts: len(EntityKind::PollingDistrict),
            protocols: len(EntityKind::Protocol),
            candidates: len(EntityKind::Candidate),
            mandates: len(EntityKind::Mandate),
            result_rows,
        };
        bar.inc(1);
        summary
    };
    let summaries = match &within {
        Some(parent) => partitioner.map_units_within(
            granularity,
            parent.granularity,
            &parent.unit,
            summarize,
        )?,
        None => partitioner.map_units(granularity, summarize)?,
    };
    bar.finish_and_clear();
    debug!(units = summaries.len(), "partitioned store");

    Ok(PartitionReport {
        granularity,
        within,
        units: summaries.into_iter().map(|(_, summary)| summary).collect(),
    })
}

fn parse_query(terms: &[String]) -> Result<Query, Box<dyn Error>> {
    let mut query = Query::all();
    for term in terms {
        let (field, raw) = term
            .split_once('=')
            .ok_or_else(|| format!("invalid --where term '{term}', expected FIELD=VALUE"))?;
        let field = field.trim();
        if field.is_empty() {
            return Err(format!("--where term '{term}' has no field name").into());
        }
        query = query.eq(field, codec::parse_cell(raw).unwrap_or(Value::Null));
    }
    Ok(query)
}

fn parse_projection(raw: &str) -> Result<Projection, Box<dyn Error>> {
    let names: Vec<Value> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(Value::from)
        .collect();
    let value = match names.len() {
        1 => names.into_iter().next().unwrap_or(Value::Null),
        _ => Value::List(names),
    };
    Ok(Projection::try_from(value)?)
}

fn projected(value: Projected) -> Value {
    match value {
        Projected::Value(value) => value,
        Projected::Row(values) => Value::List(values),
    }
}

fn schema_text(schema: &Schema) -> String {
    schema
        .to_toml_string()
        .unwrap_or_else(|err| format!("# {err}\n"))
}

fn emit<T, F>(format: OutputFormat, value: &T, printer: F) -> Result<(), Box<dyn Error>>
where
    T: Serialize,
    F: FnOnce(),
{
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{json}");
        }
        OutputFormat::Text => printer(),
    }
    Ok(())
}

fn print_tables_text(ui: &Ui, report: &StatsReport) {
    ui.section(
        "Store",
        [
            (
                "directory",
                report.directory.clone().unwrap_or_else(|| "-".into()),
            ),
            ("tables", report.tables.len().to_string()),
            ("records", report.record_count.to_string()),
        ],
    );
    ui.list(
        "Tables",
        report.tables.iter().map(|t| {
            format!("{} ({} records): {}", t.name, t.records, t.fields.join(", "))
        }),
    );
}

fn print_verify_text(ui: &Ui, report: &VerifyReport) {
    let c = &report.counts;
    ui.section(
        "Counts",
        [
            ("voivodships", c.voivodships),
            ("constituencies", c.constituencies),
            ("districts", c.districts),
            ("communes", c.communes),
            ("polling districts", c.polling_districts),
            ("protocols", c.protocols),
            ("lists", c.lists),
            ("candidates", c.candidates),
            ("mandates", c.mandates),
            ("result rows", c.result_rows),
        ],
    );
    for finding in &report.findings {
        match finding.severity {
            VerifySeverity::Info => ui.info(&finding.message),
            VerifySeverity::Warning => ui.warn(&finding.message),
            VerifySeverity::Error => ui.error(&finding.message),
        }
    }
    if report.success {
        ui.success("hierarchy is consistent");
    }
}

fn print_partition_text(ui: &Ui, report: &PartitionReport) {
    ui.list(
        &match &report.within {
            Some(parent) => format!(
                "{} {} in {} {}",
                report.units.len(),
                report.granularity,
                parent.granularity,
                parent.unit
            ),
            None => format!("{} {}", report.units.len(), report.granularity),
        },
        report.units.iter().map(|u| {
            let label = match &u.name {
                Some(name) => format!("{} ({name})", u.unit),
                None => u.unit.clone(),
            };
            format!(
                "{label}: districts={} communes={} polling_districts={} protocols={} candidates={} mandates={} result_rows={}",
                u.districts,
                u.communes,
                u.polling_districts,
                u.protocols,
                u.candidates,
                u.mandates,
                u.result_rows
            )
        }),
    );
}
