use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use docquery_core::{FieldSchema, LessFn, Query, StaticSchema, Value};
use std::cmp::Ordering;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "docquery")]
#[command(about = "Validate filter queries and run them over NDJSON records", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Validate a query and print its normalized form
    Check {
        #[arg(long)]
        schema: PathBuf,
        query: String,
    },
    /// Print the records a query matches, one JSON object per line
    Filter {
        #[arg(long)]
        schema: PathBuf,
        /// NDJSON file to read instead of stdin
        #[arg(long)]
        input: Option<PathBuf>,
        /// Field to sort by; it needs an ordered validator
        #[arg(long)]
        sort: Option<String>,
        #[arg(long)]
        desc: bool,
        #[arg(long)]
        limit: Option<usize>,
        query: String,
    },
}

fn load_schema(path: &Path) -> Result<StaticSchema> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading schema {}", path.display()))?;
    StaticSchema::from_json_str(&text)
        .with_context(|| format!("loading schema {}", path.display()))
}

fn read_records(reader: impl BufRead, schema: &StaticSchema) -> Result<Vec<Value>> {
    let mut out = Vec::new();
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let raw: serde_json::Value =
            serde_json::from_str(&line).with_context(|| format!("record on line {}", n + 1))?;
        let mut record = Value::from(raw);
        schema.normalize_record(&mut record);
        out.push(record);
    }
    Ok(out)
}

fn ordering(less: LessFn, a: &Value, b: &Value) -> Ordering {
    if less(a, b) {
        Ordering::Less
    } else if less(b, a) {
        Ordering::Greater
    } else {
        Ordering::Equal
    }
}

// Records whose field is missing or not valid for the field sort last, in
// either direction.
fn sort_records(records: &mut [&Value], schema: &StaticSchema, field: &str, desc: bool) -> Result<()> {
    let validator = schema
        .field(field)
        .and_then(|d| d.validator.clone())
        .with_context(|| format!("cannot sort on {field}: no validator declared"))?;
    let Some(less) = validator.less() else {
        bail!("cannot sort on {field}: values have no ordering");
    };
    let key = |r: &Value| {
        r.lookup(field)
            .filter(|v| validator.validate(v).is_ok())
            .cloned()
    };
    records.sort_by(|a, b| match (key(*a), key(*b)) {
        (Some(a), Some(b)) => {
            let ord = ordering(less, &a, &b);
            if desc {
                ord.reverse()
            } else {
                ord
            }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Cmd::Check { schema, query } => {
            let schema = load_schema(&schema)?;
            let query = Query::parse(&query, &schema)?;
            println!("{}", serde_json::to_string_pretty(&query.to_json())?);
        }
        Cmd::Filter {
            schema,
            input,
            sort,
            desc,
            limit,
            query,
        } => {
            let schema = load_schema(&schema)?;
            let query = Query::parse(&query, &schema)?;
            let records = match input {
                Some(path) => {
                    let f = std::fs::File::open(&path)
                        .with_context(|| format!("opening {}", path.display()))?;
                    read_records(BufReader::new(f), &schema)?
                }
                None => read_records(std::io::stdin().lock(), &schema)?,
            };
            let mut matched = query.filter(&records);
            tracing::info!(matched = matched.len(), total = records.len(), "filtered records");
            if let Some(field) = sort {
                sort_records(&mut matched, &schema, &field, desc)?;
            }
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            for record in matched.into_iter().take(limit.unwrap_or(usize::MAX)) {
                serde_json::to_writer(&mut out, &serde_json::Value::from(record))?;
                writeln!(out)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> StaticSchema {
        StaticSchema::from_json_str(
            r#"{"fields": {
                "age": {"validator": {"type": "integer"}},
                "name": {},
                "seen": {"validator": {"type": "time"}}
            }}"#,
        )
        .unwrap()
    }

    fn records(schema: &StaticSchema) -> Vec<Value> {
        let input = concat!(
            "{\"name\": \"a\", \"age\": 30, \"seen\": \"2020-01-02T00:00:00Z\"}\n",
            "\n",
            "{\"name\": \"b\", \"age\": \"old\"}\n",
            "{\"name\": \"c\", \"age\": 20.0, \"seen\": \"Wed, 01 Jan 2020 23:00:00 +0100\"}\n",
        );
        read_records(input.as_bytes(), schema).unwrap()
    }

    fn names(records: &[&Value]) -> Vec<String> {
        records
            .iter()
            .filter_map(|r| r.lookup("name").and_then(Value::as_str).map(str::to_owned))
            .collect()
    }

    #[test]
    fn reads_and_normalizes_ndjson() {
        let schema = schema();
        let records = records(&schema);
        assert_eq!(records.len(), 3);
        assert!(records[2].lookup("seen").and_then(Value::as_time).is_some());
        assert!(read_records("{\"a\": 1}\nnope\n".as_bytes(), &schema).is_err());
    }

    #[test]
    fn sorts_with_incomparable_records_last() {
        let schema = schema();
        let records = records(&schema);
        let mut refs: Vec<&Value> = records.iter().collect();

        sort_records(&mut refs, &schema, "age", false).unwrap();
        assert_eq!(names(&refs), ["c", "a", "b"]);
        sort_records(&mut refs, &schema, "age", true).unwrap();
        assert_eq!(names(&refs), ["a", "c", "b"]);
        sort_records(&mut refs, &schema, "seen", false).unwrap();
        assert_eq!(names(&refs), ["c", "a", "b"]);

        assert!(sort_records(&mut refs, &schema, "name", false).is_err());
        assert!(sort_records(&mut refs, &schema, "missing", false).is_err());
    }

    #[test]
    fn filters_then_renders_json() {
        let schema = schema();
        let records = records(&schema);
        let query = Query::from_json(json!({"age": {"$lt": 25}}), &schema).unwrap();
        let matched = query.filter(&records);
        assert_eq!(
            serde_json::Value::from(matched[0]),
            json!({"name": "c", "age": 20, "seen": "2020-01-01T22:00:00Z"})
        );
    }
}
