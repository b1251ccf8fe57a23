//! bucketlog CLI
//!
//! Drives the engine against a local directory acting as a bucket.

use std::cmp::Ordering;
use std::io::{self, BufWriter, Write};

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use bucketlog::{
    BucketLogError, ColumnDef, Command, Config, Engine, Result, Row, Schema, Value, Variant,
};

/// bucketlog CLI
#[derive(Parser, Debug)]
#[command(name = "bucketlog")]
#[command(about = "Log-family tables stored as objects in a bucket")]
#[command(version)]
struct Args {
    /// Bucket directory
    #[arg(short, long, default_value = "./bucketlog_data")]
    bucket: String,

    /// Read column files one at a time
    #[arg(long)]
    serial_reads: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a table: `create hits Log id:UInt64 name:Nullable(String)`
    Create {
        table: String,

        /// TinyLog or Log
        variant: String,

        /// Columns as name:Type
        #[arg(required = true)]
        columns: Vec<String>,
    },

    /// Insert rows, each a comma-separated list of values (`\N` for null)
    Insert {
        table: String,

        #[arg(required = true)]
        rows: Vec<String>,
    },

    /// Print every row, tab-separated
    Select {
        table: String,

        /// Only these columns, comma-separated
        #[arg(long, value_delimiter = ',')]
        columns: Option<Vec<String>>,

        /// Sort the output by a selected column
        #[arg(long)]
        order_by: Option<String>,
    },

    /// Delete every object of a table
    Truncate { table: String },

    /// Delete a table
    Drop { table: String },

    /// List tables
    Tables,

    /// List the objects of a table
    Objects { table: String },
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,bucketlog=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        tracing::error!("{}", e);
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let config = Config::builder()
        .bucket_dir(&args.bucket)
        .parallel_reads(!args.serial_reads)
        .build();

    let engine = Engine::open(config)?;
    let mut out = BufWriter::new(io::stdout().lock());

    match args.command {
        Commands::Create {
            table,
            variant,
            columns,
        } => {
            let variant: Variant = variant.parse()?;
            let columns = columns
                .iter()
                .map(|c| ColumnDef::parse(c))
                .collect::<Result<Vec<_>>>()?;

            engine.execute(Command::CreateTable {
                name: table,
                schema: Schema::new(columns)?,
                variant,
            })?;
        }

        Commands::Insert { table, rows } => {
            let schema = engine.schema(&table)?;
            let rows = rows
                .iter()
                .map(|line| parse_row(&schema, line))
                .collect::<Result<Vec<_>>>()?;
            let count = rows.len();

            engine.execute(Command::Insert { table, rows })?;
            writeln!(out, "{} rows inserted", count)?;
        }

        Commands::Select {
            table,
            columns,
            order_by,
        } => {
            let header = match &columns {
                Some(columns) => columns.clone(),
                None => engine
                    .schema(&table)?
                    .columns()
                    .iter()
                    .map(|c| c.name.clone())
                    .collect(),
            };

            let mut rows = engine
                .execute(Command::Select { table, columns })?
                .unwrap_or_default();

            if let Some(column) = order_by {
                let pos = header.iter().position(|c| *c == column).ok_or_else(|| {
                    BucketLogError::SchemaMismatch(format!(
                        "ORDER BY column {:?} is not selected",
                        column
                    ))
                })?;
                rows.sort_by(|a, b| a[pos].partial_cmp(&b[pos]).unwrap_or(Ordering::Equal));
            }

            for row in &rows {
                let line: Vec<String> = row.iter().map(Value::to_string).collect();
                writeln!(out, "{}", line.join("\t"))?;
            }
        }

        Commands::Truncate { table } => {
            engine.execute(Command::Truncate { table })?;
        }

        Commands::Drop { table } => {
            engine.execute(Command::DropTable { table })?;
        }

        Commands::Tables => {
            for name in engine.tables() {
                let variant = engine.variant(&name)?;
                let schema = engine.schema(&name)?;
                writeln!(out, "{}\t{}\t{}", name, variant, schema)?;
            }
        }

        Commands::Objects { table } => {
            for key in engine.list_objects(&table)? {
                let size = engine.store().size(&key)?.unwrap_or(0);
                writeln!(out, "{}\t{}", key, size)?;
            }
        }
    }

    out.flush()?;
    Ok(())
}

/// Parse `v1,v2,...` against the schema
fn parse_row(schema: &Schema, line: &str) -> Result<Row> {
    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() != schema.len() {
        return Err(BucketLogError::SchemaMismatch(format!(
            "row {:?} has {} values, table has {} columns",
            line,
            fields.len(),
            schema.len()
        )));
    }

    fields
        .iter()
        .zip(schema.columns())
        .map(|(field, column)| Value::parse(column, field))
        .collect()
}
