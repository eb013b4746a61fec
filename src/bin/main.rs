//! wrq CLI - compile Wrq requests to SQL and run them
//!
//! Usage:
//!   wrq compile --catalog <catalog.toml> [--dialect <dialect>] <request.xml>
//!   wrq run [--config <wrq.toml>] [--subject <id>] <request.xml>
//!
//! Examples:
//!   wrq compile --catalog catalog.toml --dialect oracle report.xml
//!   wrq compile --catalog catalog.toml --json report.xml
//!   wrq run --config wrq.toml --subject alice --grant region=EU,US report.xml

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use wrq::binding::{Catalog, CatalogRegistry};
use wrq::compiler::QueryBuilder;
use wrq::config::{SecuritySettings, Settings};
use wrq::execution::{DataLoader, RequestOptions, SqliteConnectionManager};
use wrq::request::{parse_request, WrqRequest};
use wrq::security::StaticSubject;
use wrq::sql::Dialect;
use wrq::writer::{WriterOptions, WrsWriter};

#[derive(Parser)]
#[command(name = "wrq")]
#[command(about = "wrq - compiles Wrq XML requests to SQL and streams Wrs results")]
#[command(version)]
struct Cli {
    /// Log level when RUST_LOG is not set
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the SQL for a request
    Compile {
        /// Path to the request document
        file: PathBuf,

        /// Catalog of binding sets
        #[arg(short, long)]
        catalog: PathBuf,

        /// SQL dialect to generate
        #[arg(short, long, default_value = "postgres")]
        dialect: DialectArg,

        /// Subject id for row-level security
        #[arg(short, long, default_value = "cli")]
        subject: String,

        /// Print the statement, binds and columns as JSON
        #[arg(long)]
        json: bool,
    },

    /// Execute a request and write Wrs XML to stdout
    Run {
        /// Path to the request document
        file: PathBuf,

        /// Config file (defaults to $WRQ_CONFIG or ./wrq.toml)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Subject id for row-level security
        #[arg(short, long, default_value = "cli")]
        subject: String,

        /// Permission values, as category=v1,v2 or category=*
        #[arg(long)]
        grant: Vec<String>,

        /// Plain rights, such as table read permissions
        #[arg(long)]
        right: Vec<String>,

        /// Include the statement and timings in the response
        #[arg(long)]
        debug: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum DialectArg {
    Ansi,
    Postgres,
    Redshift,
    Oracle,
    Sqlserver,
    Mysql,
    Sqlite,
}

impl From<DialectArg> for Dialect {
    fn from(arg: DialectArg) -> Self {
        match arg {
            DialectArg::Ansi => Dialect::Ansi,
            DialectArg::Postgres => Dialect::Postgres,
            DialectArg::Redshift => Dialect::Redshift,
            DialectArg::Oracle => Dialect::Oracle,
            DialectArg::Sqlserver => Dialect::SqlServer,
            DialectArg::Mysql => Dialect::MySql,
            DialectArg::Sqlite => Dialect::Sqlite,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Commands::Compile {
            file,
            catalog,
            dialect,
            subject,
            json,
        } => cmd_compile(&file, &catalog, dialect.into(), &subject, json),
        Commands::Run {
            file,
            config,
            subject,
            grant,
            right,
            debug,
        } => {
            let subject = match build_subject(&subject, &grant, &right) {
                Ok(s) => s,
                Err(e) => {
                    eprintln!("{}", e);
                    return ExitCode::FAILURE;
                }
            };
            cmd_run(&file, config.as_deref(), &subject, debug)
        }
    }
}

fn read_request(file: &Path) -> Option<WrqRequest> {
    let source = match fs::read_to_string(file) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error reading file '{}': {}", file.display(), e);
            return None;
        }
    };
    match parse_request(&source) {
        Ok(request) => Some(request),
        Err(e) => {
            eprintln!("Request error: {}", e);
            None
        }
    }
}

fn build_subject(id: &str, grants: &[String], rights: &[String]) -> Result<StaticSubject, String> {
    let mut subject = StaticSubject::new(id);
    for grant in grants {
        let (category, values) = grant
            .split_once('=')
            .ok_or_else(|| format!("invalid grant '{}', expected category=values", grant))?;
        subject = if values == "*" {
            subject.with_permission(category, wrq::security::Permission::All)
        } else {
            let values: Vec<&str> = values.split(',').map(str::trim).collect();
            subject.with_values(category, &values)
        };
    }
    for right in rights {
        subject = subject.with_right(right);
    }
    Ok(subject)
}

fn cmd_compile(file: &Path, catalog: &Path, dialect: Dialect, subject: &str, json: bool) -> ExitCode {
    let Some(request) = read_request(file) else {
        return ExitCode::FAILURE;
    };
    let catalog = match Catalog::from_file(catalog) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Catalog error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let security = SecuritySettings::default();
    let subject = StaticSubject::unrestricted(subject);
    match QueryBuilder::new(&catalog, dialect, &security, &subject).compile(&request) {
        Ok(compiled) if json => {
            let binds: Vec<_> = compiled
                .statement
                .binds()
                .iter()
                .map(|b| serde_json::json!({ "value": b.value(), "type": b.jdbc_type().name() }))
                .collect();
            let columns: Vec<_> = compiled
                .columns
                .iter()
                .map(|c| serde_json::json!({ "id": c.id, "type": c.ty.name(), "index": c.index }))
                .collect();
            let output = serde_json::json!({
                "dialect": dialect.to_string(),
                "sql": compiled.statement.sql(),
                "binds": binds,
                "columns": columns,
                "source_tables": compiled.source_tables,
            });
            match serde_json::to_string_pretty(&output) {
                Ok(text) => {
                    println!("{}", text);
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("Serialization error: {}", e);
                    ExitCode::FAILURE
                }
            }
        }
        Ok(compiled) => {
            println!("{}", compiled.statement.render_with_literals(dialect));
            for (i, bind) in compiled.statement.binds().iter().enumerate() {
                println!("-- ?{} = {} ({})", i + 1, bind.value(), bind.jdbc_type());
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Compilation error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn cmd_run(file: &Path, config: Option<&Path>, subject: &StaticSubject, debug: bool) -> ExitCode {
    let settings = match config {
        Some(path) => Settings::from_file(path),
        None => Settings::load(),
    };
    let settings = match settings {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Config error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let config_file = config
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("wrq.toml"));
    let catalog = match settings
        .catalog_path(&config_file)
        .map_err(|e| e.to_string())
        .and_then(|path| Catalog::from_file(path).map_err(|e| e.to_string()))
    {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Catalog error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let connections = match SqliteConnectionManager::from_settings(&settings) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Data source error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let Some(request) = read_request(file) else {
        return ExitCode::FAILURE;
    };

    let catalogs = CatalogRegistry::new(catalog);
    let debug = debug || settings.server.debug;
    let loader = DataLoader::new(RequestOptions {
        request: &request,
        catalogs: &catalogs,
        connections: &connections,
        subject,
        security: &settings.security,
        debug,
        max_rows: settings.server.max_rows,
    });

    let stdout = io::stdout();
    let mut writer = WrsWriter::new(stdout.lock(), WriterOptions { debug });
    match loader.load(&mut writer) {
        Ok(_) => {
            let mut out = writer.into_inner();
            let _ = writeln!(out);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
