use std::fmt::Display;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};
use sqlmill_core::fs::{DIR_MODE, FILE_MODE, OpenFlags};
use sqlmill_core::{Database, DirFs, FileSystem, Params, RowSet, Runner, TIMESTAMP_FORMAT, Value};
use sqlmill_db::{Config, DATABASE_URL_ENV, DbError};
use sqlmill_migrate::{Executor, Interrupted, Status};
use sqlmill_schema::codegen::{self, ModelOptions};
use sqlmill_schema::introspect::{self, Selection};
use sqlmill_schema::query::{self, QueryOptions};
use sqlmill_schema::{OrmType, Schema, Tag, inflect};
use tracing::debug;
use tracing_subscriber::EnvFilter;

const EXIT_CONFIG: i32 = 101;
const EXIT_MIGRATION: i32 = 103;
const EXIT_ROUTINE: i32 = 104;
const EXIT_SCHEMA: i32 = 105;

#[derive(Debug, Parser)]
#[command(name = "sqlmill", version)]
#[command(about = "Database migrations, named SQL routines, and model generation")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct GlobalArgs {
    /// Raise log verbosity (-v info, -vv debug).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Project directory holding migrations, routines, and sqlmill.yml.
    #[arg(long, default_value = "database", global = true)]
    dir: PathBuf,
    /// Configuration file (default: <dir>/sqlmill.yml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Database URL such as sqlite3://app.db (overrides SQLMILL_DATABASE_URL).
    #[arg(long, global = true)]
    database_url: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create, apply, and revert migrations.
    Migration(MigrationArgs),
    /// Run and generate named SQL routines.
    #[command(alias = "script")]
    Routine(RoutineArgs),
    /// Generate Rust models from the database schema.
    #[command(alias = "model")]
    Schema(SchemaArgs),
}

#[derive(Debug, Args)]
struct MigrationArgs {
    #[command(subcommand)]
    operation: MigrationOperation,
}

#[derive(Debug, Subcommand)]
enum MigrationOperation {
    /// Write the setup migration that creates the ledger table.
    Setup,
    /// Create a new migration skeleton.
    Create(CreateMigrationArgs),
    /// Apply pending migrations.
    Run(RunArgs),
    /// Revert applied migrations.
    Revert(RevertArgs),
    /// Show applied and pending migrations.
    Status,
}

#[derive(Debug, Args)]
struct CreateMigrationArgs {
    /// Description of the migration, used in its file name.
    name: String,
}

#[derive(Debug, Args)]
struct RunArgs {
    /// Number of migrations to apply; negative applies all.
    #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
    count: i64,
}

#[derive(Debug, Args)]
struct RevertArgs {
    /// Number of migrations to revert; negative reverts all.
    #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
    count: i64,
}

#[derive(Debug, Args)]
struct RoutineArgs {
    #[command(subcommand)]
    operation: RoutineOperation,
}

#[derive(Debug, Subcommand)]
enum RoutineOperation {
    /// Create a routine file.
    Create(CreateRoutineArgs),
    /// Run a routine and print its result.
    Run(RunRoutineArgs),
    /// Generate CRUD routines for the database schema.
    Sync(QueryArgs),
    /// Print generated CRUD routines.
    Print(QueryArgs),
}

#[derive(Debug, Args)]
struct CreateRoutineArgs {
    /// Routine file name.
    #[arg(short = 'n', long = "filename")]
    name: String,
}

#[derive(Debug, Args)]
struct RunRoutineArgs {
    /// Routine name.
    name: String,
    /// Routine argument; `name=value` binds a named parameter. Repeatable.
    #[arg(long = "param")]
    params: Vec<String>,
}

#[derive(Debug, Args)]
struct SelectionArgs {
    /// Schema to read (default: the dialect's default schema).
    #[arg(long)]
    schema_name: Option<String>,
    /// Table to include. Repeatable; every table when omitted.
    #[arg(long = "table-name")]
    table_names: Vec<String>,
    /// Table to skip. Repeatable; defaults to the configured list.
    #[arg(long = "ignore-table-name")]
    ignore_table_names: Vec<String>,
}

#[derive(Debug, Args)]
struct QueryArgs {
    #[command(flatten)]
    selection: SelectionArgs,
    /// Use `:column` placeholders instead of `?`.
    #[arg(long)]
    use_named_params: bool,
}

#[derive(Debug, Args)]
struct SchemaArgs {
    #[command(subcommand)]
    operation: SchemaOperation,
}

#[derive(Debug, Subcommand)]
enum SchemaOperation {
    /// Print the generated models or the introspected schema.
    Print(SchemaPrintArgs),
    /// Write generated models to the package directory.
    Sync(ModelArgs),
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Rust,
    Json,
}

#[derive(Debug, Args)]
struct SchemaPrintArgs {
    #[command(flatten)]
    model: ModelArgs,
    #[arg(long, value_enum, default_value_t = Format::Rust)]
    format: Format,
}

#[derive(Debug, Args)]
struct ModelArgs {
    #[command(flatten)]
    selection: SelectionArgs,
    /// Directory receiving generated models, relative to the project.
    #[arg(long)]
    package_dir: Option<PathBuf>,
    /// Database-facing attributes: sqlx, sea-orm or none.
    #[arg(long)]
    orm_type: Option<String>,
    /// Serialization and validation tags: json, xml, validate.
    #[arg(long = "tag", value_delimiter = ',')]
    tags: Vec<String>,
    /// Prefix type names with the schema name.
    #[arg(long)]
    keep_schema: bool,
    /// Emit doc comments on generated types and fields.
    #[arg(long)]
    include_docs: bool,
}

/// A command failure with the process exit code it maps to.
#[derive(Debug)]
struct Failure {
    code: i32,
    message: String,
}

impl Failure {
    fn new(code: i32, message: impl Display) -> Self {
        Self {
            code,
            message: message.to_string(),
        }
    }
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = if err.use_stderr() { EXIT_CONFIG } else { 0 };
            let _ = err.print();
            std::process::exit(code);
        }
    };
    init_logging(cli.global.verbose);

    let result = Project::load(&cli.global).and_then(|project| match cli.command {
        Command::Migration(args) => run_migration(&project, args),
        Command::Routine(args) => run_routine(&project, args),
        Command::Schema(args) => run_schema(&project, args),
    });

    if let Err(failure) = result {
        eprintln!("error: {}", failure.message);
        std::process::exit(failure.code);
    }
}

/// Logs go to stderr; `RUST_LOG` wins over `-v`.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("sqlmill={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

// ---------------------------------------------------------------------------
// Project
// ---------------------------------------------------------------------------

/// Resolved settings shared by every command.
struct Project {
    dir: PathBuf,
    config: Config,
    database_url: Option<String>,
}

impl Project {
    fn load(global: &GlobalArgs) -> Result<Self, Failure> {
        let config = match &global.config {
            Some(path) => Config::load(path),
            None => Config::discover(&global.dir),
        }
        .map_err(|err| Failure::new(EXIT_CONFIG, err))?;
        let env = std::env::var(DATABASE_URL_ENV).ok();
        let database_url =
            config.resolve_database_url(global.database_url.as_deref(), env.as_deref());
        debug!(dir = %global.dir.display(), "project loaded");
        Ok(Self {
            dir: global.dir.clone(),
            config,
            database_url,
        })
    }

    /// Opens the database; connection failures exit with `code`.
    fn connect(&self, code: i32) -> Result<Box<dyn Database>, Failure> {
        let url = self.database_url.as_deref().ok_or_else(|| {
            Failure::new(
                EXIT_CONFIG,
                format!("no database url; pass --database-url or set {DATABASE_URL_ENV}"),
            )
        })?;
        sqlmill_db::connect(url).map_err(|err| match err {
            DbError::Connect(_) => Failure::new(code, err),
            other => Failure::new(EXIT_CONFIG, other),
        })
    }

    /// A filesystem rooted at `relative` under the project, created if
    /// missing.
    fn dir_fs(&self, relative: &Path, code: i32) -> Result<DirFs, Failure> {
        let root = if relative.is_absolute() {
            relative.to_path_buf()
        } else {
            self.dir.join(relative)
        };
        let fs = DirFs::new(root);
        fs.mkdir_all(Path::new(""), DIR_MODE)
            .map_err(|err| Failure::new(code, err))?;
        Ok(fs)
    }

    fn load_schema(&self, args: &SelectionArgs, code: i32) -> Result<Schema, Failure> {
        let mut db = self.connect(code)?;
        let selection = Selection {
            schema_name: args
                .schema_name
                .clone()
                .or_else(|| self.config.model.schema_name.clone()),
            table_names: args.table_names.clone(),
        };
        introspect::load(db.as_mut(), &selection).map_err(|err| Failure::new(code, err))
    }

    fn ignore_tables(&self, args: &SelectionArgs) -> Vec<String> {
        if args.ignore_table_names.is_empty() {
            self.config.model.ignore_tables.clone()
        } else {
            args.ignore_table_names.clone()
        }
    }

    fn package_dir(&self, args: &ModelArgs) -> PathBuf {
        args.package_dir
            .clone()
            .unwrap_or_else(|| self.config.model.package_dir.clone())
    }

    fn model_options(&self, args: &ModelArgs) -> Result<ModelOptions, Failure> {
        let model = &self.config.model;
        let orm: OrmType = args
            .orm_type
            .as_deref()
            .unwrap_or(&model.orm_type)
            .parse()
            .map_err(|err| Failure::new(EXIT_CONFIG, err))?;
        let tags = if args.tags.is_empty() {
            Tag::parse_all(&model.tags)
        } else {
            Tag::parse_all(&args.tags)
        }
        .map_err(|err| Failure::new(EXIT_CONFIG, err))?;
        let package = self
            .package_dir(args)
            .file_name()
            .map_or_else(|| "models".to_string(), |name| name.to_string_lossy().into_owned());
        Ok(ModelOptions {
            package,
            ignore_tables: self.ignore_tables(&args.selection),
            include_docs: args.include_docs || model.include_docs,
            keep_schema: args.keep_schema || model.keep_schema,
            orm,
            tags,
        })
    }
}

// ---------------------------------------------------------------------------
// Migrations
// ---------------------------------------------------------------------------

fn run_migration(project: &Project, args: MigrationArgs) -> Result<(), Failure> {
    let fs = project.dir_fs(&project.config.migrations_dir, EXIT_MIGRATION)?;
    let mut db = project.connect(EXIT_MIGRATION)?;
    let mut executor = Executor::new(&fs, db.as_mut());
    let failed = |err: sqlmill_migrate::MigrationError| Failure::new(EXIT_MIGRATION, err);

    match args.operation {
        MigrationOperation::Setup => {
            if executor.setup().map_err(failed)? {
                println!("Created setup migration in '{}'.", fs.root().display());
            } else {
                println!("Setup migration already exists.");
            }
        }
        MigrationOperation::Create(args) => {
            let migration = executor.create(&args.name).map_err(failed)?;
            println!(
                "Created migration '{}'.",
                fs.root().join(migration.filename()).display()
            );
        }
        MigrationOperation::Run(args) => {
            let applied = executor.run(args.count).map_err(|err| interrupted(err, "applied"))?;
            println!("Applied {applied} migration(s).");
        }
        MigrationOperation::Revert(args) => {
            let reverted = executor
                .revert(args.count)
                .map_err(|err| interrupted(err, "reverted"))?;
            println!("Reverted {reverted} migration(s).");
        }
        MigrationOperation::Status => {
            let status = executor.status().map_err(failed)?;
            print_status(&status)?;
        }
    }
    Ok(())
}

fn interrupted(err: Interrupted, verb: &str) -> Failure {
    Failure::new(
        EXIT_MIGRATION,
        format!("{} ({} migration(s) {verb} before the failure)", err.source, err.completed),
    )
}

fn print_status(status: &Status) -> Result<(), Failure> {
    let mut rows = RowSet::new(
        ["Id", "Description", "Status", "Applied At"]
            .iter()
            .map(|c| c.to_string())
            .collect(),
    );
    for migration in &status.migrations {
        let (state, applied_at) = match migration.created_at {
            Some(at) => ("applied", at.format(TIMESTAMP_FORMAT).to_string()),
            None => ("pending", String::new()),
        };
        rows.rows.push(vec![
            Value::from(migration.id.as_str()),
            Value::from(migration.description.as_str()),
            Value::from(state),
            Value::from(applied_at),
        ]);
    }
    print_rows(&rows, EXIT_MIGRATION)?;
    println!("{} applied, {} pending.", status.applied, status.pending);
    Ok(())
}

// ---------------------------------------------------------------------------
// Routines
// ---------------------------------------------------------------------------

/// Arguments of `routine run`, either all positional or all named.
#[derive(Debug, PartialEq)]
enum Arguments {
    Positional(Vec<Value>),
    Named(Params),
}

fn run_routine(project: &Project, args: RoutineArgs) -> Result<(), Failure> {
    let fs = project.dir_fs(&project.config.routines_dir, EXIT_ROUTINE)?;
    let failed = |err: sqlmill_core::CoreError| Failure::new(EXIT_ROUTINE, err);

    match args.operation {
        RoutineOperation::Create(args) => {
            let name = inflect::kebab(&args.name);
            if name.is_empty() {
                return Err(Failure::new(
                    EXIT_CONFIG,
                    format!("routine name '{}' is invalid", args.name),
                ));
            }
            let path = PathBuf::from(format!("{}.sql", inflect::snake(&args.name)));
            let mut file = fs
                .open_file(&path, OpenFlags::create_new(), FILE_MODE)
                .map_err(|err| Failure::new(EXIT_ROUTINE, err))?;
            file.write_all(routine_template(&name).as_bytes())
                .map_err(|err| Failure::new(EXIT_ROUTINE, err))?;
            println!("Created routine file '{}'.", fs.root().join(path).display());
        }
        RoutineOperation::Run(args) => {
            let arguments = parse_params(&args.params)?;
            let mut db = project.connect(EXIT_ROUTINE)?;
            let mut runner = Runner::new(&fs, db.as_mut());
            let rows = match arguments {
                Arguments::Positional(values) => runner.run(&args.name, values),
                Arguments::Named(params) => runner.run_named(&args.name, params),
            }
            .map_err(failed)?;
            if !rows.columns.is_empty() {
                print_rows(&rows, EXIT_ROUTINE)?;
            }
        }
        RoutineOperation::Sync(args) => {
            let schema = project.load_schema(&args.selection, EXIT_ROUTINE)?;
            let options = query_options(project, &args);
            match query::sync(&fs, &schema, &options).map_err(|err| Failure::new(EXIT_ROUTINE, err))? {
                Some(path) => println!("Wrote routines to '{}'.", fs.root().join(path).display()),
                None => println!("No tables to generate routines for."),
            }
        }
        RoutineOperation::Print(args) => {
            let schema = project.load_schema(&args.selection, EXIT_ROUTINE)?;
            print!("{}", query::generate(&schema, &query_options(project, &args)));
        }
    }
    Ok(())
}

fn query_options(project: &Project, args: &QueryArgs) -> QueryOptions {
    QueryOptions {
        ignore_tables: project.ignore_tables(&args.selection),
        use_named_params: args.use_named_params,
    }
}

fn routine_template(name: &str) -> String {
    format!(
        "-- Routines in this file run with `sqlmill routine run <name>`.\n\n\
         -- name: {name}\n\
         SELECT 1;\n"
    )
}

/// Splits `--param` values into positional or `name=value` arguments.
fn parse_params(raw: &[String]) -> Result<Arguments, Failure> {
    let pairs: Vec<Option<(&str, &str)>> = raw
        .iter()
        .map(|param| param.split_once('=').filter(|(name, _)| is_identifier(name)))
        .collect();

    if !pairs.is_empty() && pairs.iter().all(Option::is_some) {
        let params = pairs
            .into_iter()
            .flatten()
            .map(|(name, value)| (name.to_string(), Value::from(value)))
            .collect();
        return Ok(Arguments::Named(params));
    }
    if pairs.iter().all(Option::is_none) {
        return Ok(Arguments::Positional(
            raw.iter().map(|param| Value::from(param.as_str())).collect(),
        ));
    }
    Err(Failure::new(
        EXIT_CONFIG,
        "--param values must be either all positional or all name=value",
    ))
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

fn run_schema(project: &Project, args: SchemaArgs) -> Result<(), Failure> {
    let failed = |err: sqlmill_schema::SchemaError| Failure::new(EXIT_SCHEMA, err);

    match args.operation {
        SchemaOperation::Print(args) => {
            let options = project.model_options(&args.model)?;
            let mut schema = project.load_schema(&args.model.selection, EXIT_SCHEMA)?;
            match args.format {
                Format::Rust => print!("{}", codegen::generate(&schema, &options).map_err(failed)?),
                Format::Json => {
                    schema
                        .tables
                        .retain(|table| !options.ignore_tables.contains(&table.name));
                    let json = serde_json::to_string_pretty(&schema)
                        .map_err(|err| Failure::new(EXIT_SCHEMA, err))?;
                    println!("{json}");
                }
            }
        }
        SchemaOperation::Sync(args) => {
            let options = project.model_options(&args)?;
            let schema = project.load_schema(&args.selection, EXIT_SCHEMA)?;
            let fs = project.dir_fs(&project.package_dir(&args), EXIT_SCHEMA)?;
            match codegen::sync(&fs, &schema, &options).map_err(failed)? {
                Some(path) => println!("Wrote models to '{}'.", fs.root().join(path).display()),
                None => println!("No tables to generate models for."),
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn print_rows(rows: &RowSet, code: i32) -> Result<(), Failure> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    sqlmill_core::print(&mut out, rows).map_err(|err| Failure::new(code, err))
}
