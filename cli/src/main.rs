use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use command_params_core::{Document, SchemaChecker};
use command_params_db::{CatalogDatabase, DatabaseBuilder};
use command_params_engine::{
    EditSession, EditorConfig, ItemFlags, ItemId, ItemKind, ItemTree, StoredCommand, Validation,
    ValueOptions,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum OutputFormat {
    Json,
    Yaml,
}

#[derive(Debug, Parser)]
#[command(name = "command-params")]
#[command(about = "Check keyword catalogs and edit command documents against them")]
struct Cli {
    /// Editor configuration YAML.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Load and validate catalog directories or bundle files.
    Check(CheckArgs),
    /// Print the item tree of a command with flags and values.
    Tree(TreeArgs),
    /// Print the serialized document of a command.
    Show(ShowArgs),
    /// Validate a command document against its catalog.
    Validate(CommandArgs),
}

#[derive(Debug, Args)]
struct CheckArgs {
    /// Catalog directories and/or bundle files.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
}

#[derive(Debug, Args)]
struct CommandArgs {
    /// Catalog directory or bundle file. Repeat to list fallbacks, tried in
    /// order.
    #[arg(long, required = true)]
    catalog: Vec<PathBuf>,
    /// Command name in the catalog.
    #[arg(long)]
    command: String,
    /// Document to load (JSON, or YAML by extension).
    #[arg(long)]
    input: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct TreeArgs {
    #[command(flatten)]
    target: CommandArgs,
    /// Also print filtered, excluded and hidden items.
    #[arg(long)]
    all: bool,
}

#[derive(Debug, Args)]
struct ShowArgs {
    #[command(flatten)]
    target: CommandArgs,
    /// Include catalog defaults of unused keywords.
    #[arg(long)]
    with_defaults: bool,
    #[arg(long, default_value = "json")]
    format: OutputFormat,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Command::Check(args) => run_check(args),
        Command::Tree(args) => run_tree(args, cli.config.as_deref()),
        Command::Show(args) => run_show(args, cli.config.as_deref()),
        Command::Validate(args) => run_validate(args, cli.config.as_deref()),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn run_check(args: CheckArgs) -> Result<(), String> {
    let mut failed = 0usize;
    for input in &args.inputs {
        match load_catalog(input) {
            Ok(db) => println!("ok {}: {} command(s)", input.display(), db.len()),
            Err(err) => {
                println!("FAILED {}: {err}", input.display());
                failed += 1;
            }
        }
    }

    if failed > 0 {
        return Err(format!("{failed} of {} catalog(s) failed", args.inputs.len()));
    }
    Ok(())
}

fn run_tree(args: TreeArgs, config: Option<&Path>) -> Result<(), String> {
    let session = open_session(&args.target, config)?;
    let mut out = String::new();
    render_item(session.tree(), session.root(), 0, args.all, &mut out)?;
    print!("{out}");
    Ok(())
}

fn run_show(args: ShowArgs, config: Option<&Path>) -> Result<(), String> {
    let session = open_session(&args.target, config)?;
    let mut options = ValueOptions::default().global();
    if args.with_defaults {
        options = options.with_defaults();
    }
    let document = session
        .tree()
        .item_value_with(session.root(), options)
        .map_err(|e| e.to_string())?
        .unwrap_or(Document::Null);

    let raw = match args.format {
        OutputFormat::Json => serde_json::to_string_pretty(&document)
            .map_err(|err| format!("Failed to serialize document: {err}"))?,
        OutputFormat::Yaml => serde_yaml::to_string(&document)
            .map_err(|err| format!("Failed to serialize document: {err}"))?,
    };
    println!("{}", raw.trim_end());
    Ok(())
}

fn run_validate(args: CommandArgs, config: Option<&Path>) -> Result<(), String> {
    let session = open_session(&args, config)?;
    match session.validate(&SchemaChecker).map_err(|e| e.to_string())? {
        Validation::Pass => {
            println!("{}: valid", args.command);
            Ok(())
        }
        Validation::Fail { item, message, .. } => {
            let path = session
                .tree()
                .path(item)
                .map(|p| p.to_string())
                .map_err(|e| e.to_string())?;
            println!("{path}: {message}");
            Err(format!("{} is invalid", args.command))
        }
    }
}

/// Loads a catalog directory, or a bundle file.
fn load_catalog(path: &Path) -> Result<CatalogDatabase, String> {
    let db = if path.is_dir() {
        CatalogDatabase::from_dir(path)
    } else {
        CatalogDatabase::from_bundle(path)
    };
    db.map_err(|err| format!("Failed to load catalog '{}': {err}", path.display()))
}

fn load_document(path: &Path) -> Result<Document, String> {
    let raw = fs::read_to_string(path)
        .map_err(|err| format!("Failed to read '{}': {err}", path.display()))?;
    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml" | "yml") => serde_yaml::from_str(&raw)
            .map_err(|err| format!("Failed to parse '{}': {err}", path.display())),
        _ => serde_json::from_str(&raw)
            .map_err(|err| format!("Failed to parse '{}': {err}", path.display())),
    }
}

fn open_session(args: &CommandArgs, config: Option<&Path>) -> Result<EditSession, String> {
    let config = match config {
        Some(path) => EditorConfig::load(path)
            .map_err(|err| format!("Failed to load config '{}': {err}", path.display()))?,
        None => EditorConfig::default(),
    };
    let db = args
        .catalog
        .iter()
        .fold(DatabaseBuilder::new(), |builder, path| {
            if path.is_dir() {
                builder.from_dir(path)
            } else {
                builder.from_bundle(path)
            }
        })
        .build()
        .map_err(|err| format!("Failed to load catalog: {err}"))?;

    let mut stored = StoredCommand::new(args.command.as_str(), args.command.to_lowercase());
    if let Some(input) = &args.input {
        stored = stored.with_document(load_document(input)?);
    }
    debug!(command = %args.command, input = ?args.input, "opening command");
    EditSession::open(&db, &stored, config).map_err(|e| e.to_string())
}

fn render_item(
    tree: &ItemTree,
    id: ItemId,
    depth: usize,
    all: bool,
    out: &mut String,
) -> Result<(), String> {
    let flags = tree.flags(id).map_err(|e| e.to_string())?;
    if flags.is_hidden() && !all {
        return Ok(());
    }

    let name = tree.name(id).map_err(|e| e.to_string())?;
    let used = tree.is_used(id).map_err(|e| e.to_string())?;
    let children = tree.children(id).map_err(|e| e.to_string())?;
    let mut line = format!(
        "{}[{}] {name}",
        "  ".repeat(depth),
        if used { 'x' } else { ' ' }
    );

    let leaf = matches!(tree.kind(id), Ok(ItemKind::Edit | ItemKind::ListElement)) && children.is_empty();
    if leaf {
        if let Some(value) = tree.item_value(id).map_err(|e| e.to_string())? {
            line.push_str(&format!(" = {value}"));
        }
    }
    let labels = flag_labels(flags);
    if !labels.is_empty() {
        line.push_str(&format!(" ({})", labels.join(", ")));
    }
    out.push_str(&line);
    out.push('\n');

    for child in children {
        render_item(tree, *child, depth + 1, all, out)?;
    }
    Ok(())
}

fn flag_labels(flags: ItemFlags) -> Vec<String> {
    flags
        .iter_names()
        .map(|(name, _)| name.to_lowercase().replace('_', "-"))
        .collect()
}
