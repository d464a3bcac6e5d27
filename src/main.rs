use gostructcopy::config::{CopyOptions, Target};
use gostructcopy::model::{TypeIndex, TypeRef};
use gostructcopy::{expand_type, generate, generate_source};

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// gostructcopy - field-by-field copy generator for Go structs
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print Go source copying one struct into another
    Generate {
        #[command(flatten)]
        pair: PairArgs,

        #[command(flatten)]
        options: OptionArgs,
    },

    /// Copy a JSON value of the source type into the destination type
    Apply {
        #[command(flatten)]
        pair: PairArgs,

        /// JSON file holding the source value, `-` for stdin
        #[arg(long, short = 'i', default_value = "-")]
        input: PathBuf,

        #[command(flatten)]
        options: OptionArgs,
    },

    /// Print a struct and every type it references as standalone definitions
    Expand {
        /// Descriptor file or directory of descriptor files
        #[arg(long)]
        index: PathBuf,

        /// Type to expand, e.g. `dto.User`
        #[arg(long = "type", short = 't')]
        type_name: String,
    },
}

#[derive(Args, Debug)]
struct PairArgs {
    /// Descriptor file or directory of descriptor files
    #[arg(long)]
    index: PathBuf,

    /// Source type, e.g. `model.User`
    #[arg(long, short = 's')]
    source: String,

    /// Destination type, e.g. `dto.User`
    #[arg(long, short = 'd')]
    destination: String,
}

#[derive(Args, Debug)]
struct OptionArgs {
    /// Config directory (gostructcopy.toml is searched upward from here)
    #[arg(long, short = 'c', default_value = ".")]
    config_dir: PathBuf,

    /// Emit a complete Go file for this package
    #[arg(long)]
    package: Option<String>,

    /// Prefix of generated function names
    #[arg(long)]
    prefix: Option<String>,

    /// Only match names exactly or through tag aliases
    #[arg(long)]
    no_case_insensitive: bool,

    /// Ignore tag aliases
    #[arg(long)]
    no_tag_aliases: bool,
}

impl OptionArgs {
    /// File options with command line overrides applied
    fn resolve(&self, target: Target) -> Result<CopyOptions> {
        let mut options = CopyOptions::load(&self.config_dir)?;
        if let Some(package) = &self.package {
            options.package = Some(package.clone());
        }
        if let Some(prefix) = &self.prefix {
            options.function_prefix = prefix.clone();
        }
        if self.no_case_insensitive {
            options.match_case_insensitive = false;
        }
        if self.no_tag_aliases {
            options.use_tag_aliases = false;
        }
        options.target = target;
        options.validate()?;
        Ok(options)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Default to "warn" if RUST_LOG is not set
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Generate { pair, options } => generate_command(pair, options),
        Commands::Apply {
            pair,
            input,
            options,
        } => apply_command(pair, input, options),
        Commands::Expand { index, type_name } => expand_command(index, type_name),
    }
}

fn generate_command(pair: PairArgs, options: OptionArgs) -> Result<()> {
    let options = options.resolve(Target::SourceText)?;
    let index = load_index(&pair.index)?;

    let text = generate_source(
        &index,
        &TypeRef::parse(&pair.source),
        &TypeRef::parse(&pair.destination),
        &options,
    )?;
    print!("{}", text);
    Ok(())
}

fn apply_command(pair: PairArgs, input: PathBuf, options: OptionArgs) -> Result<()> {
    let options = options.resolve(Target::Callable)?;
    let index = load_index(&pair.index)?;

    let artifact = generate(
        &index,
        &TypeRef::parse(&pair.source),
        &TypeRef::parse(&pair.destination),
        &options,
    )?;
    let operation = artifact
        .as_callable()
        .ok_or_else(|| anyhow!("Emitter did not produce a callable operation"))?;

    let value: serde_json::Value = serde_json::from_str(&read_input(&input)?)
        .with_context(|| format!("Invalid JSON in {}", input.display()))?;
    let copied = operation.apply(&value)?;

    println!("{}", serde_json::to_string_pretty(&copied)?);
    Ok(())
}

fn expand_command(index: PathBuf, type_name: String) -> Result<()> {
    let index = load_index(&index)?;
    let text = expand_type(&index, &TypeRef::parse(&type_name))?;
    print!("{}", text);
    Ok(())
}

fn load_index(path: &Path) -> Result<TypeIndex> {
    info!("Loading type descriptors from: {}", path.display());
    TypeIndex::load(path).with_context(|| format!("Failed to load {}", path.display()))
}

fn read_input(input: &Path) -> Result<String> {
    if input == Path::new("-") {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        return Ok(buffer);
    }
    std::fs::read_to_string(input).with_context(|| format!("Failed to read {}", input.display()))
}
