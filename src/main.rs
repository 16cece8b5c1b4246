use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use authgate::{Engine, Environment, Format};

#[derive(Parser)]
#[command(name = "authgate", version, about = "Authorization policy tooling")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a policy document. Fails with a nonzero exit code on any
    /// configuration error, so misconfigured policies are caught at
    /// deploy time instead of on the first request.
    Check {
        /// Policy file (.json, .yaml or .yml).
        file: PathBuf,
        /// Override the format inferred from the file extension.
        #[arg(long)]
        format: Option<FormatArg>,
    },
    /// Re-emit a policy document in canonical form.
    Fmt {
        /// Policy file (.json, .yaml or .yml).
        file: PathBuf,
        /// Override the format inferred from the file extension.
        #[arg(long)]
        format: Option<FormatArg>,
        /// Output format.
        #[arg(long, value_enum, default_value = "yaml")]
        to: FormatArg,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FormatArg {
    Json,
    Yaml,
}

impl From<FormatArg> for Format {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Json => Format::Json,
            FormatArg::Yaml => Format::Yaml,
        }
    }
}

fn infer_format(path: &Path, explicit: Option<FormatArg>) -> Result<Format> {
    if let Some(format) = explicit {
        return Ok(format.into());
    }
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => Ok(Format::Json),
        Some("yaml") | Some("yml") => Ok(Format::Yaml),
        _ => bail!(
            "cannot infer format of {}; pass --format",
            path.display()
        ),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    // Validation needs no live backends; remote sources are only wired,
    // never fetched, while a policy is parsed.
    let engine = Engine::new(Environment::offline());

    match cli.command {
        Command::Check { file, format } => {
            let format = infer_format(&file, format)?;
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("cannot read {}", file.display()))?;
            engine
                .load_policy(&text, format)
                .with_context(|| format!("invalid policy in {}", file.display()))?;
            println!("{}: ok", file.display());
        }
        Command::Fmt { file, format, to } => {
            let format = infer_format(&file, format)?;
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("cannot read {}", file.display()))?;
            let policy = engine
                .load_policy(&text, format)
                .with_context(|| format!("invalid policy in {}", file.display()))?;
            print!("{}", policy.encode(to.into())?);
        }
    }
    Ok(())
}
