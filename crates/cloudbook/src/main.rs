//! cloudbook
//!
//! Multi-account, multi-region cloud inventory collector producing a markdown
//! report.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use cloudbook_core::{parse_region_list, provision};
use cloudbook_exec::LocalExecutor;
use cloudbook_inventory::{AwsCliProvider, CloudProvider};
use color_eyre::Result;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod config;
mod output;
mod run;

use config::Config;

#[derive(Parser)]
#[command(name = "cloudbook", version)]
#[command(about = "Multi-account cloud inventory collector", long_about = None)]
struct Cli {
    /// Config file (defaults to $CLOUDBOOK_CONFIG, ./cloudbook.toml, then the user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect the inventory and write the report
    Run(RunArgs),
    /// List the resource kinds that can be collected
    Catalog,
    /// Print the trust and inventory policies for the cross-account role
    Policy {
        /// Principal allowed to assume the role (defaults to the caller's account root)
        #[arg(long)]
        trusted_principal: Option<String>,
        /// External id the role must require
        #[arg(long)]
        external_id: Option<String>,
    },
    /// Show the ambient identity
    Whoami,
}

#[derive(Args)]
struct RunArgs {
    /// Newline-delimited account list
    #[arg(long)]
    accounts_file: Option<PathBuf>,
    /// Comma-separated regions
    #[arg(long)]
    regions: Option<String>,
    /// Role assumed in each account
    #[arg(long)]
    role_name: Option<String>,
    /// External id passed when assuming the role
    #[arg(long)]
    external_id: Option<String>,
    /// Maximum concurrent provider calls
    #[arg(long)]
    workers: Option<usize>,
    /// Directory the report is written to
    #[arg(long)]
    output_dir: Option<PathBuf>,
    /// Report file name prefix
    #[arg(long)]
    prefix: Option<String>,
    /// Also convert the report to .docx
    #[arg(long)]
    convert: bool,
    /// Resource kinds to collect (comma-separated catalog keys)
    #[arg(long, value_delimiter = ',')]
    kinds: Vec<String>,
}

impl RunArgs {
    /// Flags override the file and environment
    fn apply(self, config: &mut Config) {
        if let Some(path) = self.accounts_file {
            config.targets.accounts_file = Some(path);
        }
        if let Some(regions) = self.regions {
            config.targets.target.regions = parse_region_list(&regions);
        }
        if let Some(role_name) = self.role_name {
            config.targets.target.role_name = role_name;
        }
        if self.external_id.is_some() {
            config.targets.target.external_id = self.external_id;
        }
        if let Some(workers) = self.workers {
            config.collection.workers = workers;
        }
        if let Some(directory) = self.output_dir {
            config.output.directory = directory;
        }
        if let Some(prefix) = self.prefix {
            config.output.prefix = prefix;
        }
        if self.convert {
            config.output.convert = true;
        }
        if !self.kinds.is_empty() {
            config.collection.kinds = self.kinds;
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_format)?;

    let mut config = Config::load_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Run(args) => {
            args.apply(&mut config);
            return run::execute(config).await;
        }
        Commands::Catalog => {
            for spec in run::resolve_catalog(&config)? {
                println!("{:<28} {}", spec.key, spec.title);
            }
        }
        Commands::Policy {
            trusted_principal,
            external_id,
        } => {
            let principal = match trusted_principal {
                Some(principal) => principal,
                None => {
                    let caller = provider(&config).caller_identity().await?;
                    format!(
                        "arn:{}:iam::{}:root",
                        config.targets.target.partition, caller.account_id
                    )
                }
            };
            let external_id = external_id.or(config.targets.target.external_id.clone());
            let specs = run::resolve_catalog(&config)?;

            let documents = serde_json::json!({
                "trust_policy": provision::trust_policy(&principal, external_id.as_deref()),
                "inventory_policy": provision::inventory_policy(&specs),
            });
            println!("{}", serde_json::to_string_pretty(&documents)?);
        }
        Commands::Whoami => {
            let caller = provider(&config).caller_identity().await?;
            println!("account: {}", caller.account_id);
            println!("arn:     {}", caller.arn);
            println!("user id: {}", caller.user_id);
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn provider(config: &Config) -> AwsCliProvider {
    AwsCliProvider::new(Arc::new(LocalExecutor::new()))
        .with_timeout(config.collection.call_timeout())
}

/// Initialize the tracing subscriber; logs go to stderr so stdout stays clean
fn init_logging(verbose: bool, format: LogFormat) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_level))?;

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Pretty => registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }

    Ok(())
}
