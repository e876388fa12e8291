use crate::catalog::source::SourceProject;
use crate::catalog::{Framework, HttpMethod};
use crate::config::DocsConfig;
use crate::grouping::{GroupBy, SortBy};
use crate::pipeline::{ApiDocs, DocsQuery};
use crate::serializer::{serialize_json, serialize_yaml, write_to_file};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::{debug, info, warn};
use serde::Serialize;
use std::path::PathBuf;

/// API Auto Docs - Documentation records and example responses from Rust web projects
#[derive(Parser, Debug)]
#[command(name = "api-auto-docs")]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to the Rust project directory
    #[arg(value_name = "PROJECT_PATH")]
    pub project_path: PathBuf,

    /// Documentation config file (yaml or json); defaults apply when omitted
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config_path: Option<PathBuf>,

    /// Output format (yaml or json)
    #[arg(short = 'f', long = "format", value_enum, default_value = "json")]
    pub output_format: OutputFormat,

    /// Output file path (if not specified, outputs to stdout)
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output_path: Option<PathBuf>,

    /// Specify the web framework to parse (if not specified, auto-detect)
    #[arg(short = 'w', long = "framework", value_enum)]
    pub framework: Option<Framework>,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List documented routes grouped for navigation
    Routes,
    /// Full documentation records, one per route and method
    Docs {
        /// route_names or method_names
        #[arg(long)]
        sort: Option<SortBy>,
        /// api_uri or controller_full_path
        #[arg(long = "group-by")]
        group_by: Option<GroupBy>,
        /// Leave out a method (repeatable)
        #[arg(long = "hide", value_name = "METHOD")]
        hide: Vec<HttpMethod>,
    },
    /// The documentation record for one route id
    Show {
        #[arg(value_name = "ID")]
        id: String,
    },
    /// An example response body for one route id
    Mock {
        #[arg(value_name = "ID")]
        id: String,
    },
    /// Title, default headers and standard responses
    Config,
}

/// Output format options
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// YAML format
    Yaml,
    /// JSON format
    Json,
}

/// Parse command line arguments
pub fn parse_args() -> Result<CliArgs> {
    let args = CliArgs::parse();
    parse_args_from_parsed(args)
}

/// Validate and log already-parsed arguments
pub fn parse_args_from_parsed(args: CliArgs) -> Result<CliArgs> {
    debug!("Parsed arguments: {:?}", args);

    if !args.project_path.exists() {
        anyhow::bail!("Project path does not exist: {}", args.project_path.display());
    }

    if !args.project_path.is_dir() {
        anyhow::bail!("Project path is not a directory: {}", args.project_path.display());
    }

    info!("Project path: {}", args.project_path.display());
    info!("Output format: {:?}", args.output_format);
    if let Some(ref output) = args.output_path {
        info!("Output file: {}", output.display());
    } else {
        info!("Output: stdout");
    }
    if let Some(ref framework) = args.framework {
        info!("Framework: {:?}", framework);
    } else {
        info!("Framework: auto-detect");
    }

    Ok(args)
}

/// Methods left after removing `hidden`; `None` when nothing is hidden.
pub fn visible_methods(hidden: &[HttpMethod]) -> Option<Vec<HttpMethod>> {
    if hidden.is_empty() {
        return None;
    }
    Some(
        HttpMethod::DOCUMENTED
            .into_iter()
            .filter(|m| !hidden.contains(m))
            .collect(),
    )
}

/// Run the main workflow
pub fn run(args: CliArgs) -> Result<()> {
    let config = match &args.config_path {
        Some(path) => DocsConfig::load(path)?,
        None => DocsConfig::default(),
    };

    info!("Loading project sources...");
    let project = SourceProject::load(&args.project_path)?;
    let api_docs = ApiDocs::from_project(config, &project, args.framework.map(|f| vec![f]))
        .context("Invalid documentation config")?;

    if api_docs.routes().is_empty() {
        warn!("No routes found in the project");
    }

    let content = match &args.command {
        Command::Routes => render(&api_docs.routes_list()?, args.output_format)?,
        Command::Docs { sort, group_by, hide } => {
            let query = DocsQuery {
                sort: *sort,
                group_by: *group_by,
                methods: visible_methods(hide),
            };
            let docs = api_docs.docs(&query)?;
            info!("Documented {} route methods", docs.len());
            render(&docs, args.output_format)?
        }
        Command::Show { id } => render(&api_docs.route_details(id)?, args.output_format)?,
        Command::Mock { id } => {
            let body = api_docs.example_response(id)?;
            if body.is_none() {
                info!("No example response available for {}", id);
            }
            render(&body, args.output_format)?
        }
        Command::Config => render(&api_docs.config_summary(), args.output_format)?,
    };

    if let Some(output_path) = &args.output_path {
        write_to_file(&content, output_path)?;
        info!("Successfully wrote output to {}", output_path.display());
    } else {
        println!("{}", content);
    }

    Ok(())
}

fn render<T: Serialize + ?Sized>(value: &T, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Yaml => serialize_yaml(value),
        OutputFormat::Json => serialize_json(value),
    }
}
