use clap::{Parser, Subcommand};
use mailmold::api::{self, ExtractRequest, RenderRequest, ValidateRequest};
use mailmold::config::{self, AdaptOptions, CtaStrategy, EngineConfig};
use mailmold::types::AdaptedTemplate;
use mailmold::{adapt, output};
use rayon::prelude::*;
use std::error::Error;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use walkdir::WalkDir;

type BoxError = Box<dyn Error + Send + Sync>;

#[derive(Parser)]
#[command(name = "mailmold")]
#[command(about = "Turn finished email HTML into reusable placeholder templates")]
#[command(long_about = "\
Turn finished email HTML into reusable placeholder templates

Adapting detects the preheader, headline, call-to-action buttons, named
content blocks and brand contact details of a sent email, and replaces them
with placeholders. Rendering fills a template with JSON data and derives the
plain-text part.

Template syntax:

  {{name}}  {{brand.phone}}             scalar values (dotted paths)
  {{#block:speakers}}...{{/block:speakers}}
                                        shown when data.blocks.speakers is true
  {{#each items}}{{items.title}} {{@index}}{{/each}}
                                        repeated per item of data.items

Run 'mailmold gen-config' to generate a documented mailmold.toml.")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v, -vv, -vvv). RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Directory containing mailmold.toml
    #[arg(long, default_value = ".", global = true)]
    config_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

/// Adapt flags that override `[adapt]` from mailmold.toml.
#[derive(clap::Args, Clone)]
struct AdaptArgs {
    /// Which CTAs become placeholders: auto, all, top_bottom
    #[arg(long, value_parser = parse_cta_strategy)]
    cta_strategy: Option<CtaStrategy>,

    /// Do not insert a hidden {{preheader}} when none is found
    #[arg(long)]
    no_preheader_fallback: bool,

    /// Keep HTML comments in the template
    #[arg(long)]
    preserve_comments: bool,

    /// Comma-separated block names to detect
    #[arg(long, value_delimiter = ',')]
    blocks: Option<Vec<String>>,
}

#[derive(Subcommand)]
enum Command {
    /// Adapt one email into a template (JSON)
    Adapt {
        /// Email HTML file
        file: PathBuf,
        /// Write the template JSON here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
        #[command(flatten)]
        args: AdaptArgs,
    },
    /// Adapt every .html/.htm file under a directory in parallel
    AdaptDir {
        /// Directory of email HTML files
        dir: PathBuf,
        /// Output directory for <stem>.template.json files
        #[arg(long)]
        out: PathBuf,
        #[command(flatten)]
        args: AdaptArgs,
    },
    /// Render a template with JSON data
    Render {
        /// Template file: raw template HTML or adapt JSON output
        template: PathBuf,
        /// JSON data file (defaults to an empty object)
        #[arg(long)]
        data: Option<PathBuf>,
        /// Write the plain-text part here
        #[arg(long)]
        text_out: Option<PathBuf>,
        /// Write rendered HTML here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// List the placeholders a template uses (JSON)
    Extract {
        /// Template file: raw template HTML or adapt JSON output
        template: PathBuf,
    },
    /// Report missing recommended placeholders
    Validate {
        /// Template file: raw template HTML or adapt JSON output
        template: PathBuf,
    },
    /// Print a stock mailmold.toml with all options documented
    GenConfig,
}

fn parse_cta_strategy(s: &str) -> Result<CtaStrategy, String> {
    match s {
        "auto" => Ok(CtaStrategy::Auto),
        "all" => Ok(CtaStrategy::All),
        "top_bottom" | "top-bottom" => Ok(CtaStrategy::TopBottom),
        other => Err(format!("unknown CTA strategy '{other}' (expected auto, all, top_bottom)")),
    }
}

fn main() -> Result<(), BoxError> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let config = config::load_config(&cli.config_dir)?;
    debug!(?config, "loaded configuration");

    match cli.command {
        Command::Adapt { file, out, args } => {
            let options = adapt_options(&config, &args)?;
            let html = read_input(&file, &config)?;
            let template = adapt::adapt(&html, &options);
            let json = serde_json::to_string_pretty(&template)?;
            match out {
                Some(path) => {
                    std::fs::write(&path, json)?;
                    output::print_adapt_output(&template);
                    info!(path = %path.display(), "template written");
                }
                None => println!("{}", json),
            }
        }
        Command::AdaptDir { dir, out, args } => {
            let options = adapt_options(&config, &args)?;
            init_thread_pool(&config.processing);
            adapt_dir(&dir, &out, &options, &config)?;
        }
        Command::Render {
            template,
            data,
            text_out,
            out,
        } => {
            let data = match data {
                Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
                None => serde_json::json!({}),
            };
            let request = RenderRequest {
                template: Some(load_template(&template)?),
                data,
            };
            let result = api::render_request(&request, &config.limits)?;
            if let Some(path) = text_out {
                std::fs::write(path, &result.text)?;
            }
            match out {
                Some(path) => std::fs::write(path, &result.html)?,
                None => println!("{}", result.html),
            }
        }
        Command::Extract { template } => {
            let request = ExtractRequest {
                template: Some(load_template(&template)?),
            };
            let response = api::extract_request(&request, &config.limits)?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::Validate { template } => {
            let request = ValidateRequest {
                template: Some(load_template(&template)?),
            };
            let report = api::validate_request(&request, &config.limits)?;
            output::print_validation_output(&report);
        }
        Command::GenConfig => {}
    }

    Ok(())
}

/// Layer CLI flags over the `[adapt]` config section.
fn adapt_options(config: &EngineConfig, args: &AdaptArgs) -> Result<AdaptOptions, config::ConfigError> {
    let mut options = config.adapt.clone();
    if let Some(strategy) = args.cta_strategy {
        options.cta_strategy = strategy;
    }
    if args.no_preheader_fallback {
        options.preheader_fallback = false;
    }
    if args.preserve_comments {
        options.preserve_comments = true;
    }
    if let Some(blocks) = &args.blocks {
        options.detect_blocks = blocks.iter().map(|b| b.trim().to_string()).collect();
    }
    options.validate()?;
    Ok(options)
}

/// Read an input file, rejecting it before parsing if it exceeds the size cap.
fn read_input(path: &Path, config: &EngineConfig) -> Result<String, BoxError> {
    let size = std::fs::metadata(path)?.len();
    api::check_size(usize::try_from(size).unwrap_or(usize::MAX), &config.limits)?;
    Ok(std::fs::read_to_string(path)?)
}

/// Template text from a file holding either raw template HTML or the JSON
/// written by `adapt` (whose `html` field is the template).
fn load_template(path: &Path) -> Result<String, BoxError> {
    let content = std::fs::read_to_string(path)?;
    match serde_json::from_str::<AdaptedTemplate>(&content) {
        Ok(template) => Ok(template.html),
        Err(_) => Ok(content),
    }
}

fn is_email_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("html") || e.eq_ignore_ascii_case("htm"))
}

/// Adapt every email under `dir`, mirroring its subdirectories under `out`.
fn adapt_dir(dir: &Path, out: &Path, options: &AdaptOptions, config: &EngineConfig) -> Result<(), BoxError> {
    let mut sources: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && is_email_file(entry.path()))
        .map(|entry| entry.into_path())
        .collect();
    sources.sort();
    info!(count = sources.len(), dir = %dir.display(), "adapting directory");

    let results: Vec<(PathBuf, Result<(PathBuf, AdaptedTemplate), BoxError>)> = sources
        .par_iter()
        .map(|source| (source.clone(), adapt_file(source, dir, out, options, config)))
        .collect();

    let mut failed = 0;
    for (source, result) in &results {
        let shown = source.strip_prefix(dir).unwrap_or(source).display().to_string();
        match result {
            Ok((written, template)) => {
                let target = written.strip_prefix(out).unwrap_or(written).display().to_string();
                eprintln!("{}", output::format_batch_line(&shown, &target, template));
            }
            Err(e) => {
                failed += 1;
                eprintln!("{}", output::format_batch_failure(&shown, &e.to_string()));
            }
        }
    }
    eprintln!("{}", output::format_batch_summary(results.len() - failed, failed));

    if failed > 0 {
        return Err(format!("{failed} file(s) failed to adapt").into());
    }
    Ok(())
}

fn adapt_file(
    source: &Path,
    root: &Path,
    out: &Path,
    options: &AdaptOptions,
    config: &EngineConfig,
) -> Result<(PathBuf, AdaptedTemplate), BoxError> {
    let html = read_input(source, config)?;
    let template = adapt::adapt(&html, options);

    let relative = source.strip_prefix(root)?;
    let stem = relative
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| format!("unusable file name: {}", source.display()))?;
    let target_dir = match relative.parent() {
        Some(parent) => out.join(parent),
        None => out.to_path_buf(),
    };
    std::fs::create_dir_all(&target_dir)?;
    let target = target_dir.join(format!("{stem}.template.json"));
    std::fs::write(&target, serde_json::to_string_pretty(&template)?)?;
    Ok((target, template))
}

/// Initialize the rayon thread pool based on processing config.
///
/// Capped at the number of available CPU cores.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

/// Initialize tracing based on verbosity and output format. Logs go to
/// stderr; stdout carries JSON and rendered HTML.
fn init_tracing(verbose: u8, json: bool) {
    let base_filter = match std::env::var("RUST_LOG") {
        Ok(filter) => filter,
        Err(_) => match verbose {
            0 => "warn".to_string(),
            1 => "warn,mailmold=info".to_string(),
            2 => "info,mailmold=debug".to_string(),
            _ => "debug,mailmold=trace".to_string(),
        },
    };

    let filter = EnvFilter::try_new(&base_filter).unwrap_or_else(|_| EnvFilter::new("warn"));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_file(verbose >= 3)
                    .with_line_number(verbose >= 3)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .init();
    }
}
