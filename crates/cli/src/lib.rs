//! Command-line and HTTP front-end for the semantic element locator.
//!
//! `resolve` and `locators` read a JSON request from `--json`, `--file` or stdin and print a
//! JSON envelope on stdout. `serve-http` exposes the same operations over HTTP.

use anyhow::{Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use locator_core::{Resolver, ResolverConfig};
use locator_embeddings::EmbeddingMode;
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;

mod command;
mod http_api;
mod server_security;

use command::CommandResponse;
use http_api::HttpState;
use server_security::{AuthToken, AUTH_TOKEN_ENV};

fn print_stdout(text: &str) -> Result<()> {
    use std::io::Write;

    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|()| stdout.write_all(b"\n"))
        .and_then(|()| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

#[derive(Parser)]
#[command(name = "locator-resolver")]
#[command(about = "Resolve natural-language UI commands to page element locators", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for JSON)
    #[arg(long, global = true)]
    quiet: bool,

    /// Resolver config file (TOML)
    #[arg(long, global = true, env = "LOCATOR_CONFIG")]
    config: Option<PathBuf>,

    /// Override embedding backend in this process
    #[arg(long, global = true, value_enum)]
    embed_mode: Option<EmbedMode>,

    /// Directory with model.onnx and tokenizer.json (overrides LOCATOR_MODEL_DIR)
    #[arg(long, global = true)]
    model_dir: Option<PathBuf>,

    /// Default number of Stage-1 candidates (overrides LOCATOR_TOP_K)
    #[arg(long, global = true)]
    top_k: Option<usize>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum EmbedMode {
    /// Deterministic hashed embeddings, no model files
    #[value(alias = "stub")]
    Hashed,
    /// ONNX sentence-embedding model
    Onnx,
}

impl From<EmbedMode> for EmbeddingMode {
    fn from(mode: EmbedMode) -> Self {
        match mode {
            EmbedMode::Hashed => Self::Hashed,
            EmbedMode::Onnx => Self::Onnx,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve an instruction against page elements
    Resolve(PayloadArgs),

    /// List signatures and locators for every element
    Locators(PayloadArgs),

    /// Print the JSON schema of the resolve request
    Schema,

    /// Serve the resolver over HTTP (POST /resolve, POST /locators, GET /health)
    ServeHttp(ServeArgs),
}

impl Commands {
    const fn prints_json(&self) -> bool {
        matches!(self, Self::Resolve(_) | Self::Locators(_) | Self::Schema)
    }
}

#[derive(Args)]
struct PayloadArgs {
    /// Inline JSON payload (mutually exclusive with --file)
    #[arg(long, conflicts_with = "file")]
    json: Option<String>,

    /// Path to file containing JSON payload
    #[arg(long)]
    file: Option<PathBuf>,

    /// Pretty-print JSON response
    #[arg(long)]
    pretty: bool,
}

#[derive(Args)]
struct ServeArgs {
    /// Bind address, e.g. 127.0.0.1:7710
    #[arg(long, default_value = "127.0.0.1:7710")]
    bind: String,

    /// Allow binding to non-loopback addresses (requires --auth-token)
    #[arg(long)]
    public: bool,

    /// Require Authorization: Bearer <token> on all requests (env: LOCATOR_AUTH_TOKEN)
    #[arg(long)]
    auth_token: Option<String>,
}

pub async fn main_entry() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet || cli.command.prints_json());

    match &cli.command {
        Commands::Resolve(args) => {
            let resolver = build_resolver(&cli)?;
            let raw = read_payload(args)?;
            let response = command::execute_resolve(&resolver, raw.as_bytes())
                .await
                .context("Failed to encode response")?;
            emit(&response, args.pretty)
        }
        Commands::Locators(args) => {
            let raw = read_payload(args)?;
            let response = command::execute_locators(raw.as_bytes())
                .context("Failed to encode response")?;
            emit(&response, args.pretty)
        }
        Commands::Schema => print_stdout(&locator_protocol::request_schema()?),
        Commands::ServeHttp(args) => {
            let resolver = build_resolver(&cli)?;
            serve_http(args, resolver).await
        }
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    if !verbose {
        builder.filter_module("ort", log::LevelFilter::Off);
    }
    builder.target(env_logger::Target::Stderr);
    let _ = builder.try_init();
}

/// Defaults, config file, `LOCATOR_*` env, then command-line flags.
fn build_config(cli: &Cli) -> Result<ResolverConfig> {
    let mut config = ResolverConfig::load(cli.config.as_deref())?;
    if let Some(mode) = cli.embed_mode {
        config.embedding.mode = mode.into();
    }
    if let Some(dir) = &cli.model_dir {
        config.embedding.model_dir = Some(dir.clone());
    }
    if let Some(top_k) = cli.top_k {
        config.top_k = top_k;
    }
    Ok(config)
}

fn build_resolver(cli: &Cli) -> Result<Resolver> {
    let config = build_config(cli)?;
    Resolver::new(config).context("Failed to initialise resolver")
}

fn emit(response: &CommandResponse, pretty: bool) -> Result<()> {
    let text = if pretty {
        serde_json::to_string_pretty(response)?
    } else {
        serde_json::to_string(response)?
    };
    print_stdout(&text)?;
    if response.is_error() {
        std::process::exit(1);
    }
    Ok(())
}

fn read_payload(args: &PayloadArgs) -> Result<String> {
    if let Some(raw) = &args.json {
        return Ok(raw.clone());
    }
    if let Some(path) = &args.file {
        return fs::read_to_string(path)
            .with_context(|| format!("Failed to read JSON from {}", path.display()));
    }

    let mut buffer = String::new();
    io::stdin()
        .read_to_string(&mut buffer)
        .context("Failed to read JSON from stdin")?;
    if buffer.trim().is_empty() {
        anyhow::bail!("Request is empty. Provide --json, --file, or pipe JSON via stdin.");
    }
    Ok(buffer)
}

async fn serve_http(args: &ServeArgs, resolver: Resolver) -> Result<()> {
    let addrs = server_security::guarded_bind_addrs(&args.bind, args.public).await?;
    let auth_token = AuthToken::from_arg_or_env(args.auth_token.as_deref())?;
    if args.public && auth_token.is_none() {
        anyhow::bail!(
            "--public requires an auth token: set --auth-token or export {AUTH_TOKEN_ENV}"
        );
    }

    let auth_enabled = auth_token.is_some();
    let state = Arc::new(HttpState {
        resolver: Arc::new(resolver),
        auth_token,
    });
    let app = http_api::router(state);

    let listener = tokio::net::TcpListener::bind(addrs.as_slice()).await?;
    let base_url = format!("http://{}", listener.local_addr()?);

    print_stdout(&format!("Serving resolver: {base_url}/resolve"))?;
    print_stdout(&format!("Locator listing: {base_url}/locators"))?;
    print_stdout(&format!("Health endpoint: {base_url}/health"))?;
    if auth_enabled {
        print_stdout(&format!(
            "Auth enabled: add header 'Authorization: Bearer ${AUTH_TOKEN_ENV}'"
        ))?;
    }
    print_stdout(&format!(
        "Try: curl -X POST {base_url}/resolve -H 'Content-Type: application/json' \
         -d '{{\"instruction\":\"Click Sign In\",\"elements\":[{{\"role\":\"button\",\"name\":\"Sign In\"}}]}}'"
    ))?;
    axum::serve(listener, app).await?;
    Ok(())
}
