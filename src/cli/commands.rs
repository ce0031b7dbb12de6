use crate::config::RouterConfig;
use crate::definition::{CommandDefinition, Definition, RouteDefinition, Stage};
use crate::dispatcher::{Dispatcher, Output};
use crate::echo::EchoContainer;
use crate::error::{ScanError, SetupError};
use crate::ids::RequestId;
use crate::manifest::ManifestScanner;
use crate::middleware::{MetricsMiddleware, Middleware, MiddlewareSet, TracingMiddleware};
use crate::otel::{LogConfig, LogFormat};
use crate::pipeline::Pipeline;
use crate::registry::{CacheFile, Registry, Scanner};
use crate::router::{CommandInput, HttpInput, Routable, Router};
use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use http::Method;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Command-line interface for the router core
///
/// Loads routes and commands from a manifest (or their cache files) and
/// inspects, matches, renders, or dispatches against them.
#[derive(Parser, Debug)]
#[command(name = "brrtrouter-core")]
#[command(about = "Path-template router and dispatch pipeline", long_about = None)]
pub struct Cli {
    /// Router configuration file (YAML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Manifest of routes and commands (YAML, or JSON by extension)
    #[arg(short, long, global = true)]
    pub manifest: Option<PathBuf>,

    /// Cache file for the route registry
    #[arg(long, global = true)]
    pub route_cache: Option<PathBuf>,

    /// Cache file for the command registry
    #[arg(long, global = true)]
    pub command_cache: Option<PathBuf>,

    /// Ignore cache files and rescan the manifest
    #[arg(long, global = true, default_value_t = false)]
    pub force_rebuild: bool,

    /// Never read cache files
    #[arg(long, global = true, default_value_t = false)]
    pub no_cache: bool,

    /// Log output format (overrides BRRTR_LOG_FORMAT)
    #[arg(long, value_enum, global = true)]
    pub log_format: Option<LogFormatArg>,

    /// Base log level (overrides BRRTR_LOG_LEVEL)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    Json,
    Pretty,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the compiled routes
    Routes,

    /// List the compiled commands
    #[command(name = "commands")]
    ListCommands,

    /// Compile the manifest and write both cache files
    BuildCache,

    /// Match an HTTP method and URI without dispatching
    Match {
        /// HTTP method (GET, POST, ...)
        method: String,
        /// Request URI, optionally with a query string
        uri: String,
    },

    /// Render a path or command line from a definition name
    Generate {
        /// Route or command name
        name: String,

        /// Values as key=value; JSON values are accepted (`path=["a","b"]`)
        #[arg(value_parser = parse_key_value)]
        data: Vec<(String, Value)>,

        /// Look the name up among commands instead of routes
        #[arg(long, default_value_t = false)]
        command: bool,
    },

    /// Dispatch an HTTP request through the pipeline with echo handlers
    Request {
        /// HTTP method (GET, POST, ...)
        method: String,
        /// Request URI, optionally with a query string
        uri: String,
        /// Reuse this request id instead of generating one
        #[arg(long)]
        request_id: Option<String>,
    },

    /// Dispatch a command line through the pipeline with echo handlers
    Run {
        /// Command name followed by its arguments and options
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        argv: Vec<String>,
        /// Reuse this request id instead of generating one
        #[arg(long)]
        request_id: Option<String>,
    },
}

impl Cli {
    /// Logging configuration from the environment with CLI overrides applied
    #[must_use]
    pub fn log_config(&self) -> LogConfig {
        let mut config = LogConfig::from_env();
        if let Some(format) = self.log_format {
            config.format = match format {
                LogFormatArg::Json => LogFormat::Json,
                LogFormatArg::Pretty => LogFormat::Pretty,
            };
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        config
    }

    /// Router configuration: file (if any), then environment, then flags.
    ///
    /// # Errors
    ///
    /// The configuration file cannot be read or parsed.
    pub fn router_config(&self) -> anyhow::Result<RouterConfig> {
        let mut config = match &self.config {
            Some(path) => RouterConfig::load(path)?,
            None => RouterConfig::default(),
        };
        config.apply_env();
        if let Some(manifest) = &self.manifest {
            config.manifest = Some(manifest.clone());
        }
        if let Some(path) = &self.route_cache {
            config.route_cache = Some(path.clone());
        }
        if let Some(path) = &self.command_cache {
            config.command_cache = Some(path.clone());
        }
        if self.force_rebuild {
            config.force_rebuild = true;
        }
        if self.no_cache {
            config.use_cache = false;
        }
        Ok(config)
    }
}

/// Parse one `key=value` pair; the value is read as JSON when it parses,
/// otherwise kept as a string.
fn parse_key_value(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got `{raw}`"))?;
    if key.is_empty() {
        return Err(format!("empty key in `{raw}`"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

/// Set up a registry of kind `D` from the configured cache or manifest.
///
/// A corrupt cache file is logged and the registry rebuilt from the manifest.
///
/// # Errors
///
/// No manifest is configured and no cache is usable, or the manifest does
/// not compile.
pub fn load_registry<D>(config: &RouterConfig) -> anyhow::Result<Registry<D>>
where
    D: Definition,
    ManifestScanner: Scanner<D>,
{
    let missing = || -> Result<Vec<D::Raw>, ScanError> {
        Err(ScanError::new(
            "no manifest configured; pass --manifest or set BRRTR_MANIFEST",
        ))
    };
    let manifest = config.manifest.as_ref().map(ManifestScanner::new);
    let scanner: &dyn Scanner<D> = match &manifest {
        Some(scanner) => scanner,
        None => &missing,
    };

    let mut registry = Registry::new();
    let options = config.setup_options::<D>();
    match registry.setup(scanner, &options) {
        Ok(_) => {}
        Err(SetupError::Cache(err)) => {
            warn!(kind = D::KIND, error = %err, "Cache unusable, rebuilding from manifest");
            let mut rebuild = options;
            rebuild.force_rebuild = true;
            registry
                .setup(scanner, &rebuild)
                .with_context(|| format!("rebuilding {} registry", D::KIND))?;
        }
        Err(err) => return Err(anyhow!(err).context(format!("loading {} registry", D::KIND))),
    }
    Ok(registry)
}

fn router<D>(config: &RouterConfig) -> anyhow::Result<Router<D>>
where
    D: Routable,
    ManifestScanner: Scanner<D>,
{
    let registry = load_registry::<D>(config)?;
    Ok(Router::new(Arc::new(registry)).with_slow_threshold(config.slow_match_threshold()))
}

/// Dispatcher wired to [`EchoContainer`], with the bundled middleware
/// registered as `tracing` and `metrics` and both run on every input.
fn echo_dispatcher<D>(router: Router<D>) -> (Dispatcher<D>, Arc<MetricsMiddleware>)
where
    D: Routable,
{
    let metrics = Arc::new(MetricsMiddleware::new());
    let mut middleware = MiddlewareSet::new();
    middleware
        .register("tracing", TracingMiddleware)
        .register_arc("metrics", Arc::clone(&metrics) as Arc<dyn Middleware<D>>);

    let mut pipeline = Pipeline::new();
    pipeline
        .add(Stage::Received, TracingMiddleware)
        .add_arc(Stage::Received, Arc::clone(&metrics) as Arc<dyn Middleware<D>>);

    let dispatcher = Dispatcher::new(router, Arc::new(EchoContainer))
        .with_pipeline(pipeline)
        .with_middleware(middleware);
    if let Err(errors) = dispatcher.verify_middleware() {
        for err in errors {
            warn!(error = %err, "Middleware reference cannot be resolved");
        }
    }
    (dispatcher, metrics)
}

fn log_metrics(metrics: &MetricsMiddleware) {
    debug!(
        runs = metrics.runs(),
        matched = metrics.matched(),
        not_matched = metrics.not_matched(),
        errors = metrics.errors(),
        short_circuits = metrics.total_short_circuits(),
        average_latency_us = metrics.average_latency().as_micros(),
        "Dispatch metrics"
    );
}

fn parse_method(method: &str) -> anyhow::Result<Method> {
    Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .with_context(|| format!("invalid HTTP method `{method}`"))
}

fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_output(output: &Output, request_id: RequestId) -> anyhow::Result<()> {
    let headers: BTreeMap<&str, &str> = output
        .headers
        .iter()
        .map(|(k, v)| (k.as_ref(), v.as_str()))
        .collect();
    print_json(&json!({
        "request_id": request_id.to_string(),
        "status": output.status,
        "headers": headers,
        "body": output.body,
    }))
}

fn build_cache<D>(config: &RouterConfig, path: Option<&Path>) -> anyhow::Result<()>
where
    D: Definition,
    ManifestScanner: Scanner<D>,
{
    let Some(path) = path else {
        warn!(kind = D::KIND, "No cache file configured, skipping");
        return Ok(());
    };
    let mut fresh = config.clone();
    fresh.force_rebuild = true;
    let registry = load_registry::<D>(&fresh)?;
    CacheFile::new(path)
        .write(&registry)
        .with_context(|| format!("writing {} cache", D::KIND))?;
    println!("{} {}s -> {}", registry.len(), D::KIND, path.display());
    Ok(())
}

/// Execute the parsed command line and return the process exit code.
///
/// # Errors
///
/// Configuration, manifest, or cache failures.
pub fn run_cli(cli: &Cli) -> anyhow::Result<i32> {
    let config = cli.router_config()?;
    info!(manifest = ?config.manifest, use_cache = config.use_cache, "Router CLI starting");

    match &cli.command {
        Commands::Routes => {
            router::<RouteDefinition>(&config)?.dump();
            Ok(0)
        }
        Commands::ListCommands => {
            router::<CommandDefinition>(&config)?.dump();
            Ok(0)
        }
        Commands::BuildCache => {
            if config.manifest.is_none() {
                bail!("build-cache needs a manifest; pass --manifest or set BRRTR_MANIFEST");
            }
            build_cache::<RouteDefinition>(&config, config.route_cache.as_deref())?;
            build_cache::<CommandDefinition>(&config, config.command_cache.as_deref())?;
            Ok(0)
        }
        Commands::Match { method, uri } => {
            let router = router::<RouteDefinition>(&config)?;
            let input = HttpInput::new(parse_method(method)?, uri);
            match router.route(&input) {
                Ok(outcome) => match outcome.matched() {
                    Some(hit) => {
                        print_json(&json!({
                            "name": hit.name(),
                            "template": hit.definition.template,
                            "target": hit.definition.target.as_str(),
                            "params": hit.params_map(),
                        }))?;
                        Ok(0)
                    }
                    None => {
                        println!("no match for {method} {uri}");
                        Ok(2)
                    }
                },
                Err(err) => {
                    let output = Output::from_error(&err);
                    print_json(&output.body)?;
                    Ok(output.exit_code())
                }
            }
        }
        Commands::Generate {
            name,
            data,
            command,
        } => {
            let data: BTreeMap<String, Value> = data.iter().cloned().collect();
            let rendered = if *command {
                let registry = load_registry::<CommandDefinition>(&config)?;
                let definition = registry
                    .get(name)
                    .ok_or_else(|| anyhow!("unknown command `{name}`"))?;
                definition.generate(&data)?
            } else {
                let registry = load_registry::<RouteDefinition>(&config)?;
                let definition = registry
                    .get(name)
                    .ok_or_else(|| anyhow!("unknown route `{name}`"))?;
                definition.generate(&data)?
            };
            println!("{rendered}");
            Ok(0)
        }
        Commands::Request {
            method,
            uri,
            request_id,
        } => {
            let (dispatcher, metrics) = echo_dispatcher(router::<RouteDefinition>(&config)?);
            let input = HttpInput::new(parse_method(method)?, uri);
            let request_id = RequestId::parse_or_new(request_id.as_deref());
            let (mut ctx, output) = dispatcher.handle_with_id(input, request_id);
            let output = dispatcher.finish(&mut ctx, output);
            log_metrics(&metrics);
            print_output(&output, request_id)?;
            Ok(output.exit_code())
        }
        Commands::Run { argv, request_id } => {
            let (dispatcher, metrics) = echo_dispatcher(router::<CommandDefinition>(&config)?);
            let request_id = RequestId::parse_or_new(request_id.as_deref());
            let (mut ctx, output) = dispatcher.handle_with_id(CommandInput::new(argv), request_id);
            let output = dispatcher.finish(&mut ctx, output);
            log_metrics(&metrics);
            print_output(&output, request_id)?;
            Ok(output.exit_code())
        }
    }
}
