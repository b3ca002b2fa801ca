use std::{
    env::Args,
    io::{self, Write},
    path::PathBuf,
};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::parser::{parse_terms, SearchTerms};
use crate::password::{ensure_password, TerminalPrompt};
use crate::request_builder::RequestBuilder;

/// Searches log records in an Elasticsearch backend and prints the raw
/// response
///
/// A single free-text argument is matched against the log message. Arguments
/// that start with `field:` are appended to the query as raw clauses.
#[derive(Parser)]
#[command(version, about, long_about = None)]
pub struct CLI {
    /// Base URL of the search backend
    #[arg(long = "url")]
    url_base: Option<String>,

    /// Enable basic auth by setting a username
    #[arg(long)]
    username: Option<String>,

    /// Password for basic auth, prompted for when a username has none
    #[arg(long)]
    password: Option<String>,

    /// Number of matching log entries to return
    #[arg(long)]
    numlogs: Option<u32>,

    /// Offset into the matching log entries
    #[arg(long)]
    offset: Option<u32>,

    /// Start of the search window, e.g. "now-1h" or "2024-05-01T00:00:00"
    #[arg(long)]
    from: Option<String>,

    /// End of the search window
    #[arg(long)]
    until: Option<String>,

    /// Return only the number of matches
    #[arg(long)]
    count: bool,

    /// Skip TLS certificate verification
    #[arg(long)]
    insecure: bool,

    /// Search among the UAT logs
    #[arg(long)]
    uat: bool,

    /// Return only error logs
    #[arg(long)]
    errors: bool,

    /// Search the proxy access logs
    #[arg(long, conflicts_with = "web")]
    proxy: bool,

    /// Search the web access logs
    #[arg(long)]
    web: bool,

    /// Camel correlation id to match
    #[arg(long)]
    correlation: Option<String>,

    /// Camel context id to match
    #[arg(long)]
    context: Option<String>,

    /// Stack trace text to match
    #[arg(long)]
    stack: Option<String>,

    /// Logger name to match
    #[arg(long)]
    logger: Option<String>,

    /// Bundle name to match
    #[arg(long)]
    bundle: Option<String>,

    /// Log message text to match
    #[arg(long)]
    message: Option<String>,

    /// Request URI to match
    #[arg(long)]
    uri: Option<String>,

    /// HTTP status code to match
    #[arg(long)]
    status: Option<u16>,

    /// Endpoint name to match
    #[arg(long)]
    endpoint: Option<String>,

    /// Host the logs were collected from
    #[arg(long)]
    host: Option<String>,

    /// Client IP address to match
    #[arg(long)]
    client_ip: Option<String>,

    /// Application id to match
    #[arg(long)]
    app_id: Option<String>,

    /// TOML configuration file layered over ~/.logsearch_profile
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log debug information to stderr
    #[arg(long)]
    debug: bool,

    /// Free-text message or raw query clauses
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    terms: Vec<String>,
}

pub async fn run(args: Args) -> Result<()> {
    let cli = CLI::parse_from(args);
    init_tracing(cli.debug);

    let config = Config::default().load(cli.config.as_deref()).await?;
    let config = ensure_password(cli.apply(config), &mut TerminalPrompt)?;

    debug!(?config, "resolved configuration");

    let response = RequestBuilder::from_config(&config)?.send().await?;
    let body = response.bytes().await.context("read response body")?;

    let mut stdout = io::stdout().lock();
    stdout.write_all(&body)?;
    writeln!(stdout)?;

    Ok(())
}

impl CLI {
    /// Layers the flags and positional arguments over the given
    /// configuration
    fn apply(self, config: Config) -> Config {
        let mut config = Config {
            url_base: self.url_base.unwrap_or(config.url_base),
            username: self.username.or(config.username),
            password: self.password.or(config.password),
            num_logs: self.numlogs.unwrap_or(config.num_logs),
            offset: self.offset.unwrap_or(config.offset),
            from_time: self.from.unwrap_or(config.from_time),
            until_time: self.until.unwrap_or(config.until_time),
            count: self.count || config.count,
            insecure: self.insecure || config.insecure,
            uat: self.uat || config.uat,
            errors: self.errors || config.errors,
            proxy_log: self.proxy || (config.proxy_log && !self.web),
            web_log: self.web || (config.web_log && !self.proxy),
            correlation_id: self.correlation.or(config.correlation_id),
            context_id: self.context.or(config.context_id),
            stack_trace: self.stack.or(config.stack_trace),
            logger_name: self.logger.or(config.logger_name),
            bundle_name: self.bundle.or(config.bundle_name),
            message: self.message.or(config.message),
            request_uri: self.uri.or(config.request_uri),
            status_code: self.status.or(config.status_code),
            endpoint: self.endpoint.or(config.endpoint),
            host: self.host.or(config.host),
            client_ip: self.client_ip.or(config.client_ip),
            app_id: self.app_id.or(config.app_id),
            ext_terms: config.ext_terms,
        };

        match parse_terms(&self.terms) {
            Some(SearchTerms::Message(message)) => config.message = Some(message),
            Some(SearchTerms::Clauses(clauses)) => config.ext_terms = clauses,
            None => {}
        }

        config
    }
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("logsearch=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}
