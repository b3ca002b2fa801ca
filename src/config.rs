use std::{
    fmt,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::Deserialize;
use tokio::fs;
use tracing::debug;

use crate::query_builder::Flavor;

const DEFAULT_URL_BASE: &str = "http://localhost:9200";
const DEFAULT_NUM_LOGS: u32 = 100;
const DEFAULT_FROM_TIME: &str = "now-30m";
const DEFAULT_UNTIL_TIME: &str = "now";

const PROFILE_FILE_NAME: &str = ".logsearch_profile";

/// The effective settings for a single query
///
/// Built once from defaults, the profile file, flags and positional
/// arguments, then handed by value to the request builder.
#[derive(Clone, PartialEq)]
pub struct Config {
    pub url_base: String,
    pub username: Option<String>,
    pub password: Option<String>,

    pub num_logs: u32,
    pub offset: u32,
    pub from_time: String,
    pub until_time: String,

    /// Ask the backend for a match count instead of documents
    pub count: bool,

    /// Skip TLS certificate verification
    pub insecure: bool,

    pub uat: bool,
    pub errors: bool,
    pub proxy_log: bool,
    pub web_log: bool,

    pub correlation_id: Option<String>,
    pub context_id: Option<String>,
    pub stack_trace: Option<String>,
    pub logger_name: Option<String>,
    pub bundle_name: Option<String>,
    pub message: Option<String>,
    pub request_uri: Option<String>,
    pub status_code: Option<u16>,
    pub endpoint: Option<String>,
    pub host: Option<String>,
    pub client_ip: Option<String>,
    pub app_id: Option<String>,

    /// Raw query-language clauses appended to the generated query
    pub ext_terms: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            url_base: DEFAULT_URL_BASE.to_string(),
            username: None,
            password: None,
            num_logs: DEFAULT_NUM_LOGS,
            offset: 0,
            from_time: DEFAULT_FROM_TIME.to_string(),
            until_time: DEFAULT_UNTIL_TIME.to_string(),
            count: false,
            insecure: false,
            uat: false,
            errors: false,
            proxy_log: false,
            web_log: false,
            correlation_id: None,
            context_id: None,
            stack_trace: None,
            logger_name: None,
            bundle_name: None,
            message: None,
            request_uri: None,
            status_code: None,
            endpoint: None,
            host: None,
            client_ip: None,
            app_id: None,
            ext_terms: Vec::new(),
        }
    }
}

impl Config {
    /// Returns the query flavor selected by the mode flags
    ///
    /// The proxy access log wins if both mode flags are somehow set.
    pub fn flavor(&self) -> Flavor {
        if self.proxy_log {
            Flavor::ProxyAccessLog
        } else if self.web_log {
            Flavor::WebAccessLog
        } else {
            Flavor::PrimaryLog
        }
    }

    /// Returns the basic auth credentials, if a username is set
    pub fn credentials(&self) -> Option<(&str, &str)> {
        let username = non_empty(&self.username)?;
        Some((username, self.password.as_deref().unwrap_or_default()))
    }

    /// Whether a username is set without a matching password
    pub fn needs_password(&self) -> bool {
        non_empty(&self.username).is_some() && non_empty(&self.password).is_none()
    }

    /// Layers the profile file and an optional explicit config file over
    /// this configuration
    pub async fn load(self, explicit_path: Option<&Path>) -> Result<Self> {
        let default_path = get_profile_path()?;
        self.load_with_default(&default_path, explicit_path).await
    }

    /// Layers the file at `default_path`, then `explicit_path` when it names
    /// a different file
    pub async fn load_with_default(
        self,
        default_path: &Path,
        explicit_path: Option<&Path>,
    ) -> Result<Self> {
        let mut config = self.load_default(default_path).await?;

        if let Some(path) = explicit_path {
            if path != default_path {
                config = config.load_from_path(path).await?;
            }
        }

        Ok(config)
    }

    /// Layers the file at `path` over this configuration, ignoring a
    /// missing file
    pub async fn load_default(self, path: &Path) -> Result<Self> {
        match fs::read_to_string(path).await {
            Ok(contents) => {
                debug!(path = %path.display(), "reading config file");
                self.merge_str(&contents)
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(self),
            Err(err) => Err(err).context("open config file"),
        }
    }

    /// Layers the file at `path` over this configuration
    pub async fn load_from_path(self, path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "reading config file");
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("open config file {}", path.display()))?;

        self.merge_str(&contents)
    }

    fn merge_str(self, contents: &str) -> Result<Self> {
        let config_file: ConfigFile = toml::from_str(contents).context("parse config file")?;
        Ok(self.merge(config_file))
    }

    fn merge(self, file: ConfigFile) -> Self {
        Config {
            url_base: file.url_base.unwrap_or(self.url_base),
            username: file.username.or(self.username),
            password: file.password.or(self.password),
            num_logs: file.num_logs.unwrap_or(self.num_logs),
            offset: file.offset.unwrap_or(self.offset),
            from_time: file.from_time.unwrap_or(self.from_time),
            until_time: file.until_time.unwrap_or(self.until_time),
            count: file.count.unwrap_or(self.count),
            insecure: file.insecure.unwrap_or(self.insecure),
            uat: file.uat.unwrap_or(self.uat),
            errors: file.errors.unwrap_or(self.errors),
            proxy_log: file.proxy_log.unwrap_or(self.proxy_log),
            web_log: file.web_log.unwrap_or(self.web_log),
            correlation_id: file.correlation_id.or(self.correlation_id),
            context_id: file.context_id.or(self.context_id),
            stack_trace: file.stack_trace.or(self.stack_trace),
            logger_name: file.logger_name.or(self.logger_name),
            bundle_name: file.bundle_name.or(self.bundle_name),
            message: file.message.or(self.message),
            request_uri: file.request_uri.or(self.request_uri),
            status_code: file.status_code.or(self.status_code),
            endpoint: file.endpoint.or(self.endpoint),
            host: file.host.or(self.host),
            client_ip: file.client_ip.or(self.client_ip),
            app_id: file.app_id.or(self.app_id),
            ext_terms: file.ext_terms.unwrap_or(self.ext_terms),
        }
    }
}

// Hand-written so the password never reaches the debug log.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("url_base", &self.url_base)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("num_logs", &self.num_logs)
            .field("offset", &self.offset)
            .field("from_time", &self.from_time)
            .field("until_time", &self.until_time)
            .field("count", &self.count)
            .field("insecure", &self.insecure)
            .field("flavor", &self.flavor())
            .field("uat", &self.uat)
            .field("errors", &self.errors)
            .field("correlation_id", &self.correlation_id)
            .field("context_id", &self.context_id)
            .field("stack_trace", &self.stack_trace)
            .field("logger_name", &self.logger_name)
            .field("bundle_name", &self.bundle_name)
            .field("message", &self.message)
            .field("request_uri", &self.request_uri)
            .field("status_code", &self.status_code)
            .field("endpoint", &self.endpoint)
            .field("host", &self.host)
            .field("client_ip", &self.client_ip)
            .field("app_id", &self.app_id)
            .field("ext_terms", &self.ext_terms)
            .finish()
    }
}

/// Treats an empty string the same as a missing value
pub fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Returns the location of the per-user profile file
pub fn get_profile_path() -> Result<PathBuf> {
    Ok(homedir::my_home()?
        .context("home dir")?
        .join(PROFILE_FILE_NAME))
}

/// Keys of the profile file
///
/// Also accepts the CamelCase keys of profiles written for the older
/// logsearch tool.
#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(alias = "UrlBase", alias = "urlbase")]
    url_base: Option<String>,
    #[serde(alias = "Username")]
    username: Option<String>,
    #[serde(alias = "Password")]
    password: Option<String>,
    #[serde(alias = "NumLogs", alias = "numlogs")]
    num_logs: Option<u32>,
    #[serde(alias = "Offset")]
    offset: Option<u32>,
    #[serde(alias = "FromTime", alias = "fromtime")]
    from_time: Option<String>,
    #[serde(alias = "UntilTime", alias = "untiltime")]
    until_time: Option<String>,
    #[serde(alias = "Count")]
    count: Option<bool>,
    insecure: Option<bool>,
    #[serde(alias = "Uat")]
    uat: Option<bool>,
    #[serde(alias = "Errors")]
    errors: Option<bool>,
    proxy_log: Option<bool>,
    web_log: Option<bool>,
    #[serde(alias = "CorrelationID", alias = "CorrelationId", alias = "correlationid")]
    correlation_id: Option<String>,
    #[serde(alias = "ContextID", alias = "ContextId", alias = "contextid")]
    context_id: Option<String>,
    #[serde(alias = "StackTrace", alias = "stacktrace")]
    stack_trace: Option<String>,
    logger_name: Option<String>,
    bundle_name: Option<String>,
    #[serde(alias = "Message")]
    message: Option<String>,
    request_uri: Option<String>,
    status_code: Option<u16>,
    endpoint: Option<String>,
    host: Option<String>,
    client_ip: Option<String>,
    app_id: Option<String>,
    #[serde(alias = "ExtTerms", alias = "extterms")]
    ext_terms: Option<Vec<String>>,
}
