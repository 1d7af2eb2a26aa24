//! Configuration types and CLI options.
//!
//! This module defines enums and structs used for command-line argument parsing
//! and configuration.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::config::constants::{DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT};

/// Logging level for the application.
///
/// Controls the verbosity of log output, from most restrictive (Error) to most
/// verbose (Trace).
#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    /// Only error messages
    Error,
    /// Error and warning messages
    Warn,
    /// Error, warning, and informational messages
    Info,
    /// All messages except trace
    Debug,
    /// All messages including trace
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Log output format.
///
/// Controls how log messages are formatted:
/// - `Plain`: Human-readable format with colors (default)
/// - `Json`: Structured JSON format for machine parsing
#[derive(Clone, Debug, ValueEnum)]
pub enum LogFormat {
    /// Human-readable format with colors (default)
    Plain,
    /// Structured JSON format for machine parsing
    Json,
}

/// Which transport mechanisms the fetcher may select from.
///
/// `Auto` offers every mechanism the host supports, in priority order.
/// The other variants restrict probing to a single mechanism.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, ValueEnum)]
pub enum TransportPreference {
    /// Standard transport first, legacy as fallback
    #[default]
    Auto,
    /// Only the standard transport
    Standard,
    /// Only the legacy transport
    Legacy,
}

/// Settings for the fetch layer.
///
/// Shared by `HttpFetcher`, `XmlImporter` and transport probing.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Upper bound on the lifetime of a single request
    pub timeout: Duration,

    /// HTTP User-Agent header value
    pub user_agent: String,

    /// Base URL that relative request URLs are resolved against
    pub base_url: Option<url::Url>,

    /// Transport mechanisms probing may choose from
    pub transport: TransportPreference,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            base_url: None,
            transport: TransportPreference::Auto,
        }
    }
}

/// A configuration value that failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigValidationError {
    /// Name of the offending field
    pub field: &'static str,
    /// What is wrong and how to fix it
    pub message: String,
}

impl fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: {}", self.field, self.message)
    }
}

impl std::error::Error for ConfigValidationError {}

/// Library configuration for an import run (no CLI dependencies).
///
/// # Examples
///
/// ```no_run
/// use xml_fetch::Config;
///
/// let config = Config {
///     url: "https://example.com/feed.xml".to_string(),
///     xsl: Some("https://example.com/feed.xsl".to_string()),
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// XML document URL
    pub url: String,

    /// XSLT stylesheet URL
    pub xsl: Option<String>,

    /// Page file the transform result is rendered into
    pub page: Option<PathBuf>,

    /// `id` of the page element receiving the transform result
    pub target: Option<String>,

    /// Skip the cache-busting timestamp
    pub allow_cache: bool,

    /// Log level
    pub log_level: LogLevel,

    /// Log format
    pub log_format: LogFormat,

    /// Per-request timeout in seconds
    pub timeout_seconds: u64,

    /// HTTP User-Agent header value
    pub user_agent: String,

    /// Base URL for relative document URLs
    pub base_url: Option<String>,

    /// Transport mechanisms to probe
    pub transport: TransportPreference,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: String::new(),
            xsl: None,
            page: None,
            target: None,
            allow_cache: false,
            log_level: LogLevel::Info,
            log_format: LogFormat::Plain,
            timeout_seconds: DEFAULT_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            base_url: None,
            transport: TransportPreference::Auto,
        }
    }
}

impl Config {
    /// Checks field values and combinations before a run starts.
    ///
    /// # Errors
    ///
    /// Returns the first `ConfigValidationError` found.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.url.trim().is_empty() {
            return Err(ConfigValidationError {
                field: "url",
                message: "a document URL is required".to_string(),
            });
        }
        if self.timeout_seconds == 0 {
            return Err(ConfigValidationError {
                field: "timeout_seconds",
                message: "must be greater than 0".to_string(),
            });
        }
        if self.target.is_some() && self.page.is_none() {
            return Err(ConfigValidationError {
                field: "target",
                message: "--target requires --page <FILE>".to_string(),
            });
        }
        if self.page.is_some() && self.target.is_none() {
            return Err(ConfigValidationError {
                field: "page",
                message: "--page requires --target <ID>".to_string(),
            });
        }
        if self.page.is_some() && self.xsl.is_none() {
            return Err(ConfigValidationError {
                field: "page",
                message: "rendering into a page requires --xsl <URL>".to_string(),
            });
        }
        if let Some(base) = &self.base_url {
            if let Err(e) = url::Url::parse(base) {
                return Err(ConfigValidationError {
                    field: "base_url",
                    message: format!("expected an absolute URL like https://host/path/ ({e})"),
                });
            }
        }
        Ok(())
    }

    /// Builds the fetch-layer settings for this run.
    ///
    /// Call `validate` first; an unparseable base URL is dropped here.
    pub fn fetch_config(&self) -> FetchConfig {
        FetchConfig {
            timeout: Duration::from_secs(self.timeout_seconds),
            user_agent: self.user_agent.clone(),
            base_url: self
                .base_url
                .as_deref()
                .and_then(|base| url::Url::parse(base).ok()),
            transport: self.transport,
        }
    }
}

/// Command-line options.
///
/// # Examples
///
/// ```bash
/// # Print a parsed XML document
/// xml_fetch https://example.com/feed.xml
///
/// # Render a feed through a stylesheet into a page element
/// xml_fetch https://example.com/feed.xml --xsl https://example.com/feed.xsl \
///     --page index.xhtml --target news
/// ```
#[derive(Debug, Parser)]
#[command(
    name = "xml_fetch",
    about = "Fetches an XML document and optionally renders it through an XSLT stylesheet."
)]
pub struct Opt {
    /// XML document URL
    #[arg(value_parser)]
    pub url: String,

    /// XSLT stylesheet URL
    #[arg(long)]
    pub xsl: Option<String>,

    /// Page file (XHTML) to render the transform result into
    #[arg(long, value_parser)]
    pub page: Option<PathBuf>,

    /// `id` of the page element whose content is replaced
    #[arg(long)]
    pub target: Option<String>,

    /// Do not append a cache-busting timestamp to document URLs
    #[arg(long)]
    pub allow_cache: bool,

    /// Log level: error|warn|info|debug|trace
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    /// Log format: plain|json
    #[arg(long, value_enum, default_value_t = LogFormat::Plain)]
    pub log_format: LogFormat,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_seconds: u64,

    /// HTTP User-Agent header value
    #[arg(long, default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,

    /// Base URL that relative document URLs are resolved against
    #[arg(long)]
    pub base_url: Option<String>,

    /// Transport selection: auto|standard|legacy
    #[arg(long, value_enum, default_value_t = TransportPreference::Auto)]
    pub transport: TransportPreference,
}

impl From<Opt> for Config {
    fn from(opt: Opt) -> Self {
        Self {
            url: opt.url,
            xsl: opt.xsl,
            page: opt.page,
            target: opt.target,
            allow_cache: opt.allow_cache,
            log_level: opt.log_level,
            log_format: opt.log_format,
            timeout_seconds: opt.timeout_seconds,
            user_agent: opt.user_agent,
            base_url: opt.base_url,
            transport: opt.transport,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(
            log::LevelFilter::from(LogLevel::Error),
            log::LevelFilter::Error
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Warn),
            log::LevelFilter::Warn
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Info),
            log::LevelFilter::Info
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Debug),
            log::LevelFilter::Debug
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Trace),
            log::LevelFilter::Trace
        );
    }

    fn valid_config() -> Config {
        Config {
            url: "https://example.com/feed.xml".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_config_requires_url() {
        let err = Config::default().validate().unwrap_err();
        assert_eq!(err.field, "url");
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = Config {
            timeout_seconds: 0,
            ..valid_config()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(err.field, "timeout_seconds");
        assert!(err.message.contains("greater than 0"));
    }

    #[test]
    fn test_target_without_page_rejected() {
        let config = Config {
            target: Some("content".to_string()),
            ..valid_config()
        };
        assert_eq!(config.validate().unwrap_err().field, "target");
    }

    #[test]
    fn test_page_without_xsl_rejected() {
        let config = Config {
            page: Some(PathBuf::from("index.xhtml")),
            target: Some("content".to_string()),
            ..valid_config()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(err.field, "page");
        assert!(err.message.contains("--xsl"));
    }

    #[test]
    fn test_relative_base_url_rejected() {
        let config = Config {
            base_url: Some("/relative/".to_string()),
            ..valid_config()
        };
        assert_eq!(config.validate().unwrap_err().field, "base_url");
    }

    #[test]
    fn test_fetch_config_carries_settings() {
        let config = Config {
            timeout_seconds: 3,
            base_url: Some("https://example.com/data/".to_string()),
            transport: TransportPreference::Legacy,
            ..valid_config()
        };
        let fetch = config.fetch_config();
        assert_eq!(fetch.timeout, Duration::from_secs(3));
        assert_eq!(
            fetch.base_url.as_ref().map(|u| u.as_str()),
            Some("https://example.com/data/")
        );
        assert_eq!(fetch.transport, TransportPreference::Legacy);
    }

    #[test]
    fn test_opt_parses_defaults() {
        let opt = Opt::try_parse_from(["xml_fetch", "https://example.com/a.xml"])
            .expect("should parse");
        let config = Config::from(opt);
        assert_eq!(config.url, "https://example.com/a.xml");
        assert_eq!(config.timeout_seconds, DEFAULT_TIMEOUT_SECS);
        assert_eq!(config.transport, TransportPreference::Auto);
        assert!(!config.allow_cache);
    }
}
