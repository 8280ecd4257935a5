//! Tracing setup for processes which run drains.
//!
//! Settings come from the environment:
//! * `TRACING_FILTER_DIRECTIVE`: `EnvFilter` directives, INFO when unset.
//! * `LOGGING_FORMATTER`: one of `full`, `compact`, `pretty` (the default) or `json`.
//! * `LOGGING_ANSI_ENABLED`: `true` to colorize output.
use opentelemetry_sdk::propagation::TraceContextPropagator;
use serde::Deserialize;
use snafu::{ResultExt, Snafu};
use std::env;
use std::str::ParseBoolError;
use tracing_subscriber::{filter::LevelFilter, fmt, layer::SubscriberExt, EnvFilter, Registry};

const TRACING_FILTER_DIRECTIVE_ENV_VAR: &str = "TRACING_FILTER_DIRECTIVE";
const LOGGING_FORMATTER_ENV_VAR: &str = "LOGGING_FORMATTER";
const LOGGING_ANSI_ENABLED_ENV_VAR: &str = "LOGGING_ANSI_ENABLED";

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum TelemetryError {
    #[snafu(display("Error configuring tracing: '{}'", source))]
    TracingConfiguration {
        source: tracing::subscriber::SetGlobalDefaultError,
    },

    #[snafu(display(
        "Unknown log format '{}={}': '{}'",
        LOGGING_FORMATTER_ENV_VAR,
        env_value,
        source
    ))]
    LogFormatterEnv {
        source: serde_plain::Error,
        env_value: String,
    },

    #[snafu(display(
        "Expected 'true' or 'false' in '{}={}': '{}'",
        LOGGING_ANSI_ENABLED_ENV_VAR,
        env_value,
        source
    ))]
    LogAnsiEnv {
        source: ParseBoolError,
        env_value: String,
    },
}

type Result<T> = std::result::Result<T, TelemetryError>;

/// How each tracing event is rendered.
#[derive(Copy, Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Full,
    Compact,
    #[default]
    Pretty,
    /// Newline-delimited JSON, for log collectors.
    Json,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TelemetrySettings {
    pub filter: Option<String>,
    pub format: LogFormat,
    pub ansi: bool,
}

impl TelemetrySettings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let format = match lookup(LOGGING_FORMATTER_ENV_VAR) {
            Some(value) => {
                serde_plain::from_str(&value).context(LogFormatterEnvSnafu { env_value: &value })?
            }
            None => LogFormat::default(),
        };
        let ansi = match lookup(LOGGING_ANSI_ENABLED_ENV_VAR) {
            Some(value) => value
                .to_lowercase()
                .parse()
                .context(LogAnsiEnvSnafu { env_value: &value })?,
            None => false,
        };

        Ok(TelemetrySettings {
            filter: lookup(TRACING_FILTER_DIRECTIVE_ENV_VAR),
            format,
            ansi,
        })
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::builder()
            .with_default_directive(LevelFilter::INFO.into())
            .parse_lossy(self.filter.as_deref().unwrap_or_default())
    }

    /// Installs the global tracing subscriber and the W3C trace context propagator.
    pub fn init(&self) -> Result<()> {
        opentelemetry::global::set_text_map_propagator(TraceContextPropagator::new());

        // Exactly one of the format layers is present.
        let ansi = self.ansi;
        let subscriber = Registry::default()
            .with(self.env_filter())
            .with((self.format == LogFormat::Full).then(|| fmt::layer().with_ansi(ansi)))
            .with((self.format == LogFormat::Compact).then(|| fmt::layer().compact().with_ansi(ansi)))
            .with((self.format == LogFormat::Pretty).then(|| fmt::layer().pretty().with_ansi(ansi)))
            .with((self.format == LogFormat::Json).then(|| fmt::layer().json().with_ansi(ansi)));

        tracing::subscriber::set_global_default(subscriber).context(TracingConfigurationSnafu)
    }
}

pub fn init_telemetry_from_env() -> Result<()> {
    TelemetrySettings::from_env()?.init()
}
