//! Structured logging setup
//!
//! `RUST_LOG` overrides the default filter. Production logs JSON; development
//! logs pretty output unless `RUBIX_LOG_FORMAT=json` is set.

use crate::settings::Environment;
use anyhow::{Context, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "rubix_core=info,rubix_infra_amqp=info,rubix_infra_sms=info,rubix_daemon=info,rubixd=info";
const LOG_FORMAT_ENV: &str = "RUBIX_LOG_FORMAT";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    Json,
    Pretty,
}

fn log_format(environment: Environment, override_format: Option<&str>) -> LogFormat {
    match override_format {
        Some("json") => LogFormat::Json,
        Some("pretty") => LogFormat::Pretty,
        _ if environment == Environment::Production => LogFormat::Json,
        _ => LogFormat::Pretty,
    }
}

pub fn init_logging(environment: Environment) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_FILTER))
        .context("Failed to create env filter")?;

    let requested = std::env::var(LOG_FORMAT_ENV).ok();
    match log_format(environment, requested.as_deref()) {
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json())
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().pretty())
            .try_init(),
    }
    .context("Failed to install tracing subscriber")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_selection() {
        assert_eq!(log_format(Environment::Production, None), LogFormat::Json);
        assert_eq!(log_format(Environment::Development, None), LogFormat::Pretty);
        assert_eq!(
            log_format(Environment::Development, Some("json")),
            LogFormat::Json
        );
        assert_eq!(
            log_format(Environment::Production, Some("pretty")),
            LogFormat::Pretty
        );
        assert_eq!(
            log_format(Environment::Production, Some("xml")),
            LogFormat::Json
        );
    }
}
