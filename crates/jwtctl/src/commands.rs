//! Command-line definition and command execution.

use clap::{Parser, Subcommand};
use jwt_manager::config::ConfigError;
use jwt_manager::header::parse_bearer;
use jwt_manager::resolver::Resolution;
use jwt_manager::time::parse_timespan;
use jwt_manager::{GenerateOptions, JwtManager, ManagerConfig};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::debug;

/// Free-form properties given with `--claim name=value`.
pub type Properties = Map<String, Value>;

/// Manager driven by the CLI: the resolver echoes the requested subject.
pub type CliManager = JwtManager<(String, Properties), Properties>;

/// Issue, verify and inspect tokens.
///
/// Configuration is read from `JWT_ALGORITHM`, `JWT_SECRET`,
/// `JWT_PUBLIC_KEY_PEM`, `JWT_PRIVATE_KEY_PEM`, `JWT_ISSUER`, `JWT_AUDIENCE`,
/// `JWT_EXPIRY` and `JWT_CLOCK_TOLERANCE_SECONDS`.
#[derive(Parser, Debug)]
#[command(name = "jwtctl", version, about)]
pub struct Cli {
    /// Emit logs as JSON on stderr
    #[arg(long, global = true, env = "JWTCTL_LOG_JSON")]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Sign a token for a subject
    Issue {
        subject: String,

        /// Lifetime, e.g. "15m" or "1h 30min" (defaults to JWT_EXPIRY)
        #[arg(long, value_parser = timespan)]
        expires_in: Option<Duration>,

        /// Delay before the token becomes valid
        #[arg(long, value_parser = timespan)]
        not_before: Option<Duration>,

        /// Extra claim as name=value; the value is read as JSON when it parses
        #[arg(long = "claim", value_parser = parse_claim)]
        claims: Vec<(String, Value)>,
    },

    /// Verify a compact token and print its claims
    Verify {
        token: String,

        /// Accepted audiences, comma separated (defaults to JWT_AUDIENCE)
        #[arg(long, value_delimiter = ',', value_parser = audience_entry)]
        audience: Vec<String>,
    },

    /// Verify an Authorization header value ("Bearer <token>")
    Header {
        value: String,

        /// Accepted audiences, comma separated (defaults to JWT_AUDIENCE)
        #[arg(long, value_delimiter = ',', value_parser = audience_entry)]
        audience: Vec<String>,
    },

    /// Print the claims of a token without verifying it
    Decode { token: String },
}

fn timespan(raw: &str) -> Result<Duration, String> {
    parse_timespan(raw).map_err(|e| e.to_string())
}

/// `name=value`; the value is taken as JSON when it parses, else as a string.
fn parse_claim(raw: &str) -> Result<(String, Value), String> {
    let Some((name, value)) = raw.split_once('=') else {
        return Err(format!("invalid claim '{raw}', expected name=value"));
    };
    if name.is_empty() {
        return Err(format!("invalid claim '{raw}', name is empty"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((name.to_string(), value))
}

fn audience_entry(raw: &str) -> Result<String, String> {
    let entry = raw.trim();
    if entry.is_empty() {
        return Err("audience entries cannot be empty".to_string());
    }
    Ok(entry.to_string())
}

async fn resolve_cli(args: (String, Properties)) -> anyhow::Result<Option<Resolution<Properties>>> {
    let (subject, properties) = args;
    Ok(Some(Resolution::WithProperties(subject, properties)))
}

/// Build the CLI manager from `config`.
///
/// # Errors
///
/// Returns `ConfigError` if the manager cannot be built.
pub fn build_manager(config: ManagerConfig) -> Result<CliManager, ConfigError> {
    CliManager::builder(config, resolve_cli).build()
}

/// Execute `command`, returning what should be printed.
///
/// # Errors
///
/// Returns an error when the token is refused or cannot be issued.
pub async fn execute(manager: &CliManager, command: Command) -> anyhow::Result<String> {
    match command {
        Command::Issue {
            subject,
            expires_in,
            not_before,
            claims,
        } => {
            let mut options = GenerateOptions::default();
            if let Some(ttl) = expires_in {
                options = options.expires_in(ttl);
            }
            if let Some(delay) = not_before {
                options = options.not_before(delay);
            }
            let properties: Properties = claims.into_iter().collect();

            debug!(target: "jwtctl", properties = properties.len(), "Issuing token");
            match manager.try_generate_with((subject, properties), options).await? {
                Some(token) => Ok(token),
                None => anyhow::bail!("no token issued"),
            }
        }
        Command::Verify { token, audience } => {
            let claims = manager.try_verify_for(&token, &audience).await?;
            Ok(serde_json::to_string_pretty(&claims)?)
        }
        Command::Header { value, audience } => {
            let Some(token) = parse_bearer(&value) else {
                anyhow::bail!("not a bearer credential");
            };
            let claims = manager.try_verify_for(token, &audience).await?;
            Ok(serde_json::to_string_pretty(&claims)?)
        }
        Command::Decode { token } => match manager.decode(&token) {
            Some(claims) => Ok(serde_json::to_string_pretty(&claims)?),
            None => anyhow::bail!("token cannot be decoded"),
        },
    }
}
