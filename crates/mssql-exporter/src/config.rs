//! Command line and environment configuration.

use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use mssql_core::{CollectorConfig, ScrapePolicy};
use mssql_observe::{LoggerConfig, LoggerError};
use mssql_source::SourceConfig;

/// Prometheus exporter for Microsoft SQL Server.
#[derive(Debug, Parser)]
#[command(name = "mssql-exporter", version)]
#[command(about = "Prometheus exporter for Microsoft SQL Server")]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Used when no subcommand is given.
    #[command(flatten)]
    pub serve: ServeArgs,
}

impl Cli {
    /// The subcommand to run; serving is the default.
    pub fn into_command(self) -> Command {
        self.command.unwrap_or(Command::Serve(self.serve))
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve the scrape endpoint (default).
    Serve(ServeArgs),
    /// Print every query and the series it feeds, then exit.
    Docs,
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// SQL Server host name or address; required to serve.
    #[arg(long, env = "SERVER")]
    pub server: Option<String>,

    /// SQL Server port.
    #[arg(long, env = "PORT", default_value_t = 1433)]
    pub port: u16,

    /// SQL login.
    #[arg(long, env = "USERNAME", default_value = "sa")]
    pub username: String,

    /// SQL password.
    #[arg(long, env = "PASSWORD", hide_env_values = true, default_value = "")]
    pub password: String,

    /// Database to connect to; server default when unset.
    #[arg(long, env = "DATABASE")]
    pub database: Option<String>,

    /// Require an encrypted connection.
    #[arg(long, env = "ENCRYPT", default_value_t = true, action = clap::ArgAction::Set)]
    pub encrypt: bool,

    /// Accept any server certificate.
    #[arg(long, env = "TRUST_SERVER_CERTIFICATE", default_value_t = true, action = clap::ArgAction::Set)]
    pub trust_server_certificate: bool,

    /// Port the scrape endpoint listens on.
    #[arg(long, env = "EXPOSE", default_value_t = 4000)]
    pub expose: u16,

    /// Address the scrape endpoint binds to.
    #[arg(long, env = "BIND", default_value = "0.0.0.0")]
    pub bind: String,

    /// What a failing query does to the scrape: fail|skip.
    #[arg(long, env = "SCRAPE_POLICY", default_value = "fail")]
    pub scrape_policy: ScrapePolicy,

    /// Per query timeout (ms).
    #[arg(long, env = "QUERY_TIMEOUT_MS", default_value_t = 15_000)]
    pub query_timeout_ms: u64,

    /// Connect timeout (ms).
    #[arg(long, env = "CONNECT_TIMEOUT_MS", default_value_t = 15_000)]
    pub connect_timeout_ms: u64,

    /// Log filter directive.
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log format: text|json|journald.
    #[arg(long, env = "LOG_FORMAT", default_value = "text")]
    pub log_format: String,
}

impl ServeArgs {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.expose)
    }

    pub fn source_config(&self) -> anyhow::Result<SourceConfig> {
        let host = self
            .server
            .clone()
            .context("no database server given (--server or SERVER)")?;

        Ok(SourceConfig {
            host,
            port: self.port,
            username: self.username.clone(),
            password: self.password.clone(),
            database: self.database.clone(),
            encrypt: self.encrypt,
            trust_server_certificate: self.trust_server_certificate,
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
        })
    }

    pub fn collector_config(&self) -> CollectorConfig {
        CollectorConfig {
            policy: self.scrape_policy,
            query_timeout: Duration::from_millis(self.query_timeout_ms),
        }
    }

    pub fn logger_config(&self) -> Result<LoggerConfig, LoggerError> {
        LoggerConfig::new(&self.log_format, &self.log_level)
    }
}
