use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

/// Command-line arguments for the Herald binary.
#[derive(Debug, Parser)]
#[command(name = "herald", version, about = "Herald notification dispatcher")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "HERALD_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the dispatch poller until interrupted.
    Serve(Box<ServeArgs>),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the poll interval of the dispatcher.
    #[arg(long = "dispatch-poll-interval-seconds", value_name = "SECONDS")]
    pub dispatch_poll_interval_seconds: Option<u64>,

    /// Override the per-item delivery timeout.
    #[arg(long = "dispatch-delivery-timeout-seconds", value_name = "SECONDS")]
    pub dispatch_delivery_timeout_seconds: Option<u64>,

    /// Override how often a transiently failed message is retried.
    #[arg(long = "dispatch-max-delivery-retries", value_name = "COUNT")]
    pub dispatch_max_delivery_retries: Option<u32>,

    /// Override the durable store backend (memory|redis).
    #[arg(long = "store-backend", value_name = "BACKEND")]
    pub store_backend: Option<String>,

    /// Override the Redis connection URL.
    #[arg(long = "redis-url", value_name = "URL")]
    pub redis_url: Option<String>,
}
