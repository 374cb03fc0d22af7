use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "svcdiag")]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), " (built ", env!("BUILD_TIME"), ")"))]
#[command(about = "Read-only health diagnostics for a containerized web service", long_about = None)]
pub struct Cli {
    /// TOML configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Target container ID or name
    #[arg(short, long, env = "SVCDIAG_CONTAINER")]
    pub container: Option<String>,

    /// Host port the service is published on
    #[arg(short = 'p', long)]
    pub host_port: Option<u16>,

    /// Port the service listens on inside the container (defaults to host port)
    #[arg(long)]
    pub service_port: Option<u16>,

    /// Public hostname served through the tunnel
    #[arg(long, env = "SVCDIAG_PRODUCTION_HOST")]
    pub production_host: Option<String>,

    /// Process name expected to run inside the container
    #[arg(long)]
    pub service_process: Option<String>,

    /// Extra service log file inside the container (repeatable)
    #[arg(long)]
    pub service_log: Vec<String>,

    /// Reverse-proxy access log path (repeatable)
    #[arg(long)]
    pub access_log: Vec<String>,

    /// Reverse-proxy error log path (repeatable)
    #[arg(long)]
    pub error_log: Vec<String>,

    /// Lines to tail from each log source
    #[arg(short = 'n', long)]
    pub tail_lines: Option<usize>,

    /// Maximum checks running at once (1 = sequential)
    #[arg(short = 'j', long)]
    pub concurrency: Option<usize>,

    /// Overall deadline for the run in seconds (0 disables)
    #[arg(long)]
    pub deadline_secs: Option<u64>,

    /// Skip the accelerator query
    #[arg(long)]
    pub no_accelerator: bool,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text", value_parser = ["text", "json"])]
    pub output: String,

    /// Show debug logs on stderr
    #[arg(short, long)]
    pub verbose: bool,
}
