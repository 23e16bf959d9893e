use clap::Parser;
use reqwest::StatusCode;

/// Checks a list of HTTP endpoints and reports the ones that failed
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to the endpoint configuration (JSON, or TOML when it ends in .toml)
    #[arg(short, long, default_value = "config.json")]
    pub path: String,

    /// Total timeout for a single request, in seconds
    #[arg(short, long, default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: u64,

    /// Status code that counts as healthy. Repeat the flag to allow several
    #[arg(short = 's', long = "ok-status", default_value = "200", value_parser = parse_status)]
    pub ok_statuses: Vec<StatusCode>,

    /// Pretty print the JSON failure report
    #[arg(long)]
    pub pretty: bool,
}

fn parse_status(s: &str) -> Result<StatusCode, String> {
    let code: u16 = s.parse().map_err(|_| format!("`{s}` is not a number"))?;
    StatusCode::from_u16(code).map_err(|e| format!("`{s}` is not an HTTP status code: {e}"))
}
