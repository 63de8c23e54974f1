//! CLI argument definitions using clap derive macros.

use clap::Parser;

/// Measure upload and download throughput against a WebDAV cloud-storage server.
///
/// Runs small-file, medium-file and large-file scenarios in a scratch folder
/// on the server and reports MB/s per scenario. Values not given here fall
/// back to `$XDG_CONFIG_HOME/davbench/config.toml`, then to built-in defaults.
#[derive(Parser, Debug)]
#[command(name = "davbench")]
#[command(author, version, about)]
pub struct Args {
    /// Server root URL, e.g. https://cloud.example.com
    #[arg(long, env = "DAVBENCH_URL")]
    pub url: Option<String>,

    /// Account name
    #[arg(short = 'u', long, env = "DAVBENCH_USER")]
    pub user: Option<String>,

    /// Password or app token
    #[arg(short = 'p', long, env = "DAVBENCH_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Print the final report as JSON
    #[arg(long)]
    pub json: bool,

    /// Number of small files (1-1000)
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..=1000))]
    pub small_count: Option<u16>,

    /// Size of each small file in KiB (1-1048576)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=1_048_576))]
    pub small_size_kib: Option<u64>,

    /// Parallel small-file transfers (1-100)
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..=100))]
    pub small_parallel: Option<u16>,

    /// Number of medium files (1-1000)
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..=1000))]
    pub medium_count: Option<u16>,

    /// Size of each medium file in MiB (1-10240)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=10_240))]
    pub medium_size_mib: Option<u64>,

    /// Parallel medium-file transfers (1-100)
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..=100))]
    pub medium_parallel: Option<u16>,

    /// Size of the large file in MiB (1-102400)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=102_400))]
    pub large_size_mib: Option<u64>,

    /// Chunk size for chunked uploads in MiB (1-1024)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=1024))]
    pub chunk_size_mib: Option<u64>,

    /// Upload the large file with a single PUT instead of chunks
    #[arg(long)]
    pub no_chunking: bool,

    /// Leave the scratch folder on the server after the run
    #[arg(long)]
    pub keep_files: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_default_args_parses_successfully() {
        let args = Args::try_parse_from(["davbench"]).unwrap();
        assert_eq!(args.verbose, 0);
        assert!(!args.quiet);
        assert!(!args.json);
        assert!(!args.no_chunking);
        assert!(args.small_count.is_none());
    }

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let args = Args::try_parse_from(["davbench", "-v"]).unwrap();
        assert_eq!(args.verbose, 1);

        let args = Args::try_parse_from(["davbench", "-vv"]).unwrap();
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_cli_connection_flags() {
        let args = Args::try_parse_from([
            "davbench",
            "--url",
            "https://cloud.example.com",
            "-u",
            "alice",
            "-p",
            "secret",
        ])
        .unwrap();
        assert_eq!(args.url.as_deref(), Some("https://cloud.example.com"));
        assert_eq!(args.user.as_deref(), Some("alice"));
        assert_eq!(args.password.as_deref(), Some("secret"));
    }

    #[test]
    fn test_cli_scenario_overrides() {
        let args = Args::try_parse_from([
            "davbench",
            "--small-count",
            "20",
            "--small-parallel",
            "8",
            "--large-size-mib",
            "1024",
            "--no-chunking",
        ])
        .unwrap();
        assert_eq!(args.small_count, Some(20));
        assert_eq!(args.small_parallel, Some(8));
        assert_eq!(args.large_size_mib, Some(1024));
        assert!(args.no_chunking);
    }

    #[test]
    fn test_cli_zero_parallelism_rejected() {
        let result = Args::try_parse_from(["davbench", "--small-parallel", "0"]);
        assert!(result.is_err());
        assert_eq!(
            result.unwrap_err().kind(),
            clap::error::ErrorKind::ValueValidation
        );
    }

    #[test]
    fn test_cli_chunk_size_over_max_rejected() {
        let result = Args::try_parse_from(["davbench", "--chunk-size-mib", "2048"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let result = Args::try_parse_from(["davbench", "--help"]);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_cli_invalid_flag_returns_error() {
        let result = Args::try_parse_from(["davbench", "--invalid-flag"]);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::UnknownArgument);
    }
}
