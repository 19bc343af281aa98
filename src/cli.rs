//! Command-line interface for shell-relay.
//!
//! Uses lexopt for minimal binary size overhead.

use std::ffi::OsString;
use std::net::IpAddr;
use std::path::PathBuf;

use lexopt::ValueExt;
use thiserror::Error;

/// Command-line arguments.
///
/// Every option is optional so that unset flags never mask values coming
/// from the environment or a config file.
#[derive(Debug, Clone, Default)]
pub struct Args {
    /// Host address to bind to.
    pub host: Option<IpAddr>,
    /// Port to listen on.
    pub port: Option<u16>,
    /// Path to configuration file.
    pub config: Option<PathBuf>,
    /// Shell executable used to run commands.
    pub shell: Option<String>,
    /// Stream-mode resend interval in milliseconds.
    pub resend_interval_ms: Option<u64>,
    /// Poll-mode re-run interval in milliseconds.
    pub poll_interval_ms: Option<u64>,
    /// Wait for in-flight calls on shutdown.
    pub graceful_shutdown: bool,
    /// Log level (error, warn, info, debug, trace).
    pub log_level: Option<String>,
    /// Show version and exit.
    pub version: bool,
    /// Show help and exit.
    pub help: bool,
}

/// Parse command-line arguments.
pub fn parse_args() -> Result<Args, ArgsError> {
    parse_args_from(std::env::args_os())
}

fn parse_value<T: std::str::FromStr>(
    parser: &mut lexopt::Parser,
    name: &'static str,
) -> Result<T, ArgsError> {
    let value: String = parser.value()?.parse()?;
    value
        .parse()
        .map_err(|_| ArgsError::InvalidValue(name, value))
}

/// Parse arguments from an iterator (for testing).
pub fn parse_args_from<I>(args: I) -> Result<Args, ArgsError>
where
    I: IntoIterator<Item = OsString>,
{
    use lexopt::prelude::*;

    let mut result = Args::default();
    let mut parser = lexopt::Parser::from_iter(args);

    while let Some(arg) = parser.next()? {
        match arg {
            Short('h') | Long("help") => {
                result.help = true;
            }
            Short('V') | Long("version") => {
                result.version = true;
            }
            Short('H') | Long("host") => {
                result.host = Some(parse_value(&mut parser, "host")?);
            }
            Short('p') | Long("port") => {
                result.port = Some(parse_value(&mut parser, "port")?);
            }
            Short('c') | Long("config") => {
                result.config = Some(parser.value()?.parse()?);
            }
            Long("shell") => {
                result.shell = Some(parser.value()?.parse()?);
            }
            Long("resend-interval") => {
                result.resend_interval_ms = Some(parse_value(&mut parser, "resend-interval")?);
            }
            Long("poll-interval") => {
                result.poll_interval_ms = Some(parse_value(&mut parser, "poll-interval")?);
            }
            Long("graceful-shutdown") => {
                result.graceful_shutdown = true;
            }
            Short('l') | Long("log-level") => {
                result.log_level = Some(parser.value()?.parse()?);
            }
            Value(val) => {
                return Err(ArgsError::UnexpectedArgument(
                    val.to_string_lossy().into(),
                ));
            }
            _ => return Err(arg.unexpected().into()),
        }
    }

    Ok(result)
}

/// Print help message.
pub fn print_help() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        r#"shell-relay {version}
Minimal remote command-execution service

USAGE:
    shell-relay [OPTIONS]

OPTIONS:
    -H, --host <ADDR>            Host address to bind [default: 127.0.0.1]
    -p, --port <PORT>            Port to listen on [default: 50051]
    -c, --config <FILE>          Path to configuration file (JSON)
        --shell <PROGRAM>        Shell used to run commands [default: sh / cmd]
        --resend-interval <MS>   Stream mode resend interval [default: 500]
        --poll-interval <MS>     Poll mode re-run interval [default: 1000]
        --graceful-shutdown      Wait for in-flight calls on shutdown
    -l, --log-level <LVL>        Log level (error, warn, info, debug, trace)
    -h, --help                   Print help
    -V, --version                Print version

ENVIRONMENT VARIABLES:
    SHELL_RELAY_HOST        Host address (overrides config)
    SHELL_RELAY_PORT        Port number (overrides config)
    SHELL_RELAY_SHELL       Shell executable (overrides config)
    SHELL_RELAY_LOG_LEVEL   Log level (overrides config)
    RUST_LOG                Alternative log level setting

SECURITY:
    Commands are passed verbatim to the host shell and there is no
    authentication. Anyone who can reach the port can run arbitrary
    commands as the service user. Bind to a trusted interface only.

EXAMPLES:
    # Start with defaults (localhost:50051)
    shell-relay

    # Listen on all interfaces with faster streaming
    shell-relay -H 0.0.0.0 --resend-interval 200

    # Start with config file
    shell-relay -c /etc/shell-relay/config.json
"#
    );
}

/// Print version.
pub fn print_version() {
    println!("shell-relay {}", env!("CARGO_PKG_VERSION"));
}

/// Argument parsing errors.
#[derive(Debug, Error)]
pub enum ArgsError {
    /// Lexopt parsing error.
    #[error(transparent)]
    Lexopt(#[from] lexopt::Error),
    /// Invalid argument value.
    #[error("invalid value for --{0}: '{1}'")]
    InvalidValue(&'static str, String),
    /// Unexpected positional argument.
    #[error("unexpected argument: '{0}'")]
    UnexpectedArgument(String),
}
