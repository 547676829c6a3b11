use std::{
    fmt::Display,
    fs,
    io::{self, Read, Write},
    path::PathBuf,
    str::FromStr,
};

use clap::{ArgAction, Parser as ClapParser};
use tracing::{Level, debug};
use txtrace_vm::{TraceError, TraceRequest, render, trace_transaction};

#[derive(ClapParser)]
#[command(
    name = "txtrace",
    author,
    version,
    about = "Simulates one EVM transaction over a supplied prestate and prints its trace as JSON"
)]
pub struct CLI {
    #[command(flatten)]
    pub opts: Options,
}

#[derive(ClapParser, Debug)]
pub struct Options {
    #[arg(
        long = "request",
        value_name = "REQUEST_FILE",
        help = "JSON file with the trace request. Read from stdin when omitted.",
        long_help = "A JSON object with chainId, from, to, nonce, data, value, gasLimit, gasPrice, gasPriorityFee, blockEnv, prestate and opStack.",
        env = "TXTRACE_REQUEST"
    )]
    pub request: Option<PathBuf>,
    #[arg(
        long = "pretty",
        action = ArgAction::SetTrue,
        help = "Pretty-print the output.",
        env = "TXTRACE_PRETTY"
    )]
    pub pretty: bool,
    #[arg(
        long = "log.level",
        default_value_t = Level::WARN,
        value_name = "LOG_LEVEL",
        env = "TXTRACE_LOG_LEVEL",
        help = "The verbosity level used for logs.",
        long_help = "Possible values: info, debug, trace, warn, error. Logs go to stderr."
    )]
    pub log_level: Level,
    #[arg(
        long = "log.color",
        default_value_t = LogColor::Auto,
        help = "Output logs with ANSI color codes.",
        long_help = "Possible values: auto, always, never",
        env = "TXTRACE_LOG_COLOR"
    )]
    pub log_color: LogColor,
}

impl Options {
    fn read_request(&self) -> eyre::Result<String> {
        let text = match &self.request {
            Some(path) => fs::read_to_string(path)
                .map_err(|e| eyre::eyre!("Failed to read {}: {e}", path.display()))?,
            None => {
                let mut text = String::new();
                io::stdin().read_to_string(&mut text)?;
                text
            }
        };
        Ok(text)
    }
}

/// Reads the request, traces it and writes one of the two output shapes to stdout.
///
/// Returns whether the trace succeeded. Only I/O failures are errors.
pub fn run(opts: &Options) -> eyre::Result<bool> {
    let text = opts.read_request()?;
    let result = serde_json::from_str::<TraceRequest>(&text)
        .map_err(|e| TraceError::MalformedTransaction(format!("invalid request: {e}")))
        .and_then(|request| trace_transaction(&request));

    if let Err(error) = &result {
        debug!(kind = error.kind(), %error, "Trace request failed");
    }

    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", render(&result, opts.pretty))?;
    Ok(result.is_ok())
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum LogColor {
    #[default]
    Auto,
    Always,
    Never,
}

impl Display for LogColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogColor::Auto => write!(f, "auto"),
            LogColor::Always => write!(f, "always"),
            LogColor::Never => write!(f, "never"),
        }
    }
}

impl FromStr for LogColor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(LogColor::Auto),
            "always" => Ok(LogColor::Always),
            "never" => Ok(LogColor::Never),
            _ => Err(format!(
                "Invalid log color '{s}'. Expected: auto, always, or never"
            )),
        }
    }
}
