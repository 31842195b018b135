use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, crate_version};
use miette::miette;
use templar_core::{EvalRequest, Source};

use crate::log::LogFormat;

#[derive(Parser)]
#[command(
    name = "templar",
    color = clap::ColorChoice::Auto,
    // -V is taken by --ext-str, so --version is handled by hand
    disable_version_flag = true,
    about = format!("templar {}: render parameterized JSON configuration documents", crate_version!())
)]
pub struct Cli {
    #[arg(
        value_name = "FILENAME",
        required_unless_present = "version",
        help = "Template to render, or '-' to read it from stdin"
    )]
    pub filename: Option<String>,

    #[arg(
        short = 'o',
        long = "output",
        value_name = "DEST",
        help = "Deliver the document to a file path or POST it to an http(s) URL. Repeatable."
    )]
    pub output: Vec<String>,

    #[arg(long, help = "Also write the document to stdout when --output is given.")]
    pub tee: bool,

    #[arg(
        short = 'V',
        long = "ext-str",
        value_name = "NAME=VALUE",
        value_parser = parse_binding,
        help = "Bind an external string variable. Repeatable."
    )]
    pub ext_str: Vec<(String, String)>,

    #[arg(
        long = "ext-code",
        value_name = "NAME=EXPR",
        value_parser = parse_binding,
        help = "Bind an external code variable. Repeatable."
    )]
    pub ext_code: Vec<(String, String)>,

    #[arg(
        long,
        value_name = "DURATION",
        value_parser = humantime::parse_duration,
        help = "Reuse a cached document no older than this, e.g. '5m' or '1h 30m'."
    )]
    pub cache: Option<Duration>,

    #[arg(
        long,
        value_name = "DURATION",
        requires = "cache",
        value_parser = humantime::parse_duration,
        help = "After the cache window, keep serving the stale document this much longer if evaluation fails."
    )]
    pub stale: Option<Duration>,

    #[arg(
        short = 't',
        long,
        value_name = "DURATION",
        value_parser = humantime::parse_duration,
        help = "Give up on the whole run after this long."
    )]
    pub timeout: Option<Duration>,

    #[arg(
        long,
        help = "Leave file destinations untouched when the document has not changed."
    )]
    pub write_if_changed: bool,

    #[command(flatten)]
    pub global_options: GlobalOptions,
}

#[derive(Clone, Debug, Parser)]
pub struct GlobalOptions {
    #[arg(
        long,
        global = true,
        help = "Print version information",
        long_help = "Print version information and exit"
    )]
    pub version: bool,

    #[arg(short, long, global = true, help = "Enable additional debug logs.")]
    pub verbose: bool,

    #[arg(
        short,
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Silence all logs"
    )]
    pub quiet: bool,

    #[arg(
        long,
        global = true,
        help = "Configure the output format of the logs.",
        default_value_t,
        value_enum
    )]
    pub log_format: LogFormat,
}

impl Cli {
    /// Turns the parsed flags into a rendering request.
    pub fn to_request(&self) -> miette::Result<EvalRequest> {
        let filename = self
            .filename
            .as_deref()
            .ok_or_else(|| miette!("no template file given"))?;
        let source = if filename == "-" {
            Source::Stdin
        } else {
            Source::File(PathBuf::from(filename))
        };

        let mut request = EvalRequest::new(source);
        for (name, value) in &self.ext_str {
            request.ext_str.insert(name.clone(), value.clone());
        }
        for (name, expr) in &self.ext_code {
            request.ext_code.insert(name.clone(), expr.clone());
        }
        request.timeout = self.timeout;
        request.cache_ttl = self.cache;
        request.stale_extension = self.stale;
        request.destinations = self.output.clone();
        request.also_stdout = self.tee;
        request.write_if_changed = self.write_if_changed;
        Ok(request)
    }
}

fn parse_binding(value: &str) -> Result<(String, String), String> {
    match value.split_once('=') {
        Some((name, binding)) if !name.is_empty() => {
            Ok((name.to_string(), binding.to_string()))
        }
        _ => Err(format!("expected NAME=VALUE, got '{value}'")),
    }
}
