//! Command-line surface for the operator facade.
//!
//! `ncopy run <operator> <inputs...>` maps its flags onto a single
//! [`CallOptions`] and prints the result as text or JSON.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use ncopy_core::config::NCO_PATH_ENV;
use ncopy_core::{
    CallOptions, DebugLevel, ExecutionMode, MaskedArray, Nco, NcoConfig, NcoOutput, OptionValue,
};

#[derive(Debug, Parser)]
#[command(name = "ncopy", version, about = "Run NCO operators from a single entry point")]
pub struct Cli {
    /// Directory holding the operator executables (overrides `NCOpath`).
    #[arg(long, global = true, value_name = "DIR")]
    pub nco_path: Option<PathBuf>,

    /// Operator debug level: `true`, `false` or an integer.
    #[arg(long, global = true, value_name = "LEVEL")]
    pub debug: Option<DebugLevel>,

    /// `shell` or `argv`.
    #[arg(long, global = true, value_name = "MODE")]
    pub execution_mode: Option<ExecutionMode>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run one operator.
    Run(RunArgs),
    /// Print the installed NCO version.
    Version,
    /// List the supported operators.
    Operators,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Operator name, e.g. `ncks`.
    pub operator: String,

    /// Input files.
    pub inputs: Vec<String>,

    /// Output file; a temporary file is used when omitted.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Raw option string placed right after the program name.
    #[arg(long, allow_hyphen_values = true)]
    pub options: Option<String>,

    /// Named option, `NAME` for a flag or `NAME=VALUE` (commas make a list).
    #[arg(long = "opt", value_name = "NAME[=VALUE]", value_parser = parse_named_option)]
    pub named: Vec<(String, OptionValue)>,

    /// Environment entry replacing the operator's environment.
    #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_env_entry)]
    pub env: Vec<(String, String)>,

    /// Return stdout lines instead of an output file.
    #[arg(long)]
    pub print: bool,

    /// Never run the operator; reuse the named output.
    #[arg(long)]
    pub no_force: bool,

    /// Report a failed run as an empty result instead of an error.
    #[arg(long)]
    pub return_none_on_error: bool,

    /// Read this variable from the output as an array.
    #[arg(long, value_name = "VAR", conflicts_with = "masked_array")]
    pub array: Option<String>,

    /// Read this variable as an array masked at its fill value.
    #[arg(long, value_name = "VAR")]
    pub masked_array: Option<String>,

    /// Open the output as a dataset and list its variables.
    #[arg(long)]
    pub dataset: bool,

    /// Print the result as JSON.
    #[arg(long)]
    pub json: bool,
}

impl RunArgs {
    pub fn to_call_options(&self) -> CallOptions {
        let mut call = CallOptions::new().input(self.inputs.clone());
        if let Some(output) = &self.output {
            call = call.output(output.as_path());
        }
        if let Some(options) = &self.options {
            call = call.options(options.as_str());
        }
        for (name, value) in &self.named {
            call = call.option(name.as_str(), value.clone());
        }
        if !self.env.is_empty() {
            call = call.env(self.env.iter().cloned());
        }
        if self.print {
            call = call.prints_out();
        }
        if self.no_force {
            call = call.force(false);
        }
        if let Some(variable) = &self.array {
            call = call.return_array(variable.as_str());
        }
        if let Some(variable) = &self.masked_array {
            call = call.return_ma_array(variable.as_str());
        }
        if self.dataset {
            call = call.return_cdf();
        }
        call
    }
}

/// Printable result of one `run`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Report {
    Lines { lines: Vec<String> },
    Path { path: PathBuf },
    Dataset { path: PathBuf, variables: Vec<String> },
    /// Masked elements are `null`.
    Array { shape: Vec<usize>, values: Vec<Option<f64>> },
    /// The operator failed and errors were configured to yield nothing.
    Empty,
}

impl Report {
    pub fn from_output(output: Option<NcoOutput>) -> Self {
        match output {
            None => Self::Empty,
            Some(NcoOutput::Lines(lines)) => Self::Lines { lines },
            Some(NcoOutput::Path(path)) => Self::Path { path },
            Some(NcoOutput::Dataset(dataset)) => Self::Dataset {
                path: dataset.path().to_path_buf(),
                variables: dataset.variable_names().to_vec(),
            },
            Some(NcoOutput::Array(values)) => Self::Array {
                shape: values.shape().to_vec(),
                values: values.iter().copied().map(Some).collect(),
            },
            Some(NcoOutput::MaskedArray(array)) => masked_report(&array),
        }
    }

    pub fn render(&self, json: bool) -> anyhow::Result<String> {
        if json {
            return Ok(serde_json::to_string_pretty(self)?);
        }
        Ok(match self {
            Self::Lines { lines } => lines.join("\n"),
            Self::Path { path } => path.display().to_string(),
            Self::Dataset { path, variables } => {
                format!("{}: {}", path.display(), variables.join(", "))
            }
            Self::Array { shape, values } => {
                let values: Vec<String> = values
                    .iter()
                    .map(|value| value.map_or_else(|| "--".to_string(), |v| v.to_string()))
                    .collect();
                format!("shape {shape:?}: [{}]", values.join(", "))
            }
            Self::Empty => String::new(),
        })
    }
}

fn masked_report(array: &MaskedArray) -> Report {
    Report::Array {
        shape: array.shape().to_vec(),
        values: array
            .data
            .iter()
            .zip(array.mask.iter())
            .map(|(value, masked)| (!masked).then_some(*value))
            .collect(),
    }
}

/// Default `EnvFilter` directive when `RUST_LOG` is unset.
///
/// Operator debugging (`--debug` or `NCO_DEBUG`) lowers it to `debug` so
/// the command line, environment and exit code of each call are shown.
pub fn default_log_directive(cli: &Cli) -> &'static str {
    let from_env = std::env::var("NCO_DEBUG")
        .ok()
        .and_then(|value| value.parse::<DebugLevel>().ok());
    log_directive(cli.debug.or(from_env))
}

fn log_directive(debug: Option<DebugLevel>) -> &'static str {
    if debug.is_some_and(DebugLevel::is_enabled) {
        "ncopy_core=debug,ncopy_cli=debug"
    } else {
        "ncopy_core=info,ncopy_cli=info"
    }
}

/// Configuration from the environment, with command-line overrides.
pub fn load_config(cli: &Cli) -> anyhow::Result<NcoConfig> {
    let nco_path = cli.nco_path.clone();
    let mut config = NcoConfig::from_lookup(|key| match (key, &nco_path) {
        (NCO_PATH_ENV, Some(path)) => Some(path.to_string_lossy().into_owned()),
        _ => std::env::var(key).ok(),
    })?;

    if let Some(debug) = cli.debug {
        config.debug = debug;
    }
    if let Some(mode) = cli.execution_mode {
        config.execution_mode = mode;
    }
    if let Command::Run(args) = &cli.command {
        if args.return_none_on_error {
            config.return_none_on_error = true;
        }
        // A printed temp path must still exist after this process exits.
        config.persist_temp_files |= args.array.is_none() && args.masked_array.is_none();
    }
    Ok(config)
}

/// Run the parsed command, writing its result to stdout.
pub async fn execute(cli: Cli) -> anyhow::Result<()> {
    if let Command::Operators = cli.command {
        println!("{}", Nco::operators().join("\n"));
        return Ok(());
    }

    let nco = Nco::new(load_config(&cli)?);
    match &cli.command {
        Command::Run(args) => {
            tracing::debug!(operator = %args.operator, inputs = ?args.inputs, "Running operator");
            let output = nco.call(&args.operator, args.to_call_options()).await?;
            let rendered = Report::from_output(output).render(args.json)?;
            if !rendered.is_empty() {
                println!("{rendered}");
            }
        }
        Command::Version => {
            println!("{}", nco.version().await?);
        }
        Command::Operators => {}
    }
    Ok(())
}

fn parse_named_option(raw: &str) -> Result<(String, OptionValue), String> {
    let (name, value) = match raw.split_once('=') {
        None => (raw, OptionValue::Flag(true)),
        Some((name, value)) if value.contains(',') => {
            (name, OptionValue::sequence(value.split(',')))
        }
        Some((name, value)) => (name, OptionValue::from(value)),
    };
    if name.is_empty() {
        return Err(format!("option name missing in `{raw}`"));
    }
    Ok((name.to_string(), value))
}

fn parse_env_entry(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got `{raw}`")),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
