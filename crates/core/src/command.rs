//! Operator command-line synthesis.
//!
//! Token order is significant to the operators' own argument parsing:
//!
//! 1. executable (`<root>/<operator>`)
//! 2. free-form `options`
//! 3. `-D <level>` when debug is on
//! 4. per-call `--name` options, in call order
//! 5. process-wide default options
//! 6. input path(s)
//!
//! The output path, when one is needed, is appended later by the dispatcher.

use std::fmt;
use std::path::Path;

use crate::error::ConfigError;
use crate::operator::{is_print_flag, Operator};
use crate::options::{CallOptions, DebugLevel, OptionMap, RESERVED_KEYWORDS};

/// Ordered command tokens, starting with the executable path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    tokens: Vec<String>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            tokens: vec![program.into()],
        }
    }

    pub fn push(&mut self, token: impl Into<String>) {
        self.tokens.push(token.into());
    }

    pub fn extend<I, T>(&mut self, tokens: I)
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tokens.extend(tokens.into_iter().map(Into::into));
    }

    pub fn program(&self) -> &str {
        &self.tokens[0]
    }

    /// Tokens after the executable.
    pub fn args(&self) -> &[String] {
        &self.tokens[1..]
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Space-joined form handed to the shell.
    pub fn joined(&self) -> String {
        self.tokens.join(" ")
    }

    /// Whether any token is an exact print flag.
    pub fn contains_print_flag(&self) -> bool {
        self.tokens.iter().any(|token| is_print_flag(token))
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.joined())
    }
}

/// Build the command line for one operator call.
///
/// Fails with [`ConfigError::MissingInput`] when the call has no input; no
/// process is involved at this stage.
pub fn build(
    nco_path: &Path,
    operator: Operator,
    call: &CallOptions,
    defaults: &OptionMap,
    debug: DebugLevel,
) -> Result<CommandLine, ConfigError> {
    let program = nco_path.join(operator.name());
    let mut command = CommandLine::new(program.to_string_lossy());

    if let Some(options) = &call.options {
        command.extend(options.tokens());
    }

    command.extend(debug.tokens());

    push_options(&mut command, &call.extra, RESERVED_KEYWORDS);
    push_options(&mut command, defaults, &[]);

    let inputs = call
        .input
        .as_ref()
        .map(|input| input.tokens())
        .unwrap_or_default();
    if inputs.is_empty() {
        return Err(ConfigError::MissingInput);
    }
    command.extend(inputs);

    Ok(command)
}

/// Per-call keywords skip `reserved`; process-wide defaults are all emitted.
fn push_options(command: &mut CommandLine, options: &OptionMap, reserved: &[&str]) {
    for (name, value) in options.iter() {
        if reserved.contains(&name) {
            continue;
        }
        if let Some(token) = value.to_token(name) {
            command.push(token);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
