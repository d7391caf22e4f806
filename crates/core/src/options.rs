//! Per-call and process-wide option types.
//!
//! Option values are classified once, when the caller hands them over, into
//! a bare flag, a scalar or a sequence. Formatting into command tokens never
//! has to inspect types again.

use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// Keyword names that steer a call and never become `--name` flags.
pub const RESERVED_KEYWORDS: &[&str] = &[
    "options",
    "input",
    "force",
    "output",
    "env",
    "returnCdf",
    "returnArray",
    "returnMaArray",
    "operatorPrintsOut",
];

// ---------------------------------------------------------------------------
// Option values
// ---------------------------------------------------------------------------

/// Value of a synthesized `--name` option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    /// `true` emits a bare `--name`, `false` emits nothing.
    Flag(bool),
    /// Emits `--name=value`.
    Scalar(String),
    /// Emits `--name=v1,v2,...`.
    Sequence(Vec<String>),
}

impl OptionValue {
    /// Build a [`OptionValue::Sequence`] from anything displayable.
    pub fn sequence<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: ToString,
    {
        Self::Sequence(items.into_iter().map(|item| item.to_string()).collect())
    }

    /// Format as a command token for option `name`, or `None` for a false flag.
    pub fn to_token(&self, name: &str) -> Option<String> {
        match self {
            Self::Flag(true) => Some(format!("--{name}")),
            Self::Flag(false) => None,
            Self::Scalar(value) => Some(format!("--{name}={value}")),
            Self::Sequence(values) => Some(format!("--{name}={}", values.join(","))),
        }
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        Self::Scalar(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        Self::Scalar(value)
    }
}

macro_rules! scalar_from_integer {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for OptionValue {
                fn from(value: $ty) -> Self {
                    Self::Scalar(value.to_string())
                }
            }
        )*
    };
}

scalar_from_integer!(i32, i64, u32, u64, usize);

impl From<f64> for OptionValue {
    // Debug keeps the decimal point on whole numbers (`1.0`, not `1`).
    fn from(value: f64) -> Self {
        Self::Scalar(format!("{value:?}"))
    }
}

impl From<Vec<String>> for OptionValue {
    fn from(values: Vec<String>) -> Self {
        Self::Sequence(values)
    }
}

impl From<Vec<&str>> for OptionValue {
    fn from(values: Vec<&str>) -> Self {
        Self::sequence(values)
    }
}

impl<const N: usize> From<[&str; N]> for OptionValue {
    fn from(values: [&str; N]) -> Self {
        Self::sequence(values)
    }
}

// ---------------------------------------------------------------------------
// Ordered option map
// ---------------------------------------------------------------------------

/// Insertion-ordered mapping of option name to value.
///
/// Re-inserting an existing name replaces its value in place, keeping the
/// original position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionMap {
    entries: Vec<(String, OptionValue)>,
}

impl OptionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<OptionValue>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&OptionValue> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for OptionMap
where
    K: Into<String>,
    V: Into<OptionValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (name, value) in iter {
            map.insert(name, value);
        }
        map
    }
}

// ---------------------------------------------------------------------------
// Free-form options and paths
// ---------------------------------------------------------------------------

/// Free-form options passed straight through to the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawOptions {
    /// Split on whitespace into tokens.
    Line(String),
    /// Pre-formed tokens, appended as-is.
    Tokens(Vec<String>),
}

impl RawOptions {
    pub fn tokens(&self) -> Vec<String> {
        match self {
            Self::Line(line) => line.split_whitespace().map(str::to_string).collect(),
            Self::Tokens(tokens) => tokens.clone(),
        }
    }
}

impl From<&str> for RawOptions {
    fn from(line: &str) -> Self {
        Self::Line(line.to_string())
    }
}

impl From<String> for RawOptions {
    fn from(line: String) -> Self {
        Self::Line(line)
    }
}

impl From<Vec<String>> for RawOptions {
    fn from(tokens: Vec<String>) -> Self {
        Self::Tokens(tokens)
    }
}

impl From<Vec<&str>> for RawOptions {
    fn from(tokens: Vec<&str>) -> Self {
        Self::Tokens(tokens.into_iter().map(str::to_string).collect())
    }
}

/// One path or an ordered list of paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathArg {
    One(String),
    Many(Vec<String>),
}

impl PathArg {
    /// Paths as command tokens, in order. Empty strings are dropped.
    pub fn tokens(&self) -> Vec<String> {
        match self {
            Self::One(path) if path.is_empty() => Vec::new(),
            Self::One(path) => vec![path.clone()],
            Self::Many(paths) => paths.clone(),
        }
    }
}

impl From<&str> for PathArg {
    fn from(path: &str) -> Self {
        Self::One(path.to_string())
    }
}

impl From<String> for PathArg {
    fn from(path: String) -> Self {
        Self::One(path)
    }
}

impl From<&std::path::Path> for PathArg {
    fn from(path: &std::path::Path) -> Self {
        Self::One(path.to_string_lossy().into_owned())
    }
}

impl From<std::path::PathBuf> for PathArg {
    fn from(path: std::path::PathBuf) -> Self {
        Self::One(path.to_string_lossy().into_owned())
    }
}

impl From<Vec<String>> for PathArg {
    fn from(paths: Vec<String>) -> Self {
        Self::Many(paths)
    }
}

impl From<Vec<&str>> for PathArg {
    fn from(paths: Vec<&str>) -> Self {
        Self::Many(paths.into_iter().map(str::to_string).collect())
    }
}

// ---------------------------------------------------------------------------
// Debug level
// ---------------------------------------------------------------------------

/// Operator verbosity, forwarded as `-D <level>`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DebugLevel {
    #[default]
    Off,
    /// Boolean `true`: maps to level 10.
    Verbose,
    Level(u32),
}

impl DebugLevel {
    /// Level used when debug is switched on without a number.
    pub const VERBOSE_LEVEL: u32 = 10;

    pub fn is_enabled(self) -> bool {
        self.level().is_some()
    }

    pub fn level(self) -> Option<u32> {
        match self {
            Self::Off | Self::Level(0) => None,
            Self::Verbose => Some(Self::VERBOSE_LEVEL),
            Self::Level(level) => Some(level),
        }
    }

    /// `["-D", "<level>"]`, or nothing when debug is off.
    pub fn tokens(self) -> Vec<String> {
        self.level()
            .map(|level| vec!["-D".to_string(), level.to_string()])
            .unwrap_or_default()
    }
}

impl From<bool> for DebugLevel {
    fn from(enabled: bool) -> Self {
        if enabled {
            Self::Verbose
        } else {
            Self::Off
        }
    }
}

impl From<u32> for DebugLevel {
    fn from(level: u32) -> Self {
        Self::Level(level)
    }
}

impl FromStr for DebugLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "false" | "off" => Ok(Self::Off),
            "true" | "on" => Ok(Self::Verbose),
            other => other
                .parse::<u32>()
                .map(Self::Level)
                .map_err(|_| ConfigError::InvalidDebugLevel(s.to_string())),
        }
    }
}

impl fmt::Display for DebugLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.level() {
            Some(level) => write!(f, "{level}"),
            None => f.write_str("off"),
        }
    }
}

// ---------------------------------------------------------------------------
// Call options
// ---------------------------------------------------------------------------

/// Everything a single operator call accepts.
///
/// Built fresh for each call. `extra` options become `--name` flags; the
/// other fields steer the call itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallOptions {
    pub options: Option<RawOptions>,
    pub input: Option<PathArg>,
    pub output: Option<PathArg>,
    /// Overrides the configured force-output policy for this call.
    pub force: Option<bool>,
    /// Replaces the child's environment when set.
    pub env: Option<Vec<(String, String)>>,
    pub return_cdf: bool,
    /// Variable to load as a plain array.
    pub return_array: Option<String>,
    /// Variable to load as a masked array.
    pub return_ma_array: Option<String>,
    pub operator_prints_out: bool,
    pub extra: OptionMap,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input(mut self, input: impl Into<PathArg>) -> Self {
        self.input = Some(input.into());
        self
    }

    pub fn output(mut self, output: impl Into<PathArg>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn options(mut self, options: impl Into<RawOptions>) -> Self {
        self.options = Some(options.into());
        self
    }

    pub fn force(mut self, force: bool) -> Self {
        self.force = Some(force);
        self
    }

    pub fn env<K, V>(mut self, vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.env = Some(
            vars.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        );
        self
    }

    pub fn return_cdf(mut self) -> Self {
        self.return_cdf = true;
        self
    }

    pub fn return_array(mut self, variable: impl Into<String>) -> Self {
        self.return_array = Some(variable.into());
        self
    }

    pub fn return_ma_array(mut self, variable: impl Into<String>) -> Self {
        self.return_ma_array = Some(variable.into());
        self
    }

    pub fn prints_out(mut self) -> Self {
        self.operator_prints_out = true;
        self
    }

    /// Add a synthesized `--name` option.
    pub fn option(mut self, name: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.extra.insert(name, value);
        self
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
