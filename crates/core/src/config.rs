//! Facade configuration.

use std::path::{Path, PathBuf};

use crate::array::ArrayBackend;
use crate::error::ConfigError;
use crate::options::{DebugLevel, OptionMap, OptionValue};
use crate::process::ExecutionMode;

/// Environment variable naming the operator directory explicitly.
pub const NCO_PATH_ENV: &str = "NCOpath";

/// Operator searched for on `PATH` to locate the operator directory.
pub const DISCOVERY_PROGRAM: &str = "ncks";

/// Settings shared by every call made through one [`Nco`](crate::Nco).
#[derive(Debug, Clone)]
pub struct NcoConfig {
    /// Directory holding the operator executables.
    pub nco_path: PathBuf,
    /// Return an open dataset instead of a path for file-mode calls.
    pub return_cdf: bool,
    /// Turn execution failures into an empty result at the dispatcher
    /// boundary.
    pub return_none_on_error: bool,
    /// Run the operator when the output file does not exist yet.
    pub force_output: bool,
    pub cdf_backend: ArrayBackend,
    pub debug: DebugLevel,
    pub execution_mode: ExecutionMode,
    /// Keep temporary outputs after cleanup.
    pub persist_temp_files: bool,
    /// Directory for temporary outputs (system temp dir if `None`).
    pub temp_dir: Option<PathBuf>,
    /// Options appended to every call, after the per-call ones. Every
    /// entry is emitted, including names reserved for per-call keywords.
    pub defaults: OptionMap,
}

impl NcoConfig {
    /// Configuration with defaults and an explicit operator directory.
    pub fn new(nco_path: impl Into<PathBuf>) -> Self {
        Self {
            nco_path: nco_path.into(),
            return_cdf: false,
            return_none_on_error: false,
            force_output: true,
            cdf_backend: ArrayBackend::default(),
            debug: DebugLevel::Off,
            execution_mode: ExecutionMode::default(),
            persist_temp_files: false,
            temp_dir: None,
            defaults: OptionMap::new(),
        }
    }

    /// Defaults with the operator directory located from the process
    /// environment.
    pub fn discover() -> Result<Self, ConfigError> {
        Ok(Self::new(locate_nco_path(|key| std::env::var(key).ok())?))
    }

    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default                        |
    /// |----------------------------|--------------------------------|
    /// | `NCOpath`                  | directory of `ncks` on `PATH`  |
    /// | `NCO_DEBUG`                | `off` (`true`, `false` or int) |
    /// | `NCO_FORCE_OUTPUT`         | `true`                         |
    /// | `NCO_RETURN_NONE_ON_ERROR` | `false`                        |
    /// | `NCO_RETURN_CDF`           | `false`                        |
    /// | `NCO_CDF_BACKEND`          | `classic`                      |
    /// | `NCO_EXECUTION_MODE`       | `shell` (`shell` or `argv`)    |
    /// | `NCO_PERSIST_TEMP_FILES`   | `false`                        |
    /// | `NCO_TEMP_DIR`             | system temp directory          |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// [`NcoConfig::from_env`] over an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::new(locate_nco_path(&lookup)?);

        if let Some(value) = lookup("NCO_DEBUG") {
            config.debug = value.parse()?;
        }
        if let Some(value) = lookup("NCO_FORCE_OUTPUT") {
            config.force_output = parse_bool("NCO_FORCE_OUTPUT", &value)?;
        }
        if let Some(value) = lookup("NCO_RETURN_NONE_ON_ERROR") {
            config.return_none_on_error = parse_bool("NCO_RETURN_NONE_ON_ERROR", &value)?;
        }
        if let Some(value) = lookup("NCO_RETURN_CDF") {
            config.return_cdf = parse_bool("NCO_RETURN_CDF", &value)?;
        }
        if let Some(value) = lookup("NCO_CDF_BACKEND") {
            config.cdf_backend = value.parse()?;
        }
        if let Some(value) = lookup("NCO_EXECUTION_MODE") {
            config.execution_mode = value.parse()?;
        }
        if let Some(value) = lookup("NCO_PERSIST_TEMP_FILES") {
            config.persist_temp_files = parse_bool("NCO_PERSIST_TEMP_FILES", &value)?;
        }
        config.temp_dir = lookup("NCO_TEMP_DIR")
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from);

        Ok(config)
    }

    pub fn with_debug(mut self, debug: impl Into<DebugLevel>) -> Self {
        self.debug = debug.into();
        self
    }

    pub fn with_return_none_on_error(mut self, enabled: bool) -> Self {
        self.return_none_on_error = enabled;
        self
    }

    pub fn with_return_cdf(mut self, enabled: bool) -> Self {
        self.return_cdf = enabled;
        self
    }

    pub fn with_force_output(mut self, enabled: bool) -> Self {
        self.force_output = enabled;
        self
    }

    pub fn with_cdf_backend(mut self, backend: ArrayBackend) -> Self {
        self.cdf_backend = backend;
        self
    }

    pub fn with_execution_mode(mut self, mode: ExecutionMode) -> Self {
        self.execution_mode = mode;
        self
    }

    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    pub fn with_persist_temp_files(mut self, enabled: bool) -> Self {
        self.persist_temp_files = enabled;
        self
    }

    /// Add a process-wide default option.
    pub fn with_default(mut self, name: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.defaults.insert(name, value);
        self
    }
}

/// Operator directory: `NCOpath` if set, otherwise the directory holding
/// `ncks` on `PATH`.
pub fn locate_nco_path<F>(lookup: F) -> Result<PathBuf, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = lookup(NCO_PATH_ENV).filter(|path| !path.is_empty()) {
        return Ok(PathBuf::from(path));
    }

    let search_path = lookup("PATH").unwrap_or_default();
    which_in(DISCOVERY_PROGRAM, &search_path)
        .and_then(|program| program.parent().map(Path::to_path_buf))
        .ok_or(ConfigError::NcoNotFound)
}

/// First executable named `program` in the `PATH`-style list `search_path`.
pub fn which_in(program: &str, search_path: &str) -> Option<PathBuf> {
    std::env::split_paths(search_path)
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
}

/// Whether `path` exists and carries an execute permission bit.
pub fn is_executable(path: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::metadata(path)
            .map(|meta| meta.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
    }
    #[cfg(not(unix))]
    {
        path.exists()
    }
}

fn parse_bool(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            var,
            value: value.to_string(),
        }),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
