//! Operator dispatch facade.
//!
//! [`Nco`] resolves an operator name to a cached [`BoundOperator`], which
//! builds the command line, picks print or file mode, runs the process and
//! interprets the result:
//!
//! 1. Resolve the name against the fixed operator set.
//! 2. Build the command (see [`crate::command`]).
//! 3. Print mode (print flag, `ncdump`, or requested): stdout lines.
//! 4. File mode: run unless an existing output can be reused, then return
//!    an array, masked array, dataset or the output path.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use ndarray::ArrayD;

use crate::array::{self, ArrayBackend, ArrayError, ArrayFileReader, Dataset, MaskedArray};
use crate::command::{self, CommandLine};
use crate::config::{is_executable, NcoConfig};
use crate::error::{ConfigError, NcoError};
use crate::operator::Operator;
use crate::options::{CallOptions, DebugLevel, PathArg};
use crate::process::{ExecutionResult, ProcessRunner, SubprocessRunner};
use crate::temp_files::TempFileRegistry;
use crate::version;

/// Result of one operator call.
#[derive(Debug)]
pub enum NcoOutput {
    /// Print mode: stdout lines, whitespace-stripped.
    Lines(Vec<String>),
    /// File mode: path of the output file.
    Path(PathBuf),
    Dataset(Box<dyn Dataset>),
    Array(ArrayD<f64>),
    MaskedArray(MaskedArray),
}

impl NcoOutput {
    pub fn into_lines(self) -> Option<Vec<String>> {
        match self {
            Self::Lines(lines) => Some(lines),
            _ => None,
        }
    }

    pub fn into_path(self) -> Option<PathBuf> {
        match self {
            Self::Path(path) => Some(path),
            _ => None,
        }
    }

    pub fn into_dataset(self) -> Option<Box<dyn Dataset>> {
        match self {
            Self::Dataset(dataset) => Some(dataset),
            _ => None,
        }
    }

    pub fn into_array(self) -> Option<ArrayD<f64>> {
        match self {
            Self::Array(array) => Some(array),
            _ => None,
        }
    }

    pub fn into_masked_array(self) -> Option<MaskedArray> {
        match self {
            Self::MaskedArray(array) => Some(array),
            _ => None,
        }
    }
}

/// State shared between a dispatcher and its bound operators.
struct Context {
    config: RwLock<NcoConfig>,
    runner: Arc<dyn ProcessRunner>,
    temp_files: TempFileRegistry,
    reader: Mutex<Option<Arc<dyn ArrayFileReader>>>,
}

impl Context {
    fn config(&self) -> NcoConfig {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn update_config(&self, update: impl FnOnce(&mut NcoConfig)) {
        update(&mut self.config.write().unwrap_or_else(PoisonError::into_inner));
    }

    /// Array reader, loaded on first use.
    fn reader(&self, backend: ArrayBackend) -> Result<Arc<dyn ArrayFileReader>, ArrayError> {
        let mut slot = self.reader.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(reader) = slot.as_ref() {
            return Ok(Arc::clone(reader));
        }
        let reader = array::reader_for(backend)?;
        *slot = Some(Arc::clone(&reader));
        Ok(reader)
    }

    /// Run `command` once and classify the exit status.
    async fn execute(
        &self,
        operator: Operator,
        command: &CommandLine,
        env: Option<&[(String, String)]>,
        debug: DebugLevel,
    ) -> Result<ExecutionResult, NcoError> {
        if debug.is_enabled() {
            for (key, value) in env.unwrap_or_default() {
                tracing::debug!(key = %key, value = %value, "Operator environment");
            }
            tracing::debug!(operator = %operator, command = %command, "Calling operator");
        }

        let result = self
            .runner
            .run(command, env)
            .await
            .map_err(NcoError::Spawn)?;

        if debug.is_enabled() {
            tracing::debug!(operator = %operator, exit_code = result.exit_code, "Operator returned");
        }

        if !result.success() {
            tracing::error!(
                operator = %operator,
                command = %command,
                exit_code = result.exit_code,
                stderr = %result.stderr.trim(),
                "Error in calling operator",
            );
            return Err(NcoError::ExecutionFailed {
                stdout: result.stdout,
                stderr: result.stderr,
                exit_code: result.exit_code,
            });
        }

        Ok(result)
    }
}

/// Handler for one operator, bound to the dispatcher that created it.
pub struct BoundOperator {
    operator: Operator,
    ctx: Arc<Context>,
}

impl fmt::Debug for BoundOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundOperator")
            .field("operator", &self.operator)
            .finish_non_exhaustive()
    }
}

impl BoundOperator {
    pub fn operator(&self) -> Operator {
        self.operator
    }

    /// Run the operator once.
    ///
    /// Execution failures are always returned as errors here; the
    /// return-none-on-error policy is applied by [`Nco::call`].
    pub async fn call(&self, call: CallOptions) -> Result<NcoOutput, NcoError> {
        let config = self.ctx.config();
        let mut command = command::build(
            &config.nco_path,
            self.operator,
            &call,
            &config.defaults,
            config.debug,
        )?;
        let env = call.env.as_deref();

        let prints_out = call.operator_prints_out
            || self.operator.always_prints()
            || command.contains_print_flag();
        if prints_out {
            let result = self
                .ctx
                .execute(self.operator, &command, env, config.debug)
                .await?;
            return Ok(NcoOutput::Lines(stdout_lines(&result.stdout)));
        }

        let force = call.force.unwrap_or(config.force_output);
        let output = match requested_output(call.output.as_ref())? {
            Some(path) if !force || path.is_file() => {
                if config.debug.is_enabled() {
                    tracing::debug!(path = %path.display(), "Use existing file");
                }
                path
            }
            None if !force => return Err(ConfigError::MissingOutput.into()),
            requested => {
                let path = match requested {
                    Some(path) => path,
                    None => self
                        .ctx
                        .temp_files
                        .issue_path()
                        .map_err(NcoError::TempFile)?,
                };
                command.push(path.to_string_lossy());
                self.ctx
                    .execute(self.operator, &command, env, config.debug)
                    .await?;
                path
            }
        };

        self.interpret(output, &call, &config)
    }

    fn interpret(
        &self,
        output: PathBuf,
        call: &CallOptions,
        config: &NcoConfig,
    ) -> Result<NcoOutput, NcoError> {
        if let Some(variable) = &call.return_array {
            let reader = self.ctx.reader(config.cdf_backend)?;
            return Ok(NcoOutput::Array(reader.read_array(&output, variable)?));
        }
        if let Some(variable) = &call.return_ma_array {
            let reader = self.ctx.reader(config.cdf_backend)?;
            return Ok(NcoOutput::MaskedArray(
                reader.read_masked_array(&output, variable)?,
            ));
        }
        if config.return_cdf || call.return_cdf {
            let reader = self.ctx.reader(config.cdf_backend)?;
            return Ok(NcoOutput::Dataset(reader.open(&output)?));
        }
        Ok(NcoOutput::Path(output))
    }
}

/// The operator facade.
///
/// Bound operators are created on first use and cached per instance.
/// Temporary outputs live until [`Nco::cleanup`] or until the last clone of
/// a handler from this dispatcher is dropped.
pub struct Nco {
    ctx: Arc<Context>,
    handlers: Mutex<HashMap<Operator, Arc<BoundOperator>>>,
}

impl fmt::Debug for Nco {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Nco")
            .field("config", &self.ctx.config())
            .field("cached", &self.cached_operators())
            .finish_non_exhaustive()
    }
}

impl Nco {
    /// Dispatcher running operators as real subprocesses.
    pub fn new(config: NcoConfig) -> Self {
        let runner = Arc::new(SubprocessRunner::new(config.execution_mode));
        Self::with_runner(config, runner)
    }

    /// Dispatcher configured from the environment (see
    /// [`NcoConfig::from_env`]).
    pub fn from_env() -> Result<Self, NcoError> {
        Ok(Self::new(NcoConfig::from_env()?))
    }

    pub fn with_runner(config: NcoConfig, runner: Arc<dyn ProcessRunner>) -> Self {
        let temp_files = match &config.temp_dir {
            Some(dir) => TempFileRegistry::in_dir(dir),
            None => TempFileRegistry::new(),
        };
        temp_files.set_persist(config.persist_temp_files);

        Self {
            ctx: Arc::new(Context {
                config: RwLock::new(config),
                runner,
                temp_files,
                reader: Mutex::new(None),
            }),
            handlers: Mutex::new(HashMap::new()),
        }
    }

    /// Use `reader` for arrays and datasets instead of a built-in backend.
    pub fn with_reader(self, reader: Arc<dyn ArrayFileReader>) -> Self {
        *self.ctx.reader.lock().unwrap_or_else(PoisonError::into_inner) = Some(reader);
        self
    }

    /// Resolve `name` to its bound handler, creating it on first use.
    pub fn operator(&self, name: &str) -> Result<Arc<BoundOperator>, NcoError> {
        let operator = name.parse::<Operator>().inspect_err(|_| {
            tracing::warn!(name, "Cannot find method");
        })?;

        let mut handlers = self.handlers.lock().unwrap_or_else(PoisonError::into_inner);
        let handler = handlers.entry(operator).or_insert_with(|| {
            if self.ctx.config().debug.is_enabled() {
                tracing::debug!(operator = %operator, "Found method");
            }
            Arc::new(BoundOperator {
                operator,
                ctx: Arc::clone(&self.ctx),
            })
        });
        Ok(Arc::clone(handler))
    }

    /// Run operator `name`.
    ///
    /// When return-none-on-error is enabled, a non-zero exit is logged and
    /// yields `Ok(None)`. Configuration and lookup errors always propagate.
    pub async fn call(&self, name: &str, call: CallOptions) -> Result<Option<NcoOutput>, NcoError> {
        let handler = self.operator(name)?;
        match handler.call(call).await {
            Ok(output) => Ok(Some(output)),
            Err(err) if err.is_execution_failure() && self.ctx.config().return_none_on_error => {
                tracing::warn!(operator = name, error = %err, "Operator failed; returning no result");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Names of every supported operator.
    pub fn operators() -> Vec<&'static str> {
        Operator::ALL.iter().map(|op| op.name()).collect()
    }

    /// Operators with a cached handler, sorted.
    pub fn cached_operators(&self) -> Vec<Operator> {
        let mut cached: Vec<_> = self
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect();
        cached.sort();
        cached
    }

    pub fn config(&self) -> NcoConfig {
        self.ctx.config()
    }

    pub fn nco_path(&self) -> PathBuf {
        self.ctx.config().nco_path
    }

    pub fn set_nco_path(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        self.ctx.update_config(|config| config.nco_path = path);
    }

    /// Whether the configured operator directory is an accessible directory.
    pub fn has_nco(&self) -> bool {
        Self::has_nco_at(&self.nco_path())
    }

    pub fn has_nco_at(path: &Path) -> bool {
        path.is_dir() && is_executable(path)
    }

    /// Toggle process-wide dataset mode for file-mode calls.
    pub fn set_return_cdf(&self, enabled: bool) {
        self.ctx.update_config(|config| config.return_cdf = enabled);
    }

    /// Version of the installed operators, from `ncra --version`.
    pub async fn version(&self) -> Result<String, NcoError> {
        let mut command = CommandLine::new(
            self.nco_path()
                .join(Operator::Ncra.name())
                .to_string_lossy(),
        );
        command.push("--version");

        let result = self
            .ctx
            .runner
            .run(&command, None)
            .await
            .map_err(NcoError::Spawn)?;

        version::parse_version(&result.stderr)
            .or_else(|| version::parse_version(&result.stdout))
            .ok_or_else(|| NcoError::UnrecognizedVersion(result.stderr.trim().to_string()))
    }

    pub fn module_version() -> &'static str {
        version::module_version()
    }

    /// Open `path` with the configured array backend.
    pub fn read_cdf(&self, path: &Path) -> Result<Box<dyn Dataset>, NcoError> {
        let reader = self.ctx.reader(self.ctx.config().cdf_backend)?;
        Ok(reader.open(path)?)
    }

    pub fn read_array(&self, path: &Path, variable: &str) -> Result<ArrayD<f64>, NcoError> {
        let reader = self.ctx.reader(self.ctx.config().cdf_backend)?;
        Ok(reader.read_array(path, variable)?)
    }

    pub fn read_ma_array(&self, path: &Path, variable: &str) -> Result<MaskedArray, NcoError> {
        let reader = self.ctx.reader(self.ctx.config().cdf_backend)?;
        Ok(reader.read_masked_array(path, variable)?)
    }

    pub fn temp_files(&self) -> &TempFileRegistry {
        &self.ctx.temp_files
    }

    /// Delete every temporary output issued so far.
    pub fn cleanup(&self) {
        self.ctx.temp_files.cleanup();
    }
}

macro_rules! operator_methods {
    ($($method:ident),* $(,)?) => {
        impl Nco {
            $(
                #[doc = concat!("Run `", stringify!($method), "`; see [`Nco::call`].")]
                pub async fn $method(
                    &self,
                    call: CallOptions,
                ) -> Result<Option<NcoOutput>, NcoError> {
                    self.call(stringify!($method), call).await
                }
            )*
        }
    };
}

operator_methods!(
    ncap2, ncatted, ncbo, nces, ncecat, ncflint, ncks, ncpdq, ncra, ncrcat, ncrename, ncwa, ncea,
    ncdump,
);

/// Split stdout into whitespace-stripped lines, without the empty entry the
/// final line terminator leaves behind.
fn stdout_lines(stdout: &str) -> Vec<String> {
    let mut lines: Vec<String> = stdout.split('\n').map(|line| line.trim().to_string()).collect();
    if lines.last().is_some_and(String::is_empty) {
        lines.pop();
    }
    lines
}

/// The single output path requested by the caller, if any.
fn requested_output(output: Option<&PathArg>) -> Result<Option<PathBuf>, ConfigError> {
    let mut paths = output.map(PathArg::tokens).unwrap_or_default();
    match paths.len() {
        0 => Ok(None),
        1 => Ok(paths.pop().map(PathBuf::from)),
        n => Err(ConfigError::MultipleOutputs(n)),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use ndarray::IxDyn;

    use super::*;
    use crate::array::VariableData;

    type Responder = Box<dyn Fn(&CommandLine) -> ExecutionResult + Send + Sync>;

    /// Records every command and answers with a scripted result.
    struct FakeRunner {
        calls: Mutex<Vec<(CommandLine, Option<Vec<(String, String)>>)>>,
        respond: Responder,
    }

    impl FakeRunner {
        fn new(respond: impl Fn(&CommandLine) -> ExecutionResult + Send + Sync + 'static) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                respond: Box::new(respond),
            })
        }

        /// Exits 0 and creates the last token when it is an absolute path.
        fn writing_output() -> Arc<Self> {
            Self::new(|command| {
                if let Some(last) = command.args().last().filter(|arg| arg.starts_with('/')) {
                    std::fs::write(last, "CDF").expect("write output");
                }
                ok("")
            })
        }

        fn calls(&self) -> Vec<CommandLine> {
            self.calls
                .lock()
                .expect("lock")
                .iter()
                .map(|(command, _)| command.clone())
                .collect()
        }

        fn call_count(&self) -> usize {
            self.calls.lock().expect("lock").len()
        }
    }

    #[async_trait]
    impl ProcessRunner for FakeRunner {
        async fn run(
            &self,
            command: &CommandLine,
            env: Option<&[(String, String)]>,
        ) -> std::io::Result<ExecutionResult> {
            self.calls
                .lock()
                .expect("lock")
                .push((command.clone(), env.map(<[_]>::to_vec)));
            Ok((self.respond)(command))
        }
    }

    fn ok(stdout: &str) -> ExecutionResult {
        ExecutionResult {
            stdout: stdout.to_string(),
            stderr: String::new(),
            exit_code: 0,
        }
    }

    fn failed(exit_code: i32) -> ExecutionResult {
        ExecutionResult {
            stdout: "partial".to_string(),
            stderr: "ncks: ERROR something broke".to_string(),
            exit_code,
        }
    }

    /// In-memory dataset with one variable `random` (fill value -999).
    #[derive(Debug)]
    struct FakeDataset {
        path: PathBuf,
        names: Vec<String>,
        variable: VariableData,
    }

    impl Dataset for FakeDataset {
        fn path(&self) -> &Path {
            &self.path
        }

        fn variable_names(&self) -> &[String] {
            &self.names
        }

        fn read_variable(&self, name: &str) -> Result<VariableData, ArrayError> {
            if name == self.variable.name {
                Ok(self.variable.clone())
            } else {
                Err(ArrayError::UnknownVariable(name.to_string()))
            }
        }
    }

    struct FakeReader;

    impl ArrayFileReader for FakeReader {
        fn open(&self, path: &Path) -> Result<Box<dyn Dataset>, ArrayError> {
            let variable = VariableData::from_flat(
                "random",
                vec![1, 2, 2],
                vec![0.5, -999.0, 0.25, 0.75],
                Some(-999.0),
            )?;
            Ok(Box::new(FakeDataset {
                path: path.to_path_buf(),
                names: vec!["random".to_string(), "time".to_string()],
                variable,
            }))
        }
    }

    struct Fixture {
        nco: Nco,
        runner: Arc<FakeRunner>,
        dir: tempfile::TempDir,
    }

    fn fixture(runner: Arc<FakeRunner>, configure: impl FnOnce(NcoConfig) -> NcoConfig) -> Fixture {
        let dir = tempfile::tempdir().expect("create temp dir");
        let config = configure(NcoConfig::new("/opt/nco/bin").with_temp_dir(dir.path()));
        let nco = Nco::with_runner(config, runner.clone());
        Fixture { nco, runner, dir }
    }

    #[tokio::test]
    async fn unknown_operator_fails_without_spawning() {
        let f = fixture(FakeRunner::writing_output(), |c| c);
        assert_matches!(
            f.nco.call("ncfoo", CallOptions::new().input("in.nc")).await,
            Err(NcoError::UnknownOperator(name)) if name == "ncfoo"
        );
        assert_eq!(f.runner.call_count(), 0);
        assert!(f.nco.cached_operators().is_empty());
    }

    #[tokio::test]
    async fn every_known_operator_succeeds_on_exit_zero() {
        let f = fixture(FakeRunner::writing_output(), |c| c);
        for op in Operator::ALL {
            let output = f
                .nco
                .call(op.name(), CallOptions::new().input("in.nc"))
                .await
                .expect("call")
                .expect("some output");
            if op.always_prints() {
                assert_matches!(output, NcoOutput::Lines(_));
            } else {
                assert_matches!(output, NcoOutput::Path(_));
            }
        }
        assert_eq!(f.runner.call_count(), Operator::ALL.len());
        let mut all = Operator::ALL.to_vec();
        all.sort();
        assert_eq!(f.nco.cached_operators(), all);
    }

    #[test]
    fn handlers_are_cached_per_instance() {
        let f = fixture(FakeRunner::writing_output(), |c| c);
        let first = f.nco.operator("ncks").expect("resolve");
        let second = f.nco.operator("ncks").expect("resolve");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.operator(), Operator::Ncks);

        let other = fixture(FakeRunner::writing_output(), |c| c);
        let third = other.nco.operator("ncks").expect("resolve");
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(f.nco.cached_operators(), vec![Operator::Ncks]);
    }

    #[tokio::test]
    async fn missing_input_fails_without_spawning() {
        let f = fixture(FakeRunner::writing_output(), |c| c);
        let result = f
            .nco
            .call("ncra", CallOptions::new().option("a", true).output("out.nc"))
            .await;
        assert_matches!(result, Err(NcoError::Config(ConfigError::MissingInput)));
        assert_eq!(f.runner.call_count(), 0);
    }

    #[tokio::test]
    async fn file_mode_appends_output_last_and_returns_path() {
        let f = fixture(FakeRunner::writing_output(), |c| c.with_default("overwrite", true));
        let out = f.dir.path().join("out.nc");
        let output = f
            .nco
            .ncra(
                CallOptions::new()
                    .input(vec!["a.nc", "b.nc"])
                    .option("d", "time,0")
                    .output(out.as_path()),
            )
            .await
            .expect("call")
            .and_then(NcoOutput::into_path);
        assert_eq!(output, Some(out.clone()));

        let calls = f.runner.calls();
        assert_eq!(
            calls[0].tokens(),
            [
                "/opt/nco/bin/ncra".to_string(),
                "--d=time,0".to_string(),
                "--overwrite".to_string(),
                "a.nc".to_string(),
                "b.nc".to_string(),
                out.to_string_lossy().into_owned(),
            ]
        );
    }

    #[tokio::test]
    async fn existing_output_is_reused_without_running() {
        let f = fixture(FakeRunner::writing_output(), |c| c);
        let out = f.dir.path().join("cached.nc");
        let call = CallOptions::new().input("in.nc").output(out.as_path());

        let first = f.nco.ncks(call.clone()).await.expect("call");
        let second = f.nco.ncks(call).await.expect("call");

        assert_eq!(f.runner.call_count(), 1);
        assert_eq!(
            first.and_then(NcoOutput::into_path),
            second.and_then(NcoOutput::into_path)
        );
    }

    #[tokio::test]
    async fn disabled_force_reuses_named_output_and_rejects_anonymous_output() {
        let f = fixture(FakeRunner::writing_output(), |c| c.with_force_output(false));
        let out = f.dir.path().join("absent.nc");

        let output = f
            .nco
            .ncks(CallOptions::new().input("in.nc").output(out.as_path()))
            .await
            .expect("call");
        assert_eq!(output.and_then(NcoOutput::into_path), Some(out));
        assert_eq!(f.runner.call_count(), 0);

        assert_matches!(
            f.nco.ncks(CallOptions::new().input("in.nc")).await,
            Err(NcoError::Config(ConfigError::MissingOutput))
        );

        // A per-call force overrides the configured policy.
        f.nco
            .ncks(CallOptions::new().input("in.nc").force(true))
            .await
            .expect("call");
        assert_eq!(f.runner.call_count(), 1);
    }

    #[tokio::test]
    async fn multiple_outputs_are_rejected() {
        let f = fixture(FakeRunner::writing_output(), |c| c);
        let result = f
            .nco
            .ncks(CallOptions::new().input("in.nc").output(vec!["a.nc", "b.nc"]))
            .await;
        assert_matches!(
            result,
            Err(NcoError::Config(ConfigError::MultipleOutputs(2)))
        );
        assert_eq!(f.runner.call_count(), 0);

        // A one-element list is accepted.
        let out = f.dir.path().join("single.nc");
        let single = vec![out.to_string_lossy().into_owned()];
        f.nco
            .ncks(CallOptions::new().input("in.nc").output(single))
            .await
            .expect("call");
        assert!(out.is_file());
    }

    #[tokio::test]
    async fn anonymous_output_goes_to_a_tracked_temp_file() {
        let f = fixture(FakeRunner::writing_output(), |c| c);
        let path = f
            .nco
            .ncwa(CallOptions::new().input("in.nc"))
            .await
            .expect("call")
            .and_then(NcoOutput::into_path)
            .expect("path");

        assert_eq!(f.nco.temp_files().dir(), f.dir.path());
        assert!(path.starts_with(f.dir.path()));
        assert!(path.is_file());
        assert_eq!(f.nco.temp_files().tracked(), vec![path.clone()]);
        assert_eq!(
            f.runner.calls()[0].args().last().map(String::as_str),
            path.to_str()
        );

        f.nco.cleanup();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn print_flags_switch_to_print_mode() {
        let runner = FakeRunner::new(|_| ok("a\nb\n"));
        let f = fixture(runner, |c| c);
        let lines = f
            .nco
            .ncks(CallOptions::new().input("in.nc").options("-M"))
            .await
            .expect("call")
            .and_then(NcoOutput::into_lines);
        assert_eq!(lines, Some(vec!["a".to_string(), "b".to_string()]));

        // No output token in print mode.
        assert_eq!(f.runner.calls()[0].args(), ["-M", "in.nc"]);
        assert!(f.nco.temp_files().tracked().is_empty());
    }

    #[tokio::test]
    async fn print_mode_can_be_requested_explicitly() {
        let runner = FakeRunner::new(|_| ok("  indented  \r\nlast"));
        let f = fixture(runner, |c| c);
        let lines = f
            .nco
            .ncks(CallOptions::new().input("in.nc").prints_out())
            .await
            .expect("call")
            .and_then(NcoOutput::into_lines);
        assert_eq!(lines, Some(vec!["indented".to_string(), "last".to_string()]));
    }

    #[tokio::test]
    async fn execution_failure_carries_exit_code() {
        let f = fixture(FakeRunner::new(|_| failed(1)), |c| c);
        let err = f
            .nco
            .ncks(CallOptions::new().input("in.nc"))
            .await
            .expect_err("should fail");
        assert_matches!(
            &err,
            NcoError::ExecutionFailed { stdout, stderr, exit_code: 1 }
                if stdout == "partial" && stderr.contains("something broke")
        );
    }

    #[tokio::test]
    async fn return_none_on_error_swallows_execution_failures_only() {
        let f = fixture(FakeRunner::new(|_| failed(1)), |c| c.with_return_none_on_error(true));
        let result = f.nco.ncks(CallOptions::new().input("in.nc")).await;
        assert_matches!(result, Ok(None));

        let printing = f.nco.ncdump(CallOptions::new().input("in.nc")).await;
        assert_matches!(printing, Ok(None));

        // Configuration errors still propagate.
        assert_matches!(
            f.nco.ncks(CallOptions::new()).await,
            Err(NcoError::Config(ConfigError::MissingInput))
        );
    }

    #[tokio::test]
    async fn bound_operator_never_swallows_failures() {
        let f = fixture(FakeRunner::new(|_| failed(3)), |c| c.with_return_none_on_error(true));
        let handler = f.nco.operator("ncks").expect("resolve");
        let err = handler
            .call(CallOptions::new().input("in.nc"))
            .await
            .expect_err("should fail");
        assert_eq!(err.exit_code(), Some(3));
    }

    #[tokio::test]
    async fn env_override_is_passed_to_the_runner() {
        let f = fixture(FakeRunner::writing_output(), |c| c);
        f.nco
            .ncap2(
                CallOptions::new()
                    .input("in.nc")
                    .env([("OMP_NUM_THREADS", "2")]),
            )
            .await
            .expect("call");
        let calls = f.runner.calls.lock().expect("lock");
        assert_eq!(
            calls[0].1,
            Some(vec![("OMP_NUM_THREADS".to_string(), "2".to_string())])
        );
    }

    #[tokio::test]
    async fn debug_level_is_forwarded() {
        let f = fixture(FakeRunner::writing_output(), |c| c.with_debug(true));
        f.nco
            .ncks(CallOptions::new().input("in.nc"))
            .await
            .expect("call");
        assert_eq!(&f.runner.calls()[0].args()[..3], ["-D", "10", "in.nc"]);
    }

    #[tokio::test]
    async fn masked_array_is_built_from_the_fill_value() {
        let f = fixture(FakeRunner::writing_output(), |c| c);
        let nco = f.nco.with_reader(Arc::new(FakeReader));
        let masked = nco
            .ncks(CallOptions::new().input("in.nc").return_ma_array("random"))
            .await
            .expect("call")
            .and_then(NcoOutput::into_masked_array)
            .expect("masked array");
        assert_eq!(masked.masked_count(), 1);
        assert!(masked.mask[IxDyn(&[0, 0, 1])]);
    }

    #[tokio::test]
    async fn plain_array_takes_priority_over_other_modes() {
        let f = fixture(FakeRunner::writing_output(), |c| c.with_return_cdf(true));
        let nco = f.nco.with_reader(Arc::new(FakeReader));
        let array = nco
            .ncks(
                CallOptions::new()
                    .input("in.nc")
                    .return_array("random")
                    .return_ma_array("random"),
            )
            .await
            .expect("call")
            .and_then(NcoOutput::into_array)
            .expect("array");
        assert_eq!(array.shape(), &[1, 2, 2]);
        assert_eq!(array[IxDyn(&[0, 0, 1])], -999.0);
    }

    #[tokio::test]
    async fn unknown_variable_is_a_resource_error() {
        let f = fixture(FakeRunner::writing_output(), |c| c);
        let nco = f.nco.with_reader(Arc::new(FakeReader));
        let result = nco
            .ncks(CallOptions::new().input("in.nc").return_array("missing"))
            .await;
        assert_matches!(
            result,
            Err(NcoError::Array(ArrayError::UnknownVariable(name))) if name == "missing"
        );
    }

    #[tokio::test]
    async fn dataset_mode_returns_an_open_dataset() {
        let f = fixture(FakeRunner::writing_output(), |c| c);
        let nco = f.nco.with_reader(Arc::new(FakeReader));
        let out = f.dir.path().join("ds.nc");

        let per_call = nco
            .ncks(CallOptions::new().input("in.nc").output(out.as_path()).return_cdf())
            .await
            .expect("call")
            .and_then(NcoOutput::into_dataset)
            .expect("dataset");
        assert_eq!(per_call.path(), out.as_path());
        assert!(per_call.has_variable("time"));

        nco.set_return_cdf(true);
        let process_wide = nco
            .ncks(CallOptions::new().input("in.nc").output(out.as_path()))
            .await
            .expect("call");
        assert_matches!(process_wide, Some(NcoOutput::Dataset(_)));
    }

    #[cfg(not(any(feature = "classic", feature = "netcdf4")))]
    #[tokio::test]
    async fn array_request_without_backend_fails_at_request_time() {
        let f = fixture(FakeRunner::writing_output(), |c| c);
        let result = f
            .nco
            .ncks(CallOptions::new().input("in.nc").return_array("random"))
            .await;
        assert_matches!(result, Err(NcoError::Array(ArrayError::NoBackend)));
        // The operator itself still ran.
        assert_eq!(f.runner.call_count(), 1);
    }

    #[tokio::test]
    async fn version_is_parsed_from_stderr() {
        let runner = FakeRunner::new(|_| ExecutionResult {
            stdout: String::new(),
            stderr: "NCO netCDF Operators version \"5.1.4\" last modified 2023/01/01\n".to_string(),
            exit_code: 0,
        });
        let f = fixture(runner, |c| c);
        assert_eq!(f.nco.version().await.expect("version"), "5.1.4");
        assert_eq!(f.runner.calls()[0].joined(), "/opt/nco/bin/ncra --version");
    }

    #[tokio::test]
    async fn nco_path_can_be_changed() {
        let f = fixture(FakeRunner::writing_output(), |c| c);
        f.nco.set_nco_path("/usr/local/bin");
        f.nco
            .ncks(CallOptions::new().input("in.nc"))
            .await
            .expect("call");
        assert_eq!(f.runner.calls()[0].program(), "/usr/local/bin/ncks");
        assert_eq!(f.nco.nco_path(), PathBuf::from("/usr/local/bin"));
    }

    #[test]
    fn has_nco_checks_for_a_directory() {
        let dir = tempfile::tempdir().expect("create temp dir");
        assert!(Nco::has_nco_at(dir.path()));
        assert!(!Nco::has_nco_at(&dir.path().join("missing")));
    }

    #[test]
    fn operator_list_is_complete() {
        let names = Nco::operators();
        assert_eq!(names.len(), 14);
        assert!(names.contains(&"ncdump"));
    }

    #[test]
    fn stdout_lines_drops_only_the_trailing_empty_entry() {
        assert_eq!(stdout_lines("a\nb\n"), vec!["a", "b"]);
        assert_eq!(stdout_lines("a\n\nb\n"), vec!["a", "", "b"]);
        assert!(stdout_lines("").is_empty());
    }
}
