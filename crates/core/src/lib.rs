//! Dynamic facade over the NCO command-line operators.
//!
//! Operators are invoked by name through [`Nco`]; each call becomes one
//! subprocess whose result is returned as stdout lines, an output path, an
//! open dataset or an array.

pub mod array;
pub mod command;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod operator;
pub mod options;
pub mod process;
pub mod temp_files;
pub mod version;

pub use array::{ArrayBackend, ArrayError, ArrayFileReader, Dataset, MaskedArray, VariableData};
pub use command::CommandLine;
pub use config::NcoConfig;
pub use dispatcher::{BoundOperator, Nco, NcoOutput};
pub use error::{ConfigError, NcoError};
pub use operator::Operator;
pub use options::{CallOptions, DebugLevel, OptionMap, OptionValue, PathArg, RawOptions};
pub use process::{ExecutionMode, ExecutionResult, ProcessRunner, SubprocessRunner};
pub use temp_files::TempFileRegistry;
