//! Compile calibration corrections into dependency-free C headers.
//!
//! The core is [`CorrectionEmitter`]: register typed inputs
//! ([`VariableSpec`]), record the content shape, then [`emit`] a source unit
//! or [`save`] it through an [`OutputWriter`]. The [`schema`] module is a
//! thin reader for correctionlib-style JSON and [`pipeline`] drives batches.
//!
//! [`emit`]: CorrectionEmitter::emit
//! [`save`]: CorrectionEmitter::save
pub mod cli;
pub mod codegen;
pub mod content;
pub mod emitter;
pub mod error;
pub mod jq_exec;
pub mod path_de;
pub mod pipeline;
pub mod schema;
pub mod target;
pub mod variable;
pub mod writer;

pub use content::{ContentShape, EvaluationBody};
pub use emitter::{CorrectionDef, CorrectionEmitter};
pub use error::{Advisory, CorrcError};
pub use target::Target;
pub use variable::{VarKind, VariableDescriptor, VariableSpec};
pub use writer::{FormatStatus, Formatter, OutputWriter, WriteOutcome};
