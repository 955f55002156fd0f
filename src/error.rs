use thiserror::Error;

pub type Result<T, E = CorrcError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum CorrcError {
    #[error("unsupported type `{raw_type}` for variable `{name}` (expected real, int or string)")]
    UnsupportedVariableType { name: String, raw_type: String },
    #[error("string variable `{name}` has no enumerated values")]
    EmptyEnumeration { name: String },
    #[error("variable `{name}` has invalid bounds [{min}, {max}]")]
    InvalidBounds { name: String, min: f64, max: f64 },
    #[error("{what} `{ident}` is not a valid C identifier")]
    InvalidIdentifier { what: &'static str, ident: String },
    #[error("enumerated values of `{name}` collide on enumerator `{member}`")]
    EnumMemberCollision { name: String, member: String },
    #[error("enumerated variables `{name}` and `{other}` both map to type `{type_name}`")]
    TypeNameCollision { name: String, other: String, type_name: String },
    #[error("no variables registered for correction `{correction}`")]
    NoVariablesRegistered { correction: String },
    #[error("unknown target backend: {0}")]
    UnknownTarget(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("schema error: {0}")]
    Schema(String),
}

/// Non-fatal conditions raised while registering variables or writing output.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Advisory {
    #[error("range validation of int variable `{variable}` is not emitted")]
    UnimplementedIntegerValidation { variable: String },
    #[error("formatter `{program}` not found; writing unformatted output")]
    FormatterUnavailable { program: String },
    #[error("formatter `{program}` failed ({reason}); writing unformatted output")]
    FormatterFailed { program: String, reason: String },
}
