//! Code-generation backends and their failure idioms.
use std::fmt;
use std::str::FromStr;

use crate::error::CorrcError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, clap::ValueEnum)]
pub enum Target {
    /// host C: out-of-range arguments terminate the process
    #[default]
    C,
    /// CUDA device code: out-of-range arguments trip a debug assertion
    Cuda,
}

impl Target {
    /// Statement executed when a numeric argument falls outside its bounds.
    pub fn fail(self) -> &'static str {
        match self {
            Target::C => "exit(-1)",
            Target::Cuda => "assert(0)",
        }
    }

    pub fn includes(self) -> &'static [&'static str] {
        match self {
            Target::C => &["stdlib.h", "float.h", "limits.h"],
            Target::Cuda => &["assert.h", "float.h", "limits.h"],
        }
    }

    /// Specifiers in front of the function definition. Every unit is a header,
    /// so the definition must be safe to include from several translation units.
    pub fn linkage(self) -> &'static str {
        match self {
            Target::C => "static inline",
            Target::Cuda => "static inline __device__",
        }
    }

    pub fn file_extension(self) -> &'static str {
        "h"
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::C => f.write_str("C"),
            Target::Cuda => f.write_str("CUDA"),
        }
    }
}

impl FromStr for Target {
    type Err = CorrcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "c" => Ok(Target::C),
            "cuda" => Ok(Target::Cuda),
            _ => Err(CorrcError::UnknownTarget(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_idioms() {
        assert_eq!(Target::C.fail(), "exit(-1)");
        assert_eq!(Target::Cuda.fail(), "assert(0)");
        assert_eq!(Target::default(), Target::C);
    }

    #[test]
    fn parse_is_case_insensitive_and_rejects_unknown() {
        assert_eq!("CUDA".parse::<Target>().unwrap(), Target::Cuda);
        assert_eq!("c".parse::<Target>().unwrap(), Target::C);
        let err = "opencl".parse::<Target>().unwrap_err();
        assert!(matches!(err, CorrcError::UnknownTarget(ref s) if s == "opencl"));
    }

    #[test]
    fn definitions_have_internal_linkage() {
        assert_eq!(Target::C.linkage(), "static inline");
        assert_eq!(Target::Cuda.linkage(), "static inline __device__");
    }

    #[test]
    fn includes_cover_failure_statement() {
        assert!(Target::C.includes().contains(&"stdlib.h"));
        assert!(Target::Cuda.includes().contains(&"assert.h"));
    }
}
