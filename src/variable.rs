//! Input variable model: semantic kind, bounds or enumeration, derived naming.
//!
//! A descriptor is built once from raw schema values and never mutated. All
//! validation happens at construction so that emission cannot fail on a
//! registered variable.
use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use ordered_float::OrderedFloat;
use regex::Regex;
use sha2::{Digest, Sha256};

use crate::error::{CorrcError, Result};

/// Width of the numeric suffix appended to generated enum type names.
pub const TYPE_NAME_DIGITS: u32 = 8;

/// Domain tag mixed into the type-name hash. Bump the version if the
/// derivation ever changes so that old and new identifiers never alias.
const TYPE_NAME_HASH_TAG: &[u8] = b"corrcc/type-name/v1";

static C_IDENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

const C_KEYWORDS: &[&str] = &[
    "auto", "break", "case", "char", "const", "continue", "default", "do", "double", "else",
    "enum", "extern", "float", "for", "goto", "if", "inline", "int", "long", "register",
    "restrict", "return", "short", "signed", "sizeof", "static", "struct", "switch", "typedef",
    "union", "unsigned", "void", "volatile", "while",
];

pub fn is_c_identifier(s: &str) -> bool {
    C_IDENT.is_match(s) && !C_KEYWORDS.contains(&s)
}

pub(crate) fn check_identifier(what: &'static str, ident: &str) -> Result<()> {
    if is_c_identifier(ident) {
        Ok(())
    } else {
        Err(CorrcError::InvalidIdentifier { what, ident: ident.to_string() })
    }
}

// ------------------------------- Spec ------------------------------------- //

/// Raw construction arguments for one input, as handed over by a schema reader.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableSpec {
    /// `"real"`, `"int"` or `"string"`
    pub raw_type: String,
    pub name: String,
    pub min: f64,
    pub max: f64,
    pub values: BTreeSet<String>,
}

impl VariableSpec {
    pub fn real(name: impl Into<String>, min: f64, max: f64) -> Self {
        Self::numeric("real", name, min, max)
    }

    pub fn int(name: impl Into<String>, min: f64, max: f64) -> Self {
        Self::numeric("int", name, min, max)
    }

    pub fn string<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            raw_type: "string".to_string(),
            name: name.into(),
            min: f64::NEG_INFINITY,
            max: f64::INFINITY,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    fn numeric(raw_type: &str, name: impl Into<String>, min: f64, max: f64) -> Self {
        Self {
            raw_type: raw_type.to_string(),
            name: name.into(),
            min,
            max,
            values: BTreeSet::new(),
        }
    }
}

// ----------------------------- Descriptor --------------------------------- //

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Bounds {
    pub min: OrderedFloat<f64>,
    pub max: OrderedFloat<f64>,
}

impl Bounds {
    pub fn new(name: &str, min: f64, max: f64) -> Result<Self> {
        // `!(min <= max)` also rejects NaN on either side
        if !(min <= max) {
            return Err(CorrcError::InvalidBounds { name: name.to_string(), min, max });
        }
        Ok(Self { min: OrderedFloat(min), max: OrderedFloat(max) })
    }

    pub fn unbounded() -> Self {
        Self {
            min: OrderedFloat(f64::NEG_INFINITY),
            max: OrderedFloat(f64::INFINITY),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VarKind {
    Float(Bounds),
    Int(Bounds),
    Enumerated {
        type_name: String,
        values: BTreeSet<String>,
        /// C enumerators derived from `values`, same order
        enumerators: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VariableDescriptor {
    name: String,
    kind: VarKind,
}

impl VariableDescriptor {
    pub fn new(correction_name: &str, spec: VariableSpec) -> Result<Self> {
        let VariableSpec { raw_type, name, min, max, values } = spec;
        check_identifier("variable name", &name)?;

        let kind = match raw_type.as_str() {
            "real" => VarKind::Float(Bounds::new(&name, min, max)?),
            "int" => VarKind::Int(Bounds::new(&name, min, max)?),
            "string" => {
                if values.is_empty() {
                    return Err(CorrcError::EmptyEnumeration { name });
                }
                let enumerators = enumerators_for(&name, &values)?;
                VarKind::Enumerated {
                    type_name: enum_type_name(&name, correction_name),
                    values,
                    enumerators,
                }
            }
            _ => return Err(CorrcError::UnsupportedVariableType { name, raw_type }),
        };

        Ok(Self { name, kind })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &VarKind {
        &self.kind
    }

    pub fn is_enumerated(&self) -> bool {
        matches!(self.kind, VarKind::Enumerated { .. })
    }

    /// Numeric bounds, `None` for enumerated variables.
    pub fn bounds(&self) -> Option<Bounds> {
        match self.kind {
            VarKind::Float(b) | VarKind::Int(b) => Some(b),
            VarKind::Enumerated { .. } => None,
        }
    }

    /// Generated type name, `None` for numeric variables.
    pub fn type_name(&self) -> Option<&str> {
        match &self.kind {
            VarKind::Enumerated { type_name, .. } => Some(type_name),
            _ => None,
        }
    }

    /// C enumerators, empty for numeric variables.
    pub fn enumerators(&self) -> &[String] {
        match &self.kind {
            VarKind::Enumerated { enumerators, .. } => enumerators,
            _ => &[],
        }
    }

    /// Native C parameter type.
    pub fn c_type(&self) -> &str {
        match &self.kind {
            VarKind::Float(_) => "float",
            VarKind::Int(_) => "int",
            VarKind::Enumerated { type_name, .. } => type_name,
        }
    }
}

// ------------------------------- Naming ----------------------------------- //

/// Stable numeric suffix for a correction, in `0..10^TYPE_NAME_DIGITS`.
pub fn type_name_suffix(correction_name: &str) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(TYPE_NAME_HASH_TAG);
    hasher.update([0u8]);
    hasher.update(correction_name.as_bytes());
    let digest = hasher.finalize();

    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(head) % 10u64.pow(TYPE_NAME_DIGITS)
}

/// `flavor` under correction `X` → `Flavor_<8 digits>`; `jetFlavor` → `Jetflavor_<8 digits>`.
pub fn enum_type_name(var_name: &str, correction_name: &str) -> String {
    format!(
        "{}_{:0width$}",
        capitalize(var_name),
        type_name_suffix(correction_name),
        width = TYPE_NAME_DIGITS as usize,
    )
}

/// First character upper-cased, the rest lower-cased.
fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Map a raw enumeration member onto a C enumerator.
pub fn to_enumerator(raw: &str) -> String {
    let mut out: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if out.is_empty()
        || out.starts_with(|c: char| c.is_ascii_digit())
        || C_KEYWORDS.contains(&out.as_str())
    {
        out.insert(0, '_');
    }
    out
}

fn enumerators_for(name: &str, values: &BTreeSet<String>) -> Result<Vec<String>> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::with_capacity(values.len());
    for raw in values {
        let member = to_enumerator(raw);
        if !seen.insert(member.clone()) {
            return Err(CorrcError::EnumMemberCollision { name: name.to_string(), member });
        }
        out.push(member);
    }
    Ok(out)
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn real_keeps_bounds() {
        let v = VariableDescriptor::new("calib", VariableSpec::real("eta", -2.5, 2.5)).unwrap();
        assert_eq!(v.c_type(), "float");
        let b = v.bounds().unwrap();
        assert_eq!(b.min.0, -2.5);
        assert_eq!(b.max.0, 2.5);
    }

    #[test]
    fn unsupported_type_is_an_error_value() {
        let spec = VariableSpec { raw_type: "complex".into(), ..VariableSpec::real("z", 0.0, 1.0) };
        let err = VariableDescriptor::new("calib", spec).unwrap_err();
        assert!(matches!(
            err,
            CorrcError::UnsupportedVariableType { ref name, ref raw_type } if name == "z" && raw_type == "complex"
        ));
    }

    #[test]
    fn empty_enumeration_is_rejected() {
        let spec = VariableSpec::string("flavor", Vec::<String>::new());
        let err = VariableDescriptor::new("calib", spec).unwrap_err();
        assert!(matches!(err, CorrcError::EmptyEnumeration { ref name } if name == "flavor"));
    }

    #[test]
    fn inverted_or_nan_bounds_are_rejected() {
        let err = VariableDescriptor::new("c", VariableSpec::real("pt", 5.0, 1.0)).unwrap_err();
        assert!(matches!(err, CorrcError::InvalidBounds { .. }));
        let err = VariableDescriptor::new("c", VariableSpec::int("n", f64::NAN, 1.0)).unwrap_err();
        assert!(matches!(err, CorrcError::InvalidBounds { .. }));
    }

    #[test]
    fn type_name_is_stable_and_scoped_to_correction() {
        let a = enum_type_name("flavor", "X");
        let b = enum_type_name("flavor", "X");
        let c = enum_type_name("flavor", "Y");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("Flavor_"));
        assert!(enum_type_name("jetFlavor", "X").starts_with("Jetflavor_"));
        assert_eq!(a.len(), "Flavor_".len() + TYPE_NAME_DIGITS as usize);
        assert!(a["Flavor_".len()..].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn enumerators_are_sorted_and_sanitized() {
        let spec = VariableSpec::string("era", ["2016postVFP", "2016preVFP", "Run-C"]);
        let v = VariableDescriptor::new("calib", spec).unwrap();
        match v.kind() {
            VarKind::Enumerated { enumerators, .. } => {
                assert_eq!(enumerators, &["_2016postVFP", "_2016preVFP", "Run_C"]);
            }
            other => panic!("expected enumerated, got {other:?}"),
        }
    }

    #[test]
    fn keyword_members_get_a_prefix() {
        assert_eq!(to_enumerator("default"), "_default");
        assert_eq!(to_enumerator("int"), "_int");
        assert_eq!(to_enumerator("up"), "up");

        let spec = VariableSpec::string("syst", ["default", "up"]);
        let v = VariableDescriptor::new("calib", spec).unwrap();
        assert_eq!(v.enumerators(), ["_default", "up"]);
        assert!(v.enumerators().iter().all(|m| is_c_identifier(m)));
    }

    #[test]
    fn colliding_enumerators_are_rejected() {
        let spec = VariableSpec::string("syst", ["up-1", "up_1"]);
        let err = VariableDescriptor::new("calib", spec).unwrap_err();
        assert!(matches!(err, CorrcError::EnumMemberCollision { ref member, .. } if member == "up_1"));
    }

    #[test]
    fn identifiers_are_checked() {
        assert!(is_c_identifier("pt"));
        assert!(is_c_identifier("_x1"));
        assert!(!is_c_identifier("1x"));
        assert!(!is_c_identifier("float"));
        let err = VariableDescriptor::new("c", VariableSpec::real("jet.pt", 0.0, 1.0)).unwrap_err();
        assert!(matches!(err, CorrcError::InvalidIdentifier { .. }));
    }
}
