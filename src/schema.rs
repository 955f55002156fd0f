//! Reader for correctionlib-style ("schema v2") JSON documents.
//!
//! Only what the emitter needs is modeled: names, descriptions, typed
//! inputs, and enough of the content tree to classify its shape and derive
//! per-input bounds and categories (see [`summary`]).
pub mod summary;

use std::fmt;

use serde::Deserialize;
use serde_json::Value;

use crate::content::ContentShape;
use crate::error::{CorrcError, Result};

// ------------------------------ Documents --------------------------------- //

#[derive(Debug, Clone, Deserialize)]
pub struct CorrectionSet {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub description: Option<String>,
    pub corrections: Vec<Correction>,
    /// kept opaque; compound corrections are not compiled
    #[serde(default)]
    pub compound_corrections: Vec<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Correction {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub version: Option<i64>,
    pub inputs: Vec<Variable>,
    #[serde(default)]
    pub output: Option<Variable>,
    pub data: Content,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Variable {
    pub name: String,
    /// `real`, `int` or `string`
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(default)]
    pub description: Option<String>,
}

// ------------------------------- Content ---------------------------------- //

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Content {
    Const(f64),
    Node(Box<Node>),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "nodetype", rename_all = "lowercase")]
pub enum Node {
    Binning(Binning),
    MultiBinning(MultiBinning),
    Category(Category),
    Formula(Formula),
    FormulaRef(FormulaRef),
    Transform(Transform),
    HashPrng(HashPrng),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Binning {
    pub input: String,
    pub edges: Edges,
    pub content: Vec<Content>,
    pub flow: Flow,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MultiBinning {
    pub inputs: Vec<String>,
    pub edges: Vec<Edges>,
    pub content: Vec<Content>,
    pub flow: Flow,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Category {
    pub input: String,
    pub content: Vec<CategoryItem>,
    #[serde(default)]
    pub default: Option<Content>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryItem {
    pub key: CategoryKey,
    pub value: Content,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum CategoryKey {
    Int(i64),
    Str(String),
}

impl fmt::Display for CategoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CategoryKey::Int(i) => write!(f, "{i}"),
            CategoryKey::Str(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Formula {
    pub expression: String,
    pub parser: String,
    pub variables: Vec<String>,
    #[serde(default)]
    pub parameters: Vec<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FormulaRef {
    pub index: usize,
    pub parameters: Vec<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Transform {
    pub input: String,
    pub rule: Content,
    pub content: Content,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HashPrng {
    pub inputs: Vec<String>,
    pub distribution: String,
}

/// Bin edges: an explicit list or `n` uniform bins over `[low, high]`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Edges {
    List(Vec<Edge>),
    Uniform { n: u32, low: f64, high: f64 },
}

impl Edges {
    /// `(first edge, last edge)`, `None` when the list is empty.
    pub fn span(&self) -> Option<(f64, f64)> {
        match self {
            Edges::List(edges) => Some((edges.first()?.0, edges.last()?.0)),
            Edges::Uniform { low, high, .. } => Some((*low, *high)),
        }
    }
}

/// One bin edge. JSON has no infinities, so `"inf"`, `"+inf"` and `"-inf"`
/// are accepted as strings.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(try_from = "EdgeRepr")]
pub struct Edge(pub f64);

#[derive(Deserialize)]
#[serde(untagged)]
enum EdgeRepr {
    Num(f64),
    Word(String),
}

impl TryFrom<EdgeRepr> for Edge {
    type Error = String;

    fn try_from(repr: EdgeRepr) -> Result<Self, Self::Error> {
        match repr {
            EdgeRepr::Num(x) => Ok(Edge(x)),
            EdgeRepr::Word(w) => match w.as_str() {
                "inf" | "+inf" => Ok(Edge(f64::INFINITY)),
                "-inf" => Ok(Edge(f64::NEG_INFINITY)),
                _ => Err(format!("invalid bin edge `{w}`")),
            },
        }
    }
}

/// Out-of-range behaviour of a binning node.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Flow {
    /// `clamp`, `error` or `wrap`
    Mode(String),
    /// fallback content
    Content(Content),
}

impl Flow {
    pub fn accepts_overflow(&self) -> bool {
        !matches!(self, Flow::Mode(mode) if mode == "error")
    }
}

impl Content {
    pub fn shape(&self) -> ContentShape {
        match self {
            Content::Node(node) => match node.as_ref() {
                Node::Binning(_) | Node::MultiBinning(_) => ContentShape::Binned,
                Node::Category(_) => ContentShape::Categorical,
                Node::Formula(_) | Node::FormulaRef(_) | Node::Transform(_) | Node::HashPrng(_) => {
                    ContentShape::Expression
                }
            },
            Content::Const(_) => ContentShape::Expression,
        }
    }
}

// ------------------------------- Loading ---------------------------------- //

/// Corrections held by one JSON document, which is either a correction set
/// (`{"corrections": [...]}`) or a single correction.
pub fn corrections_from_value(doc: Value) -> Result<Vec<Correction>> {
    match &doc {
        Value::Object(map) if map.contains_key("corrections") => {
            let set: CorrectionSet = crate::path_de::from_value_with_path(doc)?;
            if !set.compound_corrections.is_empty() {
                tracing::debug!(count = set.compound_corrections.len(), "skipping compound corrections");
            }
            Ok(set.corrections)
        }
        Value::Object(_) => Ok(vec![crate::path_de::from_value_with_path(doc)?]),
        other => Err(CorrcError::Schema(format!(
            "expected a correction or correction set object, found {}",
            kind_of(other)
        ))),
    }
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_set_and_single_documents() {
        let single = json!({
            "name": "calib_eta",
            "inputs": [{"name": "eta", "type": "real"}],
            "output": {"name": "sf", "type": "real"},
            "data": 1.0
        });
        let set = json!({"schema_version": 2, "corrections": [single.clone(), single.clone()]});

        assert_eq!(corrections_from_value(single).unwrap().len(), 1);
        assert_eq!(corrections_from_value(set).unwrap().len(), 2);
    }

    #[test]
    fn classifies_content_shapes() {
        let binning: Content = serde_json::from_value(json!({
            "nodetype": "binning", "input": "eta",
            "edges": [-2.5, 0.0, 2.5], "content": [1.0, 1.1], "flow": "error"
        }))
        .unwrap();
        let category: Content = serde_json::from_value(json!({
            "nodetype": "category", "input": "syst",
            "content": [{"key": "nom", "value": 1.0}, {"key": 3, "value": 2.0}]
        }))
        .unwrap();
        let formula: Content = serde_json::from_value(json!({
            "nodetype": "formula", "expression": "x*2", "parser": "TFormula", "variables": ["pt"]
        }))
        .unwrap();

        assert_eq!(binning.shape(), ContentShape::Binned);
        assert_eq!(category.shape(), ContentShape::Categorical);
        assert_eq!(formula.shape(), ContentShape::Expression);
        assert_eq!(Content::Const(0.5).shape(), ContentShape::Expression);
    }

    #[test]
    fn string_edges_parse_as_infinities() {
        let edges: Edges = serde_json::from_value(json!(["-inf", 0.0, "+inf"])).unwrap();
        assert_eq!(edges.span(), Some((f64::NEG_INFINITY, f64::INFINITY)));

        let uniform: Edges = serde_json::from_value(json!({"n": 10, "low": 0.0, "high": 5.0})).unwrap();
        assert_eq!(uniform.span(), Some((0.0, 5.0)));

        assert!(serde_json::from_value::<Edge>(json!("huge")).is_err());
    }

    #[test]
    fn parse_errors_carry_the_json_path() {
        let doc = json!({"corrections": [{"name": "a", "inputs": [{"name": "x"}], "data": 1.0}]});
        let err = corrections_from_value(doc).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("corrections[0].inputs[0]"), "{msg}");
    }

    #[test]
    fn non_object_documents_are_rejected() {
        let err = corrections_from_value(json!([1, 2])).unwrap_err();
        assert!(matches!(err, CorrcError::Schema(ref m) if m.contains("an array")));
    }
}
