//! Evaluation payload shapes and the pluggable body generators keyed by them.
//!
//! No shape has real code generation yet: every shape maps to
//! [`PlaceholderBody`], which returns a constant. A generator for a shape can
//! be swapped in through [`BodyRegistry::insert`] without touching the enum,
//! signature or validation phases.
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::Serialize;

use crate::emitter::CorrectionDef;

/// Coarse shape of a correction's evaluation payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentShape {
    /// binned lookup table (single or multi-dimensional)
    Binned,
    /// dispatch on a categorical input
    Categorical,
    /// formula, constant or any other generic expression
    Expression,
}

impl ContentShape {
    pub const ALL: [ContentShape; 3] =
        [ContentShape::Binned, ContentShape::Categorical, ContentShape::Expression];
}

impl fmt::Display for ContentShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ContentShape::Binned => "binned",
            ContentShape::Categorical => "categorical",
            ContentShape::Expression => "expression",
        };
        f.write_str(s)
    }
}

/// Generates the statements following argument validation.
///
/// Implementations return the body lines (without surrounding braces); the
/// last one must `return` a `float`.
pub trait EvaluationBody {
    fn body(&self, def: &CorrectionDef) -> Vec<String>;
}

/// Value returned by every generated function until real evaluation exists.
pub const PLACEHOLDER_RETURN: &str = "return 1.;";

#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderBody;

impl EvaluationBody for PlaceholderBody {
    fn body(&self, _def: &CorrectionDef) -> Vec<String> {
        vec![PLACEHOLDER_RETURN.to_string()]
    }
}

#[derive(Clone)]
pub struct BodyRegistry {
    by_shape: IndexMap<ContentShape, Rc<dyn EvaluationBody>>,
    fallback: Rc<dyn EvaluationBody>,
}

impl Default for BodyRegistry {
    fn default() -> Self {
        let placeholder: Rc<dyn EvaluationBody> = Rc::new(PlaceholderBody);
        let by_shape = ContentShape::ALL
            .into_iter()
            .map(|shape| (shape, Rc::clone(&placeholder)))
            .collect();
        Self { by_shape, fallback: placeholder }
    }
}

impl fmt::Debug for BodyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BodyRegistry")
            .field("shapes", &self.by_shape.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl BodyRegistry {
    pub fn insert(&mut self, shape: ContentShape, body: impl EvaluationBody + 'static) {
        self.by_shape.insert(shape, Rc::new(body));
    }

    /// Generator for `shape`; the fallback serves corrections without content.
    pub fn get(&self, shape: Option<ContentShape>) -> &dyn EvaluationBody {
        let body = shape
            .and_then(|s| self.by_shape.get(&s))
            .unwrap_or(&self.fallback);
        &**body
    }
}
