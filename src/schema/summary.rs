use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde::Serialize;

use super::{Content, Correction, Node};
use crate::content::ContentShape;
use crate::variable::VariableSpec;

/// Evidence about one input collected while walking a content tree.
#[derive(Clone, Debug)]
pub struct InputStats {
    pub min: f64,
    pub max: f64,
    /// at least one binning over this input clamps, wraps or falls back
    pub overflow: bool,
    /// some transform rewrites this input before lookup
    pub transformed: bool,
    pub values: BTreeSet<String>,
}

impl Default for InputStats {
    fn default() -> Self {
        Self {
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            overflow: false,
            transformed: false,
            values: BTreeSet::new(),
        }
    }
}

impl InputStats {
    pub fn was_binned(&self) -> bool {
        self.min <= self.max
    }

    /// Range the generated guard should enforce. Inputs that are never
    /// binned, accept overflow, or are transformed first are unbounded.
    pub fn bounds(&self) -> (f64, f64) {
        if self.was_binned() && !self.overflow && !self.transformed {
            (self.min, self.max)
        } else {
            (f64::NEG_INFINITY, f64::INFINITY)
        }
    }

    fn observe_span(&mut self, span: Option<(f64, f64)>, overflow: bool) {
        if let Some((low, high)) = span {
            self.min = self.min.min(low);
            self.max = self.max.max(high);
        }
        self.overflow |= overflow;
    }
}

/// Walk `correction.data` and collect stats for every declared input, in
/// declaration order. Inputs never referenced keep default stats.
pub fn collect(correction: &Correction) -> IndexMap<String, InputStats> {
    let mut stats: IndexMap<String, InputStats> = correction
        .inputs
        .iter()
        .map(|v| (v.name.clone(), InputStats::default()))
        .collect();
    walk(&correction.data, &mut stats);
    stats
}

fn walk(content: &Content, stats: &mut IndexMap<String, InputStats>) {
    let node = match content {
        Content::Const(_) => return,
        Content::Node(node) => node.as_ref(),
    };
    match node {
        Node::Binning(b) => {
            let overflow = b.flow.accepts_overflow();
            stats.entry(b.input.clone()).or_default().observe_span(b.edges.span(), overflow);
            for c in &b.content {
                walk(c, stats);
            }
            if let super::Flow::Content(c) = &b.flow {
                walk(c, stats);
            }
        }
        Node::MultiBinning(mb) => {
            let overflow = mb.flow.accepts_overflow();
            for (input, edges) in mb.inputs.iter().zip(&mb.edges) {
                stats.entry(input.clone()).or_default().observe_span(edges.span(), overflow);
            }
            for c in &mb.content {
                walk(c, stats);
            }
            if let super::Flow::Content(c) = &mb.flow {
                walk(c, stats);
            }
        }
        Node::Category(cat) => {
            let entry = stats.entry(cat.input.clone()).or_default();
            entry.values.extend(cat.content.iter().map(|item| item.key.to_string()));
            for item in &cat.content {
                walk(&item.value, stats);
            }
            if let Some(default) = &cat.default {
                walk(default, stats);
            }
        }
        Node::Transform(t) => {
            stats.entry(t.input.clone()).or_default().transformed = true;
            walk(&t.rule, stats);
            walk(&t.content, stats);
        }
        Node::Formula(_) | Node::FormulaRef(_) | Node::HashPrng(_) => {}
    }
}

/// Emitter construction arguments for each declared input, declaration order.
pub fn variable_specs(correction: &Correction) -> Vec<VariableSpec> {
    let stats = collect(correction);
    correction
        .inputs
        .iter()
        .map(|input| {
            let s = stats.get(&input.name).cloned().unwrap_or_default();
            let (min, max) = s.bounds();
            VariableSpec {
                raw_type: input.type_.clone(),
                name: input.name.clone(),
                min,
                max,
                values: if input.type_ == "string" { s.values } else { BTreeSet::new() },
            }
        })
        .collect()
}

// ------------------------------- Report ----------------------------------- //

#[derive(Debug, Clone, Serialize)]
pub struct CorrectionSummary {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub content: ContentShape,
    pub inputs: Vec<InputSummary>,
}

/// JSON-friendly view of one input; infinite bounds serialize as `null`.
#[derive(Debug, Clone, Serialize)]
pub struct InputSummary {
    pub name: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub min: Option<f64>,
    pub max: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
    pub accepts_overflow: bool,
    pub transformed: bool,
}

pub fn summarize(correction: &Correction) -> CorrectionSummary {
    let finite = |x: f64| x.is_finite().then_some(x);
    let inputs = variable_specs(correction)
        .into_iter()
        .zip(collect(correction).into_values())
        .map(|(spec, stats)| InputSummary {
            min: finite(spec.min),
            max: finite(spec.max),
            values: spec.values.into_iter().collect(),
            name: spec.name,
            type_: spec.raw_type,
            accepts_overflow: stats.overflow,
            transformed: stats.transformed,
        })
        .collect();
    CorrectionSummary {
        name: correction.name.clone(),
        description: correction.description.clone(),
        content: correction.data.shape(),
        inputs,
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn correction(v: serde_json::Value) -> Correction {
        serde_json::from_value(v).unwrap()
    }

    fn muon_sf() -> Correction {
        correction(json!({
            "name": "muon_sf",
            "inputs": [
                {"name": "eta", "type": "real"},
                {"name": "pt", "type": "real"},
                {"name": "syst", "type": "string"}
            ],
            "output": {"name": "sf", "type": "real"},
            "data": {
                "nodetype": "multibinning",
                "inputs": ["eta", "pt"],
                "edges": [[0.0, 0.9, 1.2, 2.1, 2.4], [15.0, 20.0, 25.0, 30.0, 40.0, "inf"]],
                "content": [{
                    "nodetype": "category", "input": "syst",
                    "content": [
                        {"key": "nominal", "value": 1.0},
                        {"key": "systup", "value": 1.01},
                        {"key": "systdown", "value": 0.99}
                    ]
                }],
                "flow": "error"
            }
        }))
    }

    #[test]
    fn multibinning_and_category_feed_bounds_and_values() {
        let specs = variable_specs(&muon_sf());
        assert_eq!(specs.len(), 3);
        assert_eq!((specs[0].min, specs[0].max), (0.0, 2.4));
        assert_eq!((specs[1].min, specs[1].max), (15.0, f64::INFINITY));
        assert_eq!(
            specs[2].values.iter().map(String::as_str).collect::<Vec<_>>(),
            ["nominal", "systdown", "systup"]
        );
    }

    #[test]
    fn clamped_or_unbinned_inputs_are_unbounded() {
        let c = correction(json!({
            "name": "jer",
            "inputs": [{"name": "eta", "type": "real"}, {"name": "rho", "type": "real"}],
            "data": {
                "nodetype": "binning", "input": "eta",
                "edges": [-5.0, 0.0, 5.0], "content": [1.0, 1.0], "flow": "clamp"
            }
        }));
        let stats = collect(&c);
        assert!(stats["eta"].was_binned());
        assert!(stats["eta"].overflow);
        assert!(!stats["rho"].was_binned());

        for spec in variable_specs(&c) {
            assert_eq!((spec.min, spec.max), (f64::NEG_INFINITY, f64::INFINITY), "{}", spec.name);
        }
    }

    #[test]
    fn transformed_inputs_are_unbounded() {
        let c = correction(json!({
            "name": "t",
            "inputs": [{"name": "x", "type": "real"}],
            "data": {
                "nodetype": "transform", "input": "x",
                "rule": {"nodetype": "formula", "expression": "abs(x)", "parser": "TFormula", "variables": ["x"]},
                "content": {
                    "nodetype": "binning", "input": "x",
                    "edges": [0.0, 2.5], "content": [1.0], "flow": "error"
                }
            }
        }));
        let stats = collect(&c);
        assert!(stats["x"].transformed);
        assert_eq!(stats["x"].bounds(), (f64::NEG_INFINITY, f64::INFINITY));
    }

    #[test]
    fn summary_serializes_infinite_bounds_as_null() {
        let summary = summarize(&muon_sf());
        let v = serde_json::to_value(&summary).unwrap();
        assert_eq!(v["content"], "binned");
        assert_eq!(v["inputs"][0]["max"], 2.4);
        assert!(v["inputs"][1]["max"].is_null());
        assert_eq!(v["inputs"][2]["values"][0], "nominal");
    }
}
