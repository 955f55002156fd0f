//! Pure rendering of a [`CorrectionDef`] into a C source unit.
//!
//! Layout, top to bottom: include guard, includes, one `typedef enum` per
//! enumerated input (registration order), the description comment, the
//! signature, one range guard per numeric input (registration order), the
//! evaluation body, then the closing `#endif`.
use crate::content::BodyRegistry;
use crate::emitter::CorrectionDef;
use crate::error::Result;
use crate::variable::{Bounds, VarKind, VariableDescriptor};

const INDENT: &str = "    ";

/// Line-oriented source buffer.
#[derive(Default)]
pub struct Codegen {
    out: String,
    depth: usize,
}

impl Codegen {
    pub fn new() -> Self {
        Self::default()
    }

    fn line(&mut self, text: &str) {
        for _ in 0..self.depth {
            self.out.push_str(INDENT);
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn blank(&mut self) {
        self.out.push('\n');
    }

    fn indented(&mut self, f: impl FnOnce(&mut Self)) {
        self.depth += 1;
        f(self);
        self.depth -= 1;
    }

    pub fn emit(&mut self, def: &CorrectionDef, bodies: &BodyRegistry) -> Result<()> {
        def.require_variables()?;

        let guard_macro = include_guard(def.name());
        self.line(&format!("#ifndef {guard_macro}"));
        self.line(&format!("#define {guard_macro}"));
        self.blank();

        for header in def.target().includes() {
            self.line(&format!("#include <{header}>"));
        }
        self.blank();

        for (type_name, enumerators) in enum_declarations(def) {
            self.line("typedef enum {");
            self.indented(|cg| {
                let last = enumerators.len() - 1;
                for (i, member) in enumerators.iter().enumerate() {
                    let sep = if i == last { "" } else { "," };
                    cg.line(&format!("{member}{sep}"));
                }
            });
            self.line(&format!("}} {type_name};"));
            self.blank();
        }

        if let Some(description) = def.description() {
            for line in description_comment(description) {
                self.line(&line);
            }
        }

        self.line(&format!(
            "{} float {}({}) {{",
            def.target().linkage(),
            def.name(),
            parameter_list(def)
        ));
        self.indented(|cg| {
            let guards = validation_block(def);
            for guard in &guards {
                cg.line(guard);
            }
            if !guards.is_empty() {
                cg.blank();
            }
            for stmt in bodies.get(def.content()).body(def) {
                cg.line(&stmt);
            }
        });
        self.line("}");
        self.blank();
        self.line(&format!("#endif /* {guard_macro} */"));
        Ok(())
    }

    pub fn into_string(self) -> String {
        self.out
    }
}

pub fn render(def: &CorrectionDef, bodies: &BodyRegistry) -> Result<String> {
    let mut cg = Codegen::new();
    cg.emit(def, bodies)?;
    Ok(cg.into_string())
}

// ------------------------------- Phases ----------------------------------- //

/// `(type name, enumerators)` per enumerated input, registration order.
pub fn enum_declarations(def: &CorrectionDef) -> Vec<(&str, &[String])> {
    def.variables()
        .filter_map(|v| match v.kind() {
            VarKind::Enumerated { type_name, enumerators, .. } => {
                Some((type_name.as_str(), enumerators.as_slice()))
            }
            _ => None,
        })
        .collect()
}

/// `calib_eta` → `CORRCC_CALIB_ETA_H`.
pub fn include_guard(correction_name: &str) -> String {
    format!("CORRCC_{}_H", correction_name.to_ascii_uppercase())
}

pub fn parameter_list(def: &CorrectionDef) -> String {
    def.variables()
        .map(|v| format!("{} {}", v.c_type(), v.name()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// One guard statement per numeric input, registration order.
pub fn validation_block(def: &CorrectionDef) -> Vec<String> {
    let fail = def.target().fail();
    def.variables()
        .filter_map(|v| match v.kind() {
            VarKind::Float(b) => Some(guard(v, *b, float_literal, fail)),
            VarKind::Int(b) if def.int_guards() => Some(guard(v, *b, int_literal, fail)),
            _ => None,
        })
        .collect()
}

fn guard(v: &VariableDescriptor, b: Bounds, literal: fn(f64) -> String, fail: &str) -> String {
    let name = v.name();
    format!(
        "if ({name} < {} || {name} > {}) {fail};",
        literal(b.min.0),
        literal(b.max.0),
    )
}

// ------------------------------ Literals ---------------------------------- //

/// Infinities become `<float.h>` limits; finite values keep a decimal point.
pub fn float_literal(x: f64) -> String {
    if x == f64::INFINITY {
        "FLT_MAX".to_string()
    } else if x == f64::NEG_INFINITY {
        "-FLT_MAX".to_string()
    } else {
        format!("{x:?}")
    }
}

/// Infinities become `<limits.h>` limits; integral values print without a fraction.
pub fn int_literal(x: f64) -> String {
    const EXACT: f64 = 9_007_199_254_740_992.0; // 2^53
    if x == f64::INFINITY {
        "INT_MAX".to_string()
    } else if x == f64::NEG_INFINITY {
        "INT_MIN".to_string()
    } else if x.fract() == 0.0 && x.abs() <= EXACT {
        format!("{}", x as i64)
    } else {
        format!("{x:?}")
    }
}

fn description_comment(description: &str) -> Vec<String> {
    let safe = description.replace("*/", "* /");
    let lines: Vec<&str> = safe.lines().collect();
    match lines.as_slice() {
        [single] => vec![format!("/* {} */", single.trim_end())],
        _ => {
            let mut out = vec!["/*".to_string()];
            out.extend(lines.iter().map(|l| format!(" * {l}").trim_end().to_string()));
            out.push(" */".to_string());
            out
        }
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emitter::CorrectionEmitter;
    use crate::target::Target;
    use crate::variable::{enum_type_name, VariableSpec};
    use pretty_assertions::assert_eq;

    #[test]
    fn single_float_end_to_end() {
        let mut e = CorrectionEmitter::new("calib_eta").unwrap();
        e.set_description(Some("eta calibration"));
        e.add_variable(VariableSpec::real("eta", -2.5, 2.5)).unwrap();
        e.add_content(crate::content::ContentShape::Binned).unwrap();

        let expected = "\
#ifndef CORRCC_CALIB_ETA_H
#define CORRCC_CALIB_ETA_H

#include <stdlib.h>
#include <float.h>
#include <limits.h>

/* eta calibration */
static inline float calib_eta(float eta) {
    if (eta < -2.5 || eta > 2.5) exit(-1);

    return 1.;
}

#endif /* CORRCC_CALIB_ETA_H */
";
        assert_eq!(e.emit().unwrap(), expected);
    }

    #[test]
    fn infinite_bounds_use_sentinels() {
        let mut e = CorrectionEmitter::new("c").unwrap();
        e.add_variable(VariableSpec::real("pt", f64::NEG_INFINITY, f64::INFINITY)).unwrap();
        e.add_variable(VariableSpec::int("run", f64::NEG_INFINITY, 10.0)).unwrap();
        let src = e.emit().unwrap();
        assert!(src.contains("if (pt < -FLT_MAX || pt > FLT_MAX) exit(-1);"));
        assert!(src.contains("if (run < INT_MIN || run > 10) exit(-1);"));
        assert!(!src.contains("inf"));
    }

    #[test]
    fn enum_only_correction_has_no_guards() {
        let mut e = CorrectionEmitter::new("X").unwrap();
        e.add_variable(VariableSpec::string("flavor", ["C", "A", "B"])).unwrap();
        e.add_variable(VariableSpec::string("syst", ["up", "down"])).unwrap();

        let def = e.definition();
        assert!(validation_block(def).is_empty());
        let flavor = enum_type_name("flavor", "X");
        let syst = enum_type_name("syst", "X");
        assert_eq!(parameter_list(def), format!("{flavor} flavor, {syst} syst"));

        let src = e.emit().unwrap();
        let expected_enum = format!("typedef enum {{\n    A,\n    B,\n    C\n}} {flavor};\n");
        assert!(src.contains(&expected_enum), "{src}");
        assert!(src.contains(&format!(
            "static inline float X({flavor} flavor, {syst} syst) {{\n    return 1.;\n}}"
        )));
    }

    #[test]
    fn guards_follow_registration_order_and_skip_enums() {
        let mut e = CorrectionEmitter::new("c").unwrap();
        e.add_variable(VariableSpec::real("pt", 15.0, 1000.0)).unwrap();
        e.add_variable(VariableSpec::string("syst", ["nom"])).unwrap();
        e.add_variable(VariableSpec::real("eta", -2.5, 2.5)).unwrap();
        e.set_target(Target::Cuda);
        assert_eq!(
            validation_block(e.definition()),
            [
                "if (pt < 15.0 || pt > 1000.0) assert(0);",
                "if (eta < -2.5 || eta > 2.5) assert(0);",
            ]
        );
    }

    #[test]
    fn int_guards_can_be_disabled() {
        let mut e = CorrectionEmitter::new("c").unwrap();
        e.set_int_guards(false);
        e.add_variable(VariableSpec::int("run", 1.0, 5.0)).unwrap();
        assert!(validation_block(e.definition()).is_empty());
    }

    #[test]
    fn unit_is_guarded_and_cuda_functions_live_on_device() {
        let mut e = CorrectionEmitter::new("jet_sf").unwrap();
        e.add_variable(VariableSpec::real("pt", 15.0, 1000.0)).unwrap();
        e.set_target(Target::Cuda);
        let src = e.emit().unwrap();

        assert_eq!(include_guard("jet_sf"), "CORRCC_JET_SF_H");
        assert!(src.starts_with("#ifndef CORRCC_JET_SF_H\n#define CORRCC_JET_SF_H\n\n"));
        assert!(src.ends_with("}\n\n#endif /* CORRCC_JET_SF_H */\n"));
        assert!(src.contains("static inline __device__ float jet_sf(float pt) {"));
    }

    #[test]
    fn description_cannot_close_comment_early() {
        assert_eq!(description_comment("a */ b"), ["/* a * / b */"]);
        assert_eq!(description_comment("first\nsecond"), ["/*", " * first", " * second", " */"]);
    }

    #[test]
    fn emission_is_deterministic() {
        let build = || {
            let mut e = CorrectionEmitter::new("X").unwrap();
            e.add_variable(VariableSpec::string("flavor", ["B", "C", "A"])).unwrap();
            e.add_variable(VariableSpec::real("pt", 0.0, 100.0)).unwrap();
            e.emit().unwrap()
        };
        assert_eq!(build(), build());
    }

    #[test]
    fn literals() {
        assert_eq!(float_literal(3.0), "3.0");
        assert_eq!(float_literal(f64::NEG_INFINITY), "-FLT_MAX");
        assert_eq!(int_literal(3.0), "3");
        assert_eq!(int_literal(-7.0), "-7");
        assert_eq!(int_literal(f64::INFINITY), "INT_MAX");
    }
}
