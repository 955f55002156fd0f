//! Incremental builder for one correction's native function.
//!
//! The builder only collects state; rendering lives in [`crate::codegen`] and
//! works from a shared borrow of the [`CorrectionDef`].
use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::codegen;
use crate::content::{BodyRegistry, ContentShape, EvaluationBody};
use crate::error::{Advisory, CorrcError, Result};
use crate::target::Target;
use crate::variable::{check_identifier, VarKind, VariableDescriptor, VariableSpec};
use crate::writer::{OutputWriter, WriteOutcome};

// ------------------------------- State ------------------------------------ //

#[derive(Debug, Clone)]
pub struct CorrectionDef {
    name: String,
    description: Option<String>,
    target: Target,
    /// registration order is parameter order
    variables: IndexMap<String, VariableDescriptor>,
    content: Option<ContentShape>,
    int_guards: bool,
}

impl CorrectionDef {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn target(&self) -> Target {
        self.target
    }

    pub fn content(&self) -> Option<ContentShape> {
        self.content
    }

    pub fn int_guards(&self) -> bool {
        self.int_guards
    }

    pub fn variables(&self) -> impl Iterator<Item = &VariableDescriptor> {
        self.variables.values()
    }

    pub fn variable(&self, name: &str) -> Option<&VariableDescriptor> {
        self.variables.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Advisories that apply to the unit as it would be emitted now.
    pub fn advisories(&self) -> Vec<Advisory> {
        self.variables()
            .filter(|v| matches!(v.kind(), VarKind::Int(_)) && !self.int_guards)
            .map(int_advisory)
            .collect()
    }

    pub(crate) fn require_variables(&self) -> Result<()> {
        if self.variables.is_empty() {
            return Err(CorrcError::NoVariablesRegistered { correction: self.name.clone() });
        }
        Ok(())
    }
}

// ------------------------------ Builder ----------------------------------- //

#[derive(Debug)]
pub struct CorrectionEmitter {
    def: CorrectionDef,
    bodies: BodyRegistry,
}

impl CorrectionEmitter {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        check_identifier("correction name", &name)?;
        Ok(Self {
            def: CorrectionDef {
                name,
                description: None,
                target: Target::default(),
                variables: IndexMap::new(),
                content: None,
                int_guards: true,
            },
            bodies: BodyRegistry::default(),
        })
    }

    pub fn set_target(&mut self, target: Target) -> &mut Self {
        self.def.target = target;
        self
    }

    /// Empty or absent descriptions leave the current one in place.
    pub fn set_description(&mut self, description: Option<&str>) -> &mut Self {
        if let Some(text) = description.filter(|s| !s.is_empty()) {
            self.def.description = Some(text.to_string());
        }
        self
    }

    /// Whether `int` inputs get range guards. Applies to variables already
    /// registered as well; see [`CorrectionDef::advisories`].
    pub fn set_int_guards(&mut self, enabled: bool) -> &mut Self {
        self.def.int_guards = enabled;
        for advisory in self.def.advisories() {
            warn!(correction = %self.def.name, "{advisory}");
        }
        self
    }

    /// Install a custom evaluation body for one payload shape.
    pub fn with_body(
        &mut self,
        shape: ContentShape,
        body: impl EvaluationBody + 'static,
    ) -> &mut Self {
        self.bodies.insert(shape, body);
        self
    }

    /// Build a descriptor from `spec` and register it, replacing any variable
    /// of the same name in place.
    pub fn add_variable(&mut self, spec: VariableSpec) -> Result<Option<Advisory>> {
        let descriptor = VariableDescriptor::new(&self.def.name, spec)?;
        self.check_enum_namespace(&descriptor)?;
        debug!(
            correction = %self.def.name,
            variable = descriptor.name(),
            kind = ?descriptor.kind(),
            "register variable"
        );

        let advisory = match descriptor.kind() {
            VarKind::Int(_) if !self.def.int_guards => {
                let advisory = int_advisory(&descriptor);
                warn!(correction = %self.def.name, "{advisory}");
                Some(advisory)
            }
            _ => None,
        };

        self.def.variables.insert(descriptor.name().to_string(), descriptor);
        Ok(advisory)
    }

    /// Enumerators and enum type names live in the file scope of the unit, so
    /// they must be unique across every other variable and the function name.
    fn check_enum_namespace(&self, incoming: &VariableDescriptor) -> Result<()> {
        let Some(type_name) = incoming.type_name() else {
            return Ok(());
        };
        let collision = |member: &String| CorrcError::EnumMemberCollision {
            name: incoming.name().to_string(),
            member: member.clone(),
        };

        if let Some(member) = incoming.enumerators().iter().find(|m| **m == self.def.name) {
            return Err(collision(member));
        }
        for other in self.def.variables().filter(|v| v.name() != incoming.name()) {
            if other.type_name() == Some(type_name) {
                return Err(CorrcError::TypeNameCollision {
                    name: incoming.name().to_string(),
                    other: other.name().to_string(),
                    type_name: type_name.to_string(),
                });
            }
            let taken = other.enumerators();
            if let Some(member) = incoming.enumerators().iter().find(|m| taken.contains(*m)) {
                return Err(collision(member));
            }
        }
        Ok(())
    }

    /// Record the payload shape. The shape only selects the evaluation body.
    pub fn add_content(&mut self, shape: ContentShape) -> Result<&mut Self> {
        self.def.require_variables()?;
        debug!(correction = %self.def.name, %shape, "content");
        self.def.content = Some(shape);
        Ok(self)
    }

    pub fn definition(&self) -> &CorrectionDef {
        &self.def
    }

    pub fn emit(&self) -> Result<String> {
        codegen::render(&self.def, &self.bodies)
    }

    /// Emit and persist. Consumes the builder: a correction is written once.
    pub fn save(self, writer: &OutputWriter) -> Result<WriteOutcome> {
        let source = self.emit()?;
        writer.write(&self.def.name, self.def.target, &source)
    }
}

fn int_advisory(v: &VariableDescriptor) -> Advisory {
    Advisory::UnimplementedIntegerValidation { variable: v.name().to_string() }
}

// ------------------------------- Tests ------------------------------------ //
