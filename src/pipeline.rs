//! Batch driver: schema corrections → emitter → writer.
//!
//! A failing correction is recorded and the batch moves on, unless
//! `fail_fast` is set.
use regex::Regex;
use tracing::{debug, error, info_span};

use crate::emitter::CorrectionEmitter;
use crate::error::{Advisory, CorrcError, Result};
use crate::schema::{summary, Correction};
use crate::target::Target;
use crate::writer::{FormatStatus, OutputWriter, WriteOutcome};

#[derive(Debug, Clone)]
pub struct GenerateSettings {
    pub target: Target,
    pub int_guards: bool,
    /// only corrections whose name matches are generated
    pub only: Option<Regex>,
    pub fail_fast: bool,
}

impl Default for GenerateSettings {
    fn default() -> Self {
        Self { target: Target::C, int_guards: true, only: None, fail_fast: false }
    }
}

#[derive(Debug)]
pub struct CorrectionReport {
    pub name: String,
    pub result: Result<WriteOutcome>,
    pub advisories: Vec<Advisory>,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub entries: Vec<CorrectionReport>,
    /// corrections filtered out by `only`
    pub skipped: usize,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.entries.iter().filter(|e| e.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.entries.len() - self.succeeded()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }
}

/// Register every input of `correction` and its content shape.
pub fn build_emitter(
    correction: &Correction,
    settings: &GenerateSettings,
) -> Result<(CorrectionEmitter, Vec<Advisory>)> {
    let mut emitter = CorrectionEmitter::new(&correction.name)?;
    emitter
        .set_target(settings.target)
        .set_int_guards(settings.int_guards)
        .set_description(correction.description.as_deref());

    for spec in summary::variable_specs(correction) {
        emitter.add_variable(spec)?;
    }
    emitter.add_content(correction.data.shape())?;
    let advisories = emitter.definition().advisories();
    Ok((emitter, advisories))
}

fn generate_one(
    correction: &Correction,
    settings: &GenerateSettings,
    writer: &OutputWriter,
) -> (Result<WriteOutcome>, Vec<Advisory>) {
    match build_emitter(correction, settings) {
        Ok((emitter, mut advisories)) => {
            let result = emitter.save(writer);
            if let Ok(WriteOutcome { status: FormatStatus::Raw(advisory), .. }) = &result {
                advisories.push(advisory.clone());
            }
            (result, advisories)
        }
        Err(error) => (Err(error), Vec::new()),
    }
}

pub fn generate<'a, I>(corrections: I, settings: &GenerateSettings, writer: &OutputWriter) -> BatchReport
where
    I: IntoIterator<Item = &'a Correction>,
{
    let mut report = BatchReport::default();
    for correction in corrections {
        if let Some(only) = &settings.only {
            if !only.is_match(&correction.name) {
                debug!(correction = %correction.name, "filtered out");
                report.skipped += 1;
                continue;
            }
        }

        let span = info_span!("correction", name = %correction.name);
        let _guard = span.enter();

        let (result, advisories) = generate_one(correction, settings, writer);
        let failed = result.is_err();
        if let Err(error) = &result {
            error!("{error}");
        }
        report.entries.push(CorrectionReport { name: correction.name.clone(), result, advisories });

        if failed && settings.fail_fast {
            break;
        }
    }
    report
}

/// Surface the first failure of a batch as an error value.
pub fn first_error(report: &BatchReport) -> Option<(&str, &CorrcError)> {
    report
        .entries
        .iter()
        .find_map(|e| e.result.as_ref().err().map(|err| (e.name.as_str(), err)))
}

// ------------------------------- Tests ------------------------------------ //
