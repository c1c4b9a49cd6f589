use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{Config, ConfigError};
use crate::fields::extractor::FieldExtractor;
use crate::fields::source::SourceClassifier;
use crate::models::{ModelInput, ModelRecord, Sections};
use crate::normalize::normalize;
use crate::record::{assemble, merge_sections};
use crate::region::resolver::resolve;
use crate::region::signals::SignalMatcher;

/// Per-model failures. They never abort the other models of a run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("model entry has no model_name")]
    MissingModelName,

    #[error("model '{0}' has no provider")]
    MissingProvider(String),
}

/// Result of one model in a batch, in input order.
#[derive(Debug)]
pub struct ModelOutcome {
    pub model_name: String,
    pub result: Result<ModelRecord, PipelineError>,
}

/// Validated configuration plus the matchers compiled from it.
#[derive(Debug)]
pub struct Pipeline {
    config: Config,
    signals: SignalMatcher,
    fields: FieldExtractor,
    sources: SourceClassifier,
}

impl Pipeline {
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        config.validate()?;
        let signals = SignalMatcher::new(&config.region)?;
        let fields = FieldExtractor::new(&config.sections)?;
        let sources = SourceClassifier::new(&config.sources);
        Ok(Pipeline {
            config,
            signals,
            fields,
            sources,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run every stage for one model over all of its pages.
    pub fn process(&self, input: &ModelInput) -> Result<ModelRecord, PipelineError> {
        if input.model_name.trim().is_empty() {
            return Err(PipelineError::MissingModelName);
        }
        if input.provider.trim().is_empty() {
            return Err(PipelineError::MissingProvider(input.model_name.clone()));
        }

        let mut signals = Vec::new();
        let mut sections = Sections::new();
        for page in &input.pages {
            let content = normalize(page);
            signals.extend(self.signals.extract(&content));

            let source = self.sources.attribute(&content);
            let extracted = self.fields.extract(&content, &source);
            merge_sections(&mut sections, &extracted);
        }

        let resolved = resolve(&signals, &input.provider, &self.config.region);
        debug!(
            model = %input.model_name,
            signals = signals.len(),
            scores = ?resolved.candidate_scores,
            "region candidates"
        );

        let record = assemble(input, resolved, sections, &self.config);
        info!(
            model = %record.model_name,
            provider = %record.provider,
            region = %record.resolved_region.region,
            method = %record.resolved_region.method,
            score = record.transparency_score.overall,
            "processed model"
        );
        Ok(record)
    }

    /// Process models in parallel. `on_done` runs once per model as it
    /// finishes; outcomes come back in input order.
    pub fn process_all<F>(&self, inputs: &[ModelInput], on_done: F) -> Vec<ModelOutcome>
    where
        F: Fn(&ModelOutcome) + Sync,
    {
        inputs
            .par_iter()
            .map(|input| {
                let outcome = ModelOutcome {
                    model_name: input.model_name.clone(),
                    result: self.process(input),
                };
                if let Err(e) = &outcome.result {
                    warn!(model = %input.model_name, error = %e, "model failed");
                }
                on_done(&outcome);
                outcome
            })
            .collect()
    }
}
