//! Typed view of the effective configuration.

use std::path::PathBuf;

use cc_serialize::ParallelStreamConfig;
use serde::{Deserialize, Serialize};

use super::effective::ConfigError;
use crate::analysis::{AnalysisSchema, AnalysisStepRunner, SchemaError, SingleBlockCheck, StepFeature};
use crate::beans::{IgnoredFields, TypeRegistry};
use crate::serialization::ConfigurationCache;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub parallel: ParallelStreamConfig,
    pub beans: BeanSettings,
    pub analysis: AnalysisSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BeanSettings {
    /// `Type.field` globs
    pub ignored_fields: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    /// TOML schema used when a command does not name one
    pub schema: Option<PathBuf>,
    pub features: Vec<String>,
    pub single_blocks: Vec<String>,
}

impl Settings {
    pub fn ignored_fields(&self) -> Result<IgnoredFields, ConfigError> {
        IgnoredFields::new(self.beans.ignored_fields.as_slice())
            .map_err(|e| ConfigError::ValidationError(format!("invalid ignored field pattern: {}", e)))
    }

    /// A cache over `registry` sized and filtered by these settings.
    pub fn configuration_cache(&self, registry: TypeRegistry) -> Result<ConfigurationCache, ConfigError> {
        Ok(ConfigurationCache::new(registry)
            .with_stream_config(self.parallel.clone())
            .with_ignored_fields(self.ignored_fields()?))
    }

    pub fn load_schema(&self) -> Result<Option<AnalysisSchema>, SchemaError> {
        self.analysis
            .schema
            .as_deref()
            .map(AnalysisSchema::load)
            .transpose()
    }

    /// A runner with the configured features and document checks.
    pub fn step_runner(&self, schema: Option<AnalysisSchema>) -> AnalysisStepRunner {
        let mut runner = AnalysisStepRunner::new(schema);
        for feature in &self.analysis.features {
            runner = runner.with_feature(StepFeature::new(feature.as_str()));
        }
        if !self.analysis.single_blocks.is_empty() {
            runner = runner.with_check(SingleBlockCheck::new(self.analysis.single_blocks.iter().cloned()));
        }
        runner
    }
}
