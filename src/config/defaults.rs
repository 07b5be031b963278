//! Built-in defaults (layer 1)

use cc_serialize::ParallelStreamConfig;
use serde::{Deserialize, Serialize};

use crate::analysis::StepFeature;

/// Built-in default configuration values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltinDefaults {
    /// Parallel output stream sizing (default: 4096 chunks of 4096 bytes, 30 minute timeout)
    pub parallel: ParallelStreamConfig,

    /// `Type.field` globs excluded from serialization (default: none)
    pub ignored_fields: Vec<String>,

    /// Enabled document check features (default: single-blocks)
    pub features: Vec<String>,

    /// Blocks that may appear at most once at the top level (default: plugins)
    pub single_blocks: Vec<String>,
}

impl Default for BuiltinDefaults {
    fn default() -> Self {
        Self {
            parallel: ParallelStreamConfig::default(),
            ignored_fields: Vec::new(),
            features: vec![StepFeature::SINGLE_BLOCKS.to_string()],
            single_blocks: vec!["plugins".to_string()],
        }
    }
}

impl BuiltinDefaults {
    /// Convert to JSON Value for merging
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "parallel": {
                "chunk_size": self.parallel.chunk_size,
                "max_chunks": self.parallel.max_chunks,
                "writer_timeout_seconds": self.parallel.writer_timeout_seconds
            },
            "beans": {
                "ignored_fields": self.ignored_fields
            },
            "analysis": {
                "features": self.features,
                "single_blocks": self.single_blocks
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let defaults = BuiltinDefaults::default();
        assert_eq!(defaults.parallel.chunk_size, 4096);
        assert_eq!(defaults.parallel.max_chunks, 4096);
        assert_eq!(defaults.parallel.writer_timeout_seconds, 1800);
        assert!(defaults.ignored_fields.is_empty());
        assert_eq!(defaults.single_blocks, vec!["plugins"]);
    }

    #[test]
    fn test_to_value() {
        let value = BuiltinDefaults::default().to_value();

        assert_eq!(value["parallel"]["chunk_size"], 4096);
        assert_eq!(value["analysis"]["features"][0], "single-blocks");
        assert!(value["analysis"].get("schema").is_none());
    }
}
