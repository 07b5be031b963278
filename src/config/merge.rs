//! Layer merging for configuration values.
//!
//! Tables merge key by key, everything else (lists included) is replaced by
//! the later layer.

use serde_json::Value;

/// Merges `overlay` into `target` in place.
pub fn merge_into(target: &mut Value, overlay: Value) {
    match (target, overlay) {
        (Value::Object(target_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match target_map.get_mut(&key) {
                    Some(existing) => merge_into(existing, value),
                    None => {
                        target_map.insert(key, value);
                    }
                }
            }
        }
        (target, overlay) => *target = overlay,
    }
}

/// Merges layers in order; the last layer has the highest precedence.
pub fn merge_layers(layers: impl IntoIterator<Item = Value>) -> Value {
    let mut merged = Value::Null;
    for layer in layers {
        merge_into(&mut merged, layer);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tables_merge_by_key() {
        let mut config = json!({"parallel": {"chunk_size": 8192, "max_chunks": 64}});
        merge_into(&mut config, json!({"parallel": {"max_chunks": 4}}));
        assert_eq!(config, json!({"parallel": {"chunk_size": 8192, "max_chunks": 4}}));
    }

    #[test]
    fn test_lists_are_replaced() {
        let mut config = json!({"analysis": {"features": ["single-blocks", "other"]}});
        merge_into(&mut config, json!({"analysis": {"features": []}}));
        assert_eq!(config["analysis"]["features"], json!([]));
    }

    #[test]
    fn test_scalar_replaces_table() {
        let mut config = json!({"beans": {"ignored_fields": []}});
        merge_into(&mut config, json!({"beans": false}));
        assert_eq!(config["beans"], false);
    }

    #[test]
    fn test_later_layers_win() {
        let merged = merge_layers([
            json!({"parallel": {"chunk_size": 8192, "writer_timeout_seconds": 30}, "analysis": {"single_blocks": ["plugins"]}}),
            json!({"parallel": {"chunk_size": 1024}}),
            json!({"analysis": {"single_blocks": ["plugins", "dependencies"]}}),
            json!({"parallel": {"chunk_size": 16}}),
        ]);
        assert_eq!(merged["parallel"]["chunk_size"], 16);
        assert_eq!(merged["parallel"]["writer_timeout_seconds"], 30);
        assert_eq!(merged["analysis"]["single_blocks"], json!(["plugins", "dependencies"]));
    }

    #[test]
    fn test_no_layers() {
        assert!(merge_layers(Vec::new()).is_null());
    }
}
