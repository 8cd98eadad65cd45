//! Response schemas for structured completion calls.
//!
//! Schemas are derived from the Rust types that decode the response, so the
//! structural contract sent to the provider and the decoder can never drift.

use schemars::gen::SchemaSettings;
use schemars::JsonSchema;
use serde_json::Value;

/// Keywords the completion provider's schema dialect does not accept.
const UNSUPPORTED_KEYWORDS: &[&str] = &[
    "$schema",
    "$id",
    "definitions",
    "title",
    "format",
    "default",
    "additionalProperties",
    "uniqueItems",
];

/// Build the response schema for `T`, with subschemas inlined.
pub fn response_schema<T: JsonSchema>() -> Value {
    let settings = SchemaSettings::openapi3().with(|s| {
        s.inline_subschemas = true;
        s.meta_schema = None;
    });
    let root = settings.into_generator().into_root_schema_for::<T>();

    let mut value = serde_json::to_value(root).unwrap_or(Value::Null);
    strip_unsupported(&mut value);
    value
}

fn strip_unsupported(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for key in UNSUPPORTED_KEYWORDS {
                map.remove(*key);
            }
            for (key, child) in map.iter_mut() {
                if key == "properties" {
                    // Property names are user data, only their schemas are cleaned.
                    if let Value::Object(props) = child {
                        props.values_mut().for_each(strip_unsupported);
                    }
                } else {
                    strip_unsupported(child);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(strip_unsupported),
        _ => {}
    }
}
