//! Completion gateway trait and typed decoding.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;

use adforge_models::response_schema;

use crate::error::{CompletionError, CompletionResult};
use crate::types::{CompletionRequest, ContentPart};

/// A structured-output completion provider.
///
/// Implementations return parsed JSON or a typed error. They never return
/// `null` and never retry on their own.
#[async_trait]
pub trait CompletionGateway: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> CompletionResult<Value>;
}

/// Call the gateway with the schema of `T` and decode the response into `T`.
///
/// A response that parsed but does not decode is a schema violation.
pub async fn complete_typed<T>(
    gateway: &dyn CompletionGateway,
    parts: Vec<ContentPart>,
    max_output_tokens: u32,
) -> CompletionResult<T>
where
    T: DeserializeOwned + JsonSchema,
{
    let request = CompletionRequest::new(parts, response_schema::<T>(), max_output_tokens);
    let value = gateway.complete(request).await?;
    serde_json::from_value(value).map_err(|e| CompletionError::schema_violation(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use adforge_models::RankingResponse;
    use std::sync::Mutex;

    struct CannedGateway {
        value: Value,
        seen_schema: Mutex<Option<Value>>,
    }

    #[async_trait]
    impl CompletionGateway for CannedGateway {
        async fn complete(&self, request: CompletionRequest) -> CompletionResult<Value> {
            *self.seen_schema.lock().unwrap() = Some(request.response_schema);
            Ok(self.value.clone())
        }
    }

    fn gateway(value: Value) -> CannedGateway {
        CannedGateway {
            value,
            seen_schema: Mutex::new(None),
        }
    }

    #[tokio::test]
    async fn test_typed_decode_success() {
        let gw = gateway(serde_json::json!({
            "rankings": [{"index": 0, "roiScore": 71.0, "hookScore": 8.0, "ctaScore": 6.5, "reasons": []}]
        }));
        let decoded: RankingResponse = complete_typed(&gw, vec![ContentPart::text("x")], 256)
            .await
            .unwrap();
        assert_eq!(decoded.rankings.len(), 1);

        let schema = gw.seen_schema.lock().unwrap().clone().unwrap();
        assert!(schema["properties"]["rankings"].is_object());
    }

    #[tokio::test]
    async fn test_wrong_shape_is_schema_violation() {
        let gw = gateway(serde_json::json!({"rankings": "none"}));
        let err = complete_typed::<RankingResponse>(&gw, vec![], 256)
            .await
            .unwrap_err();
        assert!(matches!(err, CompletionError::SchemaViolation(_)));
    }
}
