use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{ContextMap, ModelParameters};

/// One variant per operation kind the gateway understands (spec §2.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    TextCompletion,
    ChatCompletion,
    Embedding,
    Speech,
    Transcription,
    Responses,
    ImageGeneration,
    ImageEdit,
    ListModels,
    FileUpload,
    BatchLifecycle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackTarget {
    pub provider: String,
    pub model: String,
}

/// Fields common to every request variant, per spec §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestHeader {
    pub provider: String,
    pub model: String,
    #[serde(default)]
    pub fallbacks: Vec<FallbackTarget>,
    #[serde(default)]
    pub params: ModelParameters,
    pub context: ContextMap,
}

/// The canonical request, tagged by operation kind. `body` carries the
/// operation-specific payload as an opaque JSON value: the schema layer does
/// not need to model every provider's field set, only route on `kind`. Each
/// provider adapter owns the typed decode of `body` for the kinds it
/// supports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub kind: OperationKind,
    #[serde(flatten)]
    pub header: RequestHeader,
    pub body: Value,
}

impl Request {
    pub fn is_streaming(&self) -> bool {
        self.body
            .get("stream")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}
