//! Wire types for the indexed read model's GraphQL-shaped JSON POST protocol
//! (§6).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Serialize)]
pub struct GraphQlRequest {
    pub query: String,
    pub variables: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block: Option<BlockPin>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct BlockPin {
    pub number: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlResponse {
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlError {
    pub message: String,
}

/// Standard pagination page size (§4.A).
pub const PAGE_SIZE: u64 = 1000;

/// Builds the variables map for one paginated page. `first`/`skip` are
/// inserted last so a caller-supplied value under either key is always
/// overwritten (§4.A, §9 "Deterministic iteration"); callers never rely on
/// `Map`'s iteration order since it is serialized as a JSON object.
pub fn page_variables(base: &Value, first: u64, skip: u64) -> Value {
    let mut map: Map<String, Value> = base.as_object().cloned().unwrap_or_default();
    map.insert("first".to_string(), Value::from(first));
    map.insert("skip".to_string(), Value::from(skip));
    Value::Object(map)
}

/// Reassembles the accumulated rows from every page back into the single
/// `{ "data": { "<entityField>": [...] } }` shape the caller expects,
/// regardless of how many round trips pagination took (§4.A).
pub fn reassemble(entity_field: &str, rows: Vec<Value>) -> Value {
    let mut data = Map::new();
    data.insert(entity_field.to_string(), Value::Array(rows));
    Value::Object(data)
}
