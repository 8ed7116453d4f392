//! Client for the param-service template store.
//!
//! Templates live behind a GraphQL endpoint. The query document is embedded
//! at build time (see [`crate::schema`]); this module only fills in the
//! variables and unwraps the response envelope.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::client::ClientHandle;
use crate::errors::ParamError;
use crate::schema::read_schema;

/// Path of the GraphQL endpoint, relative to the client's resolved base URL.
pub const GRAPHQL_PATH: &str = "/param/graphql";

const GET_TEMPLATE_SCHEMA: &str = "getTemplate";

pub type Result<T> = std::result::Result<T, ParamError>;

/// A notification template as stored in param-service. The service schema
/// uses Spanish field names on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    #[serde(rename = "nombre")]
    pub name: String,
    pub content: String,
    #[serde(rename = "autor", skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(rename = "activo", default)]
    pub active: bool,
}

/// GraphQL request envelope.
#[derive(Debug, Clone, Serialize)]
pub struct GraphqlRequest {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<Value>,
}

/// GraphQL response envelope. `data` and `errors` may both be present;
/// any reported error takes precedence over partial data.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphqlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphqlError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphqlError {
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
struct TemplateData {
    #[serde(default)]
    templates: Vec<Template>,
}

/// Fetches templates from param-service through an authenticated client.
pub struct ParamClient {
    handle: ClientHandle,
}

impl ParamClient {
    pub fn new(handle: ClientHandle) -> Self {
        Self { handle }
    }

    /// Look up a template by name. Returns `Ok(None)` when the service
    /// answers successfully but no template matches.
    pub async fn get_template(&self, name: &str) -> Result<Option<Template>> {
        let query = read_schema(GET_TEMPLATE_SCHEMA)?;
        let request = GraphqlRequest {
            query,
            variables: Some(json!({ "input": name })),
        };

        let response = self
            .handle
            .post(GRAPHQL_PATH)
            .json(&request)
            .send()
            .await?;

        let envelope: GraphqlResponse<TemplateData> = response
            .json()
            .await
            .map_err(|e| ParamError::Decode(e.to_string()))?;

        if !envelope.errors.is_empty() {
            let detail = envelope
                .errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            tracing::error!(template = name, error = %detail, "param-service rejected template query");
            return Err(ParamError::Graphql(detail));
        }

        let template = envelope
            .data
            .and_then(|data| data.templates.into_iter().next());
        Ok(template)
    }
}
