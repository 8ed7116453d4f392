//! Embedded GraphQL documents.
//!
//! Query documents for the param-service API, embedded from
//! `resources/graphql/` at build time.

use rust_embed::RustEmbed;

use crate::errors::SchemaError;

#[derive(RustEmbed)]
#[folder = "resources/graphql/"]
struct SchemaFiles;

/// Read the embedded GraphQL document `<name>.graphql`
pub fn read_schema(name: &str) -> Result<String, SchemaError> {
    let path = format!("{}.graphql", name);
    let file = SchemaFiles::get(&path).ok_or_else(|| SchemaError::NotFound(name.to_string()))?;
    String::from_utf8(file.data.into_owned())
        .map_err(|_| SchemaError::InvalidEncoding(name.to_string()))
}
