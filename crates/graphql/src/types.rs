//! GraphQL type definitions.

use async_graphql::{EmptyMutation, EmptySubscription, Schema};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::schema::Query;

/// The spanscope GraphQL schema type.
pub type SpanscopeSchema = Schema<Query, EmptyMutation, EmptySubscription>;

/// Encode a Relay global id: base64 of `<type>:<rowid>`.
pub fn encode_global_id(type_name: &str, rowid: i64) -> String {
    STANDARD.encode(format!("{type_name}:{rowid}"))
}

/// Decode a Relay global id into its type name and row id.
///
/// Returns `None` for anything that is not base64 of `<type>:<integer>`.
pub fn decode_global_id(id: &str) -> Option<(String, i64)> {
    let bytes = STANDARD.decode(id).ok()?;
    let text = String::from_utf8(bytes).ok()?;
    let (type_name, rowid) = text.split_once(':')?;
    if type_name.is_empty() {
        return None;
    }
    Some((type_name.to_string(), rowid.parse().ok()?))
}
