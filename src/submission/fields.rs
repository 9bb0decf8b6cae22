use serde_json::Value;

/// Field names declared on an endpoint (`fields` is a JSON array of names).
pub fn declared_names(fields: Option<&Value>) -> Vec<String> {
    fields
        .and_then(|f| f.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                .collect()
        })
        .unwrap_or_default()
}

/// Submitted field names not declared on the endpoint. Only consulted when
/// the endpoint is in strict mode.
pub fn unknown_fields(data: &Value, declared: &[String]) -> Vec<String> {
    let Some(obj) = data.as_object() else {
        return Vec::new();
    };
    obj.keys()
        .filter(|k| !declared.iter().any(|d| d == *k))
        .cloned()
        .collect()
}
