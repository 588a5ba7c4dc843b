use serde_json::{Map, Value};

use crate::core::errors::ApiError;

pub fn validate_config(config: &Value) -> Result<(), ApiError> {
    let root = config
        .as_object()
        .ok_or_else(|| config_type_error("root", "object"))?;

    if let Some(server) = expect_optional_object(root, "server")? {
        validate_optional_string_field(server, "server.host", "host")?;
        validate_u64_field(server, "server.port", "port", 0, 65_535)?;
        validate_string_array_field(
            server,
            "server.cors_allowed_origins",
            "cors_allowed_origins",
        )?;
    }

    if let Some(openai) = expect_optional_object(root, "openai")? {
        validate_optional_string_field(openai, "openai.base_url", "base_url")?;
        validate_optional_string_field(openai, "openai.api_key", "api_key")?;
        validate_optional_string_field(openai, "openai.embedding_model", "embedding_model")?;
        validate_optional_string_field(openai, "openai.chat_model", "chat_model")?;
        validate_u64_field(
            openai,
            "openai.embedding_dimensions",
            "embedding_dimensions",
            1,
            65_536,
        )?;
        validate_u64_field(openai, "openai.timeout_secs", "timeout_secs", 1, 86_400)?;
    }

    if let Some(rag) = expect_optional_object(root, "rag")? {
        validate_u64_field(rag, "rag.chunk_size", "chunk_size", 1, 1_000_000)?;
        validate_string_array_field(rag, "rag.sentence_terminators", "sentence_terminators")?;
        if let Some(terminators) = rag.get("sentence_terminators").and_then(|v| v.as_array()) {
            if terminators.is_empty() {
                return Err(ApiError::BadRequest(
                    "Invalid config at 'rag.sentence_terminators': at least one terminator is required"
                        .to_string(),
                ));
            }
            for (index, item) in terminators.iter().enumerate() {
                if item.as_str().map(|s| s.chars().count()) != Some(1) {
                    return Err(config_type_error(
                        &format!("rag.sentence_terminators[{}]", index),
                        "single character",
                    ));
                }
            }
        }
        validate_f64_field(
            rag,
            "rag.similarity_threshold",
            "similarity_threshold",
            -1.0,
            1.0,
        )?;
        validate_u64_field(rag, "rag.match_count", "match_count", 1, 10_000)?;
        validate_u64_field(
            rag,
            "rag.max_context_chunks",
            "max_context_chunks",
            1,
            1_000,
        )?;
        validate_u64_field(rag, "rag.search_limit", "search_limit", 1, 10_000)?;
        validate_u64_field(rag, "rag.embed_concurrency", "embed_concurrency", 1, 32)?;
    }

    if let Some(storage) = expect_optional_object(root, "storage")? {
        validate_optional_string_field(storage, "storage.bucket", "bucket")?;
        validate_optional_string_field(storage, "storage.root", "root")?;
    }

    if let Some(conversion) = expect_optional_object(root, "conversion")? {
        validate_optional_string_field(conversion, "conversion.endpoint", "endpoint")?;
        validate_u64_field(
            conversion,
            "conversion.timeout_secs",
            "timeout_secs",
            1,
            86_400,
        )?;
    }

    Ok(())
}

fn expect_optional_object<'a>(
    root: &'a Map<String, Value>,
    key: &str,
) -> Result<Option<&'a Map<String, Value>>, ApiError> {
    match root.get(key) {
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(Value::Null) | None => Ok(None),
        Some(_) => Err(config_type_error(key, "object")),
    }
}

fn validate_u64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: u64,
    max: u64,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(number) = value.as_u64() else {
        return Err(config_type_error(path, "integer"));
    };
    if number < min || number > max {
        return Err(ApiError::BadRequest(format!(
            "Invalid config at '{}': must be between {} and {}",
            path, min, max
        )));
    }
    Ok(())
}

fn validate_f64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: f64,
    max: f64,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(number) = value.as_f64() else {
        return Err(config_type_error(path, "number"));
    };
    if !(min..=max).contains(&number) {
        return Err(ApiError::BadRequest(format!(
            "Invalid config at '{}': must be between {} and {}",
            path, min, max
        )));
    }
    Ok(())
}

fn validate_optional_string_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    match section.get(key) {
        None | Some(Value::Null) | Some(Value::String(_)) => Ok(()),
        Some(_) => Err(config_type_error(path, "string")),
    }
}

fn validate_string_array_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(items) = value.as_array() else {
        return Err(config_type_error(path, "array of strings"));
    };
    for (index, item) in items.iter().enumerate() {
        let Some(text) = item.as_str() else {
            return Err(config_type_error(&format!("{}[{}]", path, index), "string"));
        };
        if text.trim().is_empty() {
            return Err(ApiError::BadRequest(format!(
                "Invalid config at '{}[{}]': value cannot be empty",
                path, index
            )));
        }
    }
    Ok(())
}

fn config_type_error(path: &str, expected: &str) -> ApiError {
    ApiError::BadRequest(format!(
        "Invalid config at '{}': expected {}",
        path, expected
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_empty_and_complete_configs() {
        assert!(validate_config(&json!({})).is_ok());
        assert!(validate_config(&json!({
            "server": { "host": "0.0.0.0", "port": 8000, "cors_allowed_origins": ["*"] },
            "openai": { "embedding_dimensions": 1536, "timeout_secs": 30 },
            "rag": {
                "chunk_size": 1000,
                "sentence_terminators": ["."],
                "similarity_threshold": 0.35,
                "match_count": 20,
                "max_context_chunks": 10,
                "embed_concurrency": 4
            },
            "conversion": { "endpoint": null }
        }))
        .is_ok());
    }

    #[test]
    fn rejects_threshold_outside_cosine_range() {
        let err = validate_config(&json!({ "rag": { "similarity_threshold": 1.5 } }))
            .unwrap_err();
        assert!(err.to_string().contains("rag.similarity_threshold"));
    }

    #[test]
    fn rejects_zero_sizes_and_bad_terminators() {
        assert!(validate_config(&json!({ "rag": { "chunk_size": 0 } })).is_err());
        assert!(validate_config(&json!({ "rag": { "embed_concurrency": 64 } })).is_err());
        assert!(validate_config(&json!({ "rag": { "sentence_terminators": [] } })).is_err());
        assert!(validate_config(&json!({ "rag": { "sentence_terminators": [".."] } })).is_err());
        assert!(validate_config(&json!({ "openai": { "embedding_dimensions": 0 } })).is_err());
    }

    #[test]
    fn rejects_wrong_section_types() {
        assert!(validate_config(&json!({ "rag": "fast" })).is_err());
        assert!(validate_config(&json!({ "server": { "cors_allowed_origins": [1] } })).is_err());
        assert!(validate_config(&json!([])).is_err());
    }
}
