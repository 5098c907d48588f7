// Prompt construction and model-response parsing for store-info extraction.

use crate::types::StoreCandidate;

/// Outcome of interpreting one model response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedExtraction {
    /// The response was a JSON object with the expected keys.
    Parsed(StoreCandidate),
    /// The response could not be read as a store-info object.
    Malformed { reason: String },
}

impl ParsedExtraction {
    /// Collapse to a candidate; malformed responses become the null pair.
    pub fn into_candidate(self) -> StoreCandidate {
        match self {
            Self::Parsed(candidate) => candidate,
            Self::Malformed { .. } => StoreCandidate::empty(),
        }
    }
}

/// Build the extraction prompt for one caption.
///
/// Captions are Japanese, so the instructions are too. Addresses are only
/// taken from a `【住所】`-style marker.
pub fn build_prompt(caption: &str) -> String {
    format!(
        r#"以下のInstagramの投稿文から店舗名と住所を抽出してください。
店舗名と住所が明記されている場合のみ抽出し、JSONフォーマットで返してください。
住所は「【住所】」などの記載があるもののみ抽出してください。

投稿文:
{caption}

出力形式:
{{"store_name": "店舗名", "address": "住所"}}

店舗名や住所が見つからない場合は:
{{"store_name": null, "address": null}}
"#
    )
}

/// Remove Markdown code-fence markers wherever they occur.
pub fn strip_code_fences(text: &str) -> String {
    text.trim()
        .replace("```json", "")
        .replace("```JSON", "")
        .replace("```", "")
        .trim()
        .to_string()
}

/// Interpret a raw model response as a [`StoreCandidate`].
///
/// Values that are not non-empty strings count as absent. An object with
/// neither expected key, a non-object value, or unparseable text is
/// [`ParsedExtraction::Malformed`].
pub fn parse_model_response(text: &str) -> ParsedExtraction {
    let cleaned = strip_code_fences(text);
    if cleaned.is_empty() {
        return ParsedExtraction::Malformed {
            reason: "empty response".to_string(),
        };
    }

    let value: serde_json::Value = match serde_json::from_str(&cleaned) {
        Ok(v) => v,
        Err(e) => {
            return ParsedExtraction::Malformed {
                reason: format!("not JSON: {e}"),
            };
        }
    };

    let Some(object) = value.as_object() else {
        return ParsedExtraction::Malformed {
            reason: format!("expected a JSON object, got {}", json_kind(&value)),
        };
    };

    if !object.contains_key("store_name") && !object.contains_key("address") {
        return ParsedExtraction::Malformed {
            reason: "object has neither store_name nor address".to_string(),
        };
    }

    ParsedExtraction::Parsed(StoreCandidate {
        store_name: string_field(object, "store_name"),
        address: string_field(object, "address"),
    })
}

fn string_field(object: &serde_json::Map<String, serde_json::Value>, key: &str) -> Option<String> {
    object
        .get(key)
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
