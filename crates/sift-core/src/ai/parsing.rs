//! JSON parsing helpers for AI backend responses
//!
//! Models often wrap the JSON payload in prose or markdown fences. Everything
//! that scans free text for JSON lives here.

use crate::error::{Error, Result};

use super::types::{KeywordResponse, ModelResponse};

/// Find the first balanced `{...}` object in free text
///
/// Braces inside JSON strings (and escaped quotes) are skipped, so a
/// reasoning string like `"uses {curly} words"` doesn't end the object early.
pub fn extract_json_object(response: &str) -> Option<&str> {
    let start = response.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in response[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&response[start..start + i + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }

    None
}

/// Parse a categorization answer from model text
///
/// Fails when there is no JSON object, the JSON is invalid, or either
/// `prediction` or `alternatives` is missing.
pub fn parse_model_response(response: &str) -> Result<ModelResponse> {
    let json_str = extract_json_object(response.trim()).ok_or_else(|| {
        Error::InvalidData(format!(
            "No JSON found in AI response | Raw: {}",
            truncate(response, 200)
        ))
    })?;

    serde_json::from_str(json_str).map_err(|e| {
        Error::InvalidData(format!(
            "Invalid categorization JSON from AI: {} | Raw: {}",
            e,
            truncate(json_str, 200)
        ))
    })
}

/// Parse a keyword refinement answer from model text
pub fn parse_keyword_response(response: &str) -> Result<Vec<String>> {
    let json_str = extract_json_object(response.trim())
        .ok_or_else(|| Error::InvalidData("No JSON found in AI keyword response".into()))?;

    let parsed: KeywordResponse = serde_json::from_str(json_str)
        .map_err(|e| Error::InvalidData(format!("Invalid keyword JSON from AI: {}", e)))?;

    Ok(parsed.keywords)
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_model_response() {
        let response = r#"{"prediction": {"category": "Food & Dining", "confidence": 88, "reasoning": "Coffee shop"}, "alternatives": [{"category": "Shopping", "confidence": 20, "reasoning": "Could be merchandise"}]}"#;
        let result = parse_model_response(response).unwrap();
        assert_eq!(result.prediction.category, "Food & Dining");
        assert_eq!(result.prediction.confidence, 88.0);
        assert_eq!(result.alternatives.len(), 1);
        assert_eq!(result.alternatives[0].category, "Shopping");
    }

    #[test]
    fn test_parse_model_response_with_prose_and_fences() {
        let response = r#"Sure! Here is my answer:
```json
{"prediction": {"category": "Salary", "confidence": 0.92, "reasoning": "Payroll deposit"}, "alternatives": []}
```
Let me know if you need anything else. {"not": "this one"}"#;
        let result = parse_model_response(response).unwrap();
        assert_eq!(result.prediction.category, "Salary");
        assert_eq!(result.prediction.confidence, 0.92);
        assert!(result.alternatives.is_empty());
    }

    #[test]
    fn test_parse_model_response_braces_in_strings() {
        let response = r#"{"prediction": {"category": "Shopping", "confidence": "70%", "reasoning": "matched {amazon} and \"prime\""}, "alternatives": []} trailing }"#;
        let result = parse_model_response(response).unwrap();
        assert_eq!(result.prediction.confidence, 70.0);
        assert_eq!(result.prediction.reasoning, r#"matched {amazon} and "prime""#);
    }

    #[test]
    fn test_parse_model_response_missing_alternatives() {
        let response = r#"{"prediction": {"category": "Shopping", "confidence": 60, "reasoning": "x"}}"#;
        assert!(parse_model_response(response).is_err());
    }

    #[test]
    fn test_parse_model_response_missing_prediction() {
        let response = r#"{"alternatives": []}"#;
        assert!(parse_model_response(response).is_err());
    }

    #[test]
    fn test_parse_model_response_no_json() {
        assert!(parse_model_response("I think this is groceries.").is_err());
        assert!(parse_model_response("").is_err());
    }

    #[test]
    fn test_parse_model_response_truncated() {
        let response = r#"{"prediction": {"category": "Shopping", "confidence": 60"#;
        assert!(parse_model_response(response).is_err());
    }

    #[test]
    fn test_parse_model_response_aliases() {
        let response = r#"{"prediction": {"name": "Travel", "confidence": 55, "reason": "Airline"}, "alternatives": [{"categoryName": "Transportation", "confidence": 30}]}"#;
        let result = parse_model_response(response).unwrap();
        assert_eq!(result.prediction.category, "Travel");
        assert_eq!(result.prediction.reasoning, "Airline");
        assert_eq!(result.alternatives[0].category, "Transportation");
        assert_eq!(result.alternatives[0].reasoning, "");
    }

    #[test]
    fn test_parse_keyword_response() {
        let response = r#"Keywords: {"keywords": ["coffee", "starbucks", "cafe"]}"#;
        let keywords = parse_keyword_response(response).unwrap();
        assert_eq!(keywords, vec!["coffee", "starbucks", "cafe"]);
    }

    #[test]
    fn test_extract_json_object_nested() {
        let text = r#"a {"x": {"y": 1}} b {"z": 2}"#;
        assert_eq!(extract_json_object(text), Some(r#"{"x": {"y": 1}}"#));
        assert_eq!(extract_json_object("no braces"), None);
        assert_eq!(extract_json_object("{ unclosed"), None);
    }
}
