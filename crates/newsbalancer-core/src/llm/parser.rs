//! Parsing of model responses into verdicts.
//!
//! Models are prompted to emit a bare JSON object but routinely wrap it in
//! prose or code fences, quote the numbers, or omit fields. The parser
//! tolerates all of that: it extracts the first balanced JSON object from
//! the text and clamps values into range. A missing or non-numeric score
//! yields the invalid verdict, never an error.

use super::ModelVerdict;

/// Parse a model's text response into a verdict.
pub fn parse_verdict(text: &str) -> ModelVerdict {
    let Some(object) = extract_json_object(text) else {
        return ModelVerdict::invalid();
    };

    let Ok(value) = serde_json::from_str::<serde_json::Value>(object) else {
        return ModelVerdict::invalid();
    };

    let score = value.get("score").and_then(as_number);
    let confidence = value
        .get("confidence")
        .and_then(as_number)
        .unwrap_or(0.0)
        .clamp(0.0, 1.0);

    match score {
        Some(s) if s.is_finite() => ModelVerdict {
            score: Some(s.clamp(-1.0, 1.0)),
            confidence,
        },
        _ => ModelVerdict::invalid(),
    }
}

/// Accept plain numbers and numeric strings.
fn as_number(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Slice the first balanced JSON object out of free-form text.
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &b) in bytes[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }

        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_json() {
        let verdict = parse_verdict(r#"{"score": -0.6, "confidence": 0.8}"#);
        assert_eq!(verdict.score, Some(-0.6));
        assert_eq!(verdict.confidence, 0.8);
    }

    #[test]
    fn parses_json_wrapped_in_prose_and_fences() {
        let text = "Sure! Here is my rating:\n```json\n{\"score\": 0.4, \"confidence\": 0.7}\n```\nLet me know.";
        let verdict = parse_verdict(text);
        assert_eq!(verdict.score, Some(0.4));
        assert_eq!(verdict.confidence, 0.7);
    }

    #[test]
    fn accepts_quoted_numbers() {
        let verdict = parse_verdict(r#"{"score": "-0.25", "confidence": "0.9"}"#);
        assert_eq!(verdict.score, Some(-0.25));
        assert_eq!(verdict.confidence, 0.9);
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let verdict = parse_verdict(r#"{"score": -3.5, "confidence": 1.8}"#);
        assert_eq!(verdict.score, Some(-1.0));
        assert_eq!(verdict.confidence, 1.0);
    }

    #[test]
    fn missing_score_is_invalid() {
        let verdict = parse_verdict(r#"{"confidence": 0.9}"#);
        assert_eq!(verdict, ModelVerdict::invalid());
    }

    #[test]
    fn non_numeric_score_is_invalid() {
        let verdict = parse_verdict(r#"{"score": "leaning left", "confidence": 0.9}"#);
        assert_eq!(verdict, ModelVerdict::invalid());
    }

    #[test]
    fn missing_confidence_defaults_to_zero() {
        let verdict = parse_verdict(r#"{"score": 0.2}"#);
        assert_eq!(verdict.score, Some(0.2));
        assert_eq!(verdict.confidence, 0.0);
    }

    #[test]
    fn no_json_object_is_invalid() {
        assert_eq!(parse_verdict("the article leans left"), ModelVerdict::invalid());
        assert_eq!(parse_verdict(""), ModelVerdict::invalid());
        assert_eq!(parse_verdict("{unbalanced"), ModelVerdict::invalid());
    }

    #[test]
    fn braces_inside_strings_do_not_confuse_extraction() {
        let text = r#"{"note": "uses {braces}", "score": 0.1, "confidence": 0.5}"#;
        let verdict = parse_verdict(text);
        assert_eq!(verdict.score, Some(0.1));
    }
}
