use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

/// One diagnosis candidate pulled out of the model's reply.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ExtractedDiagnosis {
    pub diagnosis: String,
    pub confidence: f32,
    #[serde(default)]
    pub reasoning: String,
}

/// Result of sanitizing one raw model reply.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub clean_text: String,
    pub diagnoses: Vec<ExtractedDiagnosis>,
}

static TRUNCATED_OBJECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)\{[^{}]*"(?:diagnos(?:is|es)|confidence|suggested_forms)"[^{}]*\z"#)
        .expect("truncated object pattern")
});

static TRUNCATED_ARRAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)\[[^\[\]]*"diagnosis"[^\[\]]*\z"#).expect("truncated array pattern")
});

static DIAGNOSIS_KEY_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""(?:diagnosis|diagnoses|confidence|reasoning|suggested_forms)"\s*:"#)
        .expect("key line pattern")
});

static PUNCTUATION_ONLY_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\s,:{}\[\]]+$").expect("punctuation line pattern"));

static DIAGNOSIS_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:possible|potential|probable)\s+diagnoses:").expect("heading pattern")
});

static ORPHAN_BRACKETS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\[{]\s*,?\s*[}\]]").expect("orphan bracket pattern"));

static EXCESS_BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("blank line pattern"));

/// Separate human-readable prose from the diagnosis payload the model
/// emits inline as JSON. Best-effort heuristic: malformed fragments are
/// skipped silently, and a cleanup that would leave the user with an
/// empty reply falls back to the original text.
pub fn extract_response(raw: &str) -> Extraction {
    let mut diagnoses = Vec::new();

    // Step 1: complete brace-delimited objects.
    let text = strip_parsed_spans(raw, '{', '}', &mut diagnoses, object_diagnoses);

    // Step 2: complete bracket-delimited arrays.
    let text = strip_parsed_spans(&text, '[', ']', &mut diagnoses, array_diagnoses);

    // Step 3: truncated fragments the model cut off mid-object.
    let text = TRUNCATED_OBJECT.replace(&text, "");
    let text = TRUNCATED_ARRAY.replace(&text, "");

    // Steps 4-6: line-level filters and punctuation cleanup.
    let kept: Vec<&str> = text
        .lines()
        .filter(|line| !DIAGNOSIS_KEY_LINE.is_match(line))
        .filter(|line| !PUNCTUATION_ONLY_LINE.is_match(line) || line.trim().is_empty())
        .filter(|line| !DIAGNOSIS_HEADING.is_match(line))
        .collect();
    let text = kept.join("\n");
    let text = ORPHAN_BRACKETS.replace_all(&text, "");
    let text = EXCESS_BLANK_LINES.replace_all(&text, "\n\n");
    let clean = text.trim().trim_end_matches(',').trim().to_string();

    // Never hand the user an empty reply because cleanup ate everything.
    let clean_text = if clean.is_empty() && !raw.trim().is_empty() {
        raw.trim().to_string()
    } else {
        clean
    };

    Extraction {
        clean_text,
        diagnoses,
    }
}

/// Find balanced delimiter spans, parse each as JSON, and remove the ones
/// the classifier recognizes. Unparseable or unrelated spans stay in the
/// visible text untouched.
fn strip_parsed_spans(
    text: &str,
    open: char,
    close: char,
    diagnoses: &mut Vec<ExtractedDiagnosis>,
    classify: fn(&Value) -> Option<Vec<ExtractedDiagnosis>>,
) -> String {
    let mut removed: Vec<(usize, usize)> = Vec::new();

    for (start, end) in balanced_spans(text, open, close) {
        let Ok(value) = serde_json::from_str::<Value>(&text[start..end]) else {
            continue;
        };
        if let Some(found) = classify(&value) {
            diagnoses.extend(found);
            removed.push((start, end));
        }
    }

    if removed.is_empty() {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for (start, end) in removed {
        out.push_str(&text[cursor..start]);
        cursor = end;
    }
    out.push_str(&text[cursor..]);
    out
}

/// Top-level balanced delimiter spans, skipping delimiters inside JSON
/// string literals.
fn balanced_spans(text: &str, open: char, close: char) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        if c == '"' && depth > 0 {
            in_string = true;
        } else if c == open {
            if depth == 0 {
                start = i;
            }
            depth += 1;
        } else if c == close && depth > 0 {
            depth -= 1;
            if depth == 0 {
                spans.push((start, i + c.len_utf8()));
            }
        }
    }

    spans
}

/// Objects with a `diagnoses`/`suggested_forms` key, or a bare single
/// diagnosis object.
fn object_diagnoses(value: &Value) -> Option<Vec<ExtractedDiagnosis>> {
    let obj = value.as_object()?;

    if obj.contains_key("diagnoses") || obj.contains_key("suggested_forms") {
        let found = obj
            .get("diagnoses")
            .and_then(Value::as_array)
            .map(|items| parse_items(items))
            .unwrap_or_default();
        return Some(found);
    }

    if obj.contains_key("diagnosis") && obj.contains_key("confidence") {
        return Some(parse_items(std::slice::from_ref(value)));
    }

    None
}

/// Arrays whose first element is a diagnosis object.
fn array_diagnoses(value: &Value) -> Option<Vec<ExtractedDiagnosis>> {
    let items = value.as_array()?;
    let first = items.first()?.as_object()?;
    if !first.contains_key("diagnosis") {
        return None;
    }
    Some(parse_items(items))
}

/// Lenient per-item parse: items that do not fit the shape are skipped.
fn parse_items(items: &[Value]) -> Vec<ExtractedDiagnosis> {
    items
        .iter()
        .filter_map(|item| serde_json::from_value::<ExtractedDiagnosis>(item.clone()).ok())
        .map(|mut d| {
            d.confidence = d.confidence.clamp(0.0, 1.0);
            d
        })
        .collect()
}
