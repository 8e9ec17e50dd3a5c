use serde_json::Value;

/// Routing-relevant metadata pulled out of a GenAI request's
/// `generationConfig` object without requiring a full JSON parse of a
/// multi-megabyte body (spec §4.1's large-payload scanner). Advisory only:
/// nothing downstream treats a scan miss as an error.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ScannedMetadata {
    pub response_modalities: Vec<String>,
    pub has_speech_config: bool,
}

/// Extracts `generationConfig.{responseModalities,speechConfig}` from
/// `body`. Tries a direct lookup over the first `prefetch` bytes first (the
/// common case: `generationConfig` appears before a large `contents`
/// array); on miss — the window ends mid-value, so the key wasn't found
/// within it — falls back to scanning the full buffer. Both passes walk the
/// JSON byte-by-byte and only allocate for the matched key's value, never
/// for the rest of the object (notably a multi-MiB `contents` array).
pub fn scan(body: &[u8], prefetch: usize) -> Option<ScannedMetadata> {
    let window_end = prefetch.min(body.len());
    if let Some(raw) = scan_top_level_key(&body[..window_end], b"generationConfig") {
        if let Some(meta) = metadata_from_bytes(raw) {
            return Some(meta);
        }
    }
    if window_end >= body.len() {
        return None;
    }
    let raw = scan_top_level_key(body, b"generationConfig")?;
    metadata_from_bytes(raw)
}

fn metadata_from_bytes(raw: &[u8]) -> Option<ScannedMetadata> {
    let value: Value = serde_json::from_slice(raw).ok()?;
    Some(metadata_from_value(&value))
}

fn metadata_from_value(cfg: &Value) -> ScannedMetadata {
    let response_modalities = cfg
        .get("responseModalities")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default();
    let has_speech_config = cfg.get("speechConfig").is_some();
    ScannedMetadata {
        response_modalities,
        has_speech_config,
    }
}

/// Walks a top-level JSON object looking for `target_key`, skipping every
/// other key's value without parsing it into a tree. Returns the raw byte
/// span of `target_key`'s value once found. Returns `None` on anything it
/// can't resolve within `input` — malformed JSON, or (the common case for
/// the prefetch-window pass) a value that runs past the end of the slice.
fn scan_top_level_key<'a>(input: &'a [u8], target_key: &[u8]) -> Option<&'a [u8]> {
    let mut i = skip_ws(input, 0);
    if i >= input.len() || input[i] != b'{' {
        return None;
    }
    i = skip_ws(input, i + 1);
    loop {
        if i >= input.len() {
            return None;
        }
        if input[i] == b'}' {
            return None;
        }
        if input[i] != b'"' {
            return None;
        }
        let (key, next) = read_string(input, i)?;
        i = skip_ws(input, next);
        if i >= input.len() || input[i] != b':' {
            return None;
        }
        i = skip_ws(input, i + 1);
        let (value_span, next) = read_value_span(input, i)?;
        if key == target_key {
            return Some(value_span);
        }
        i = skip_ws(input, next);
        match input.get(i) {
            Some(b',') => i = skip_ws(input, i + 1),
            Some(b'}') => return None,
            _ => return None,
        }
    }
}

fn skip_ws(input: &[u8], mut i: usize) -> usize {
    while i < input.len() && matches!(input[i], b' ' | b'\t' | b'\n' | b'\r') {
        i += 1;
    }
    i
}

/// Reads a JSON string starting at `input[start]` (`"`). Escapes are left
/// intact in the returned span — callers only compare key names against
/// ASCII literals, so unescaping isn't needed.
fn read_string(input: &[u8], start: usize) -> Option<(&[u8], usize)> {
    let mut i = start + 1;
    while i < input.len() {
        match input[i] {
            b'\\' => i += 2,
            b'"' => return Some((&input[start + 1..i], i + 1)),
            _ => i += 1,
        }
    }
    None
}

/// Returns the byte span of one JSON value (string/object/array/number/
/// atom) starting at `input[start]`, and the index just past it.
fn read_value_span(input: &[u8], start: usize) -> Option<(&[u8], usize)> {
    match input.get(start)? {
        b'"' => {
            let (_, end) = read_string(input, start)?;
            Some((&input[start..end], end))
        }
        b'{' | b'[' => {
            let open = input[start];
            let close = if open == b'{' { b'}' } else { b']' };
            let mut depth = 0usize;
            let mut i = start;
            while i < input.len() {
                match input[i] {
                    b'"' => {
                        let (_, next) = read_string(input, i)?;
                        i = next;
                        continue;
                    }
                    c if c == open => depth += 1,
                    c if c == close => {
                        depth -= 1;
                        if depth == 0 {
                            return Some((&input[start..=i], i + 1));
                        }
                    }
                    _ => {}
                }
                i += 1;
            }
            None
        }
        b't' => match_literal(input, start, b"true").map(|end| (&input[start..end], end)),
        b'f' => match_literal(input, start, b"false").map(|end| (&input[start..end], end)),
        b'n' => match_literal(input, start, b"null").map(|end| (&input[start..end], end)),
        _ => {
            let mut i = start;
            while i < input.len() && matches!(input[i], b'0'..=b'9' | b'-' | b'+' | b'.' | b'e' | b'E') {
                i += 1;
            }
            if i == start {
                None
            } else {
                Some((&input[start..i], i))
            }
        }
    }
}

fn match_literal(input: &[u8], start: usize, lit: &[u8]) -> Option<usize> {
    if input.len() >= start + lit.len() && &input[start..start + lit.len()] == lit {
        Some(start + lit.len())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_generation_config_before_large_contents_array() {
        let contents = "x".repeat(200_000);
        let body = format!(
            r#"{{"generationConfig":{{"responseModalities":["TEXT","AUDIO"]}},"contents":"{contents}"}}"#
        );
        let meta = scan(body.as_bytes(), 64).unwrap();
        assert_eq!(meta.response_modalities, vec!["TEXT", "AUDIO"]);
        assert!(!meta.has_speech_config);
    }

    #[test]
    fn finds_generation_config_after_large_contents_array() {
        let contents = "x".repeat(200_000);
        let body = format!(
            r#"{{"contents":"{contents}","generationConfig":{{"responseModalities":["TEXT"],"speechConfig":{{"voice":"a"}}}}}}"#
        );
        let meta = scan(body.as_bytes(), 1024).unwrap();
        assert_eq!(meta.response_modalities, vec!["TEXT"]);
        assert!(meta.has_speech_config);
    }

    #[test]
    fn before_and_after_placement_agree() {
        let contents = "y".repeat(50_000);
        let before = format!(
            r#"{{"generationConfig":{{"responseModalities":["IMAGE"]}},"contents":"{contents}"}}"#
        );
        let after = format!(
            r#"{{"contents":"{contents}","generationConfig":{{"responseModalities":["IMAGE"]}}}}"#
        );
        assert_eq!(scan(before.as_bytes(), 128), scan(after.as_bytes(), 128));
    }

    #[test]
    fn missing_generation_config_returns_none() {
        let body = br#"{"contents":"hello"}"#;
        assert!(scan(body, 64).is_none());
    }

    #[test]
    fn tolerates_escaped_quotes_inside_preceding_string_values() {
        let body = br#"{"note":"a \"quoted\" value","generationConfig":{"responseModalities":["TEXT"]}}"#;
        let meta = scan(body, 1024).unwrap();
        assert_eq!(meta.response_modalities, vec!["TEXT"]);
    }

    #[test]
    fn scan_does_not_mutate_input() {
        let body = br#"{"generationConfig":{"responseModalities":["TEXT"]},"contents":[1,2,3]}"#;
        let before = body.to_vec();
        let _ = scan(body, 16);
        assert_eq!(body.to_vec(), before);
    }
}
