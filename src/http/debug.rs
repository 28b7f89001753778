use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::Value;

const MASK: &str = "***REDACTED***";
/// Header, JSON and form names whose values never reach stderr or the trace.
/// Covers the OpenAI bearer header and the Pushover application token and user key.
const SECRET_NAMES: [&str; 6] = [
    "authorization",
    "api_key",
    "openai_api_key",
    "token",
    "user",
    "x-api-key",
];
const DEFAULT_MAX_BODY_CHARS: usize = 4_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpDebugConfig {
    pub enabled: bool,
    pub redact_secrets: bool,
    pub max_body_chars: usize,
}

impl HttpDebugConfig {
    pub fn from_verbose(verbose: bool) -> Self {
        Self {
            enabled: verbose,
            redact_secrets: true,
            max_body_chars: DEFAULT_MAX_BODY_CHARS,
        }
    }

    pub fn disabled() -> Self {
        Self::from_verbose(false)
    }

    pub fn mask_header(&self, name: &str, value: &HeaderValue) -> String {
        if self.masks(name) {
            return MASK.to_string();
        }
        value
            .to_str()
            .map_or_else(|_| "<non-utf8>".to_string(), str::to_string)
    }

    /// Copy of `headers` with secret values swapped for the mask.
    pub fn mask_headers(&self, headers: &HeaderMap) -> HeaderMap {
        let mut masked = headers.clone();
        for (name, value) in masked.iter_mut() {
            if self.masks(name.as_str()) {
                *value = HeaderValue::from_static(MASK);
            }
        }
        masked
    }

    /// Masks secret members anywhere in a JSON document. Non-JSON text is
    /// returned unchanged.
    pub fn mask_json_body(&self, raw: &str) -> String {
        if !self.redact_secrets {
            return raw.to_string();
        }
        let Ok(mut json) = serde_json::from_str::<Value>(raw) else {
            return raw.to_string();
        };
        mask_json_members(&mut json);
        serde_json::to_string(&json).unwrap_or_else(|_| raw.to_string())
    }

    /// Renders form fields as `k=v&k=v`. Values are shown decoded.
    pub fn mask_form(&self, fields: &[(&str, &str)]) -> String {
        fields
            .iter()
            .map(|(name, value)| {
                let shown = if self.masks(name) { MASK } else { value };
                format!("{name}={shown}")
            })
            .collect::<Vec<_>>()
            .join("&")
    }

    pub fn clip(&self, body: &str) -> String {
        let count = body.chars().count();
        if count <= self.max_body_chars {
            return body.to_string();
        }
        let kept = body.chars().take(self.max_body_chars).collect::<String>();
        format!("{kept}... <truncated {} chars>", count - self.max_body_chars)
    }

    fn masks(&self, name: &str) -> bool {
        self.redact_secrets && is_secret_name(name)
    }
}

fn mask_json_members(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (name, member) in map {
                if is_secret_name(name) {
                    *member = Value::String(MASK.to_string());
                } else {
                    mask_json_members(member);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(mask_json_members),
        _ => {}
    }
}

fn is_secret_name(name: &str) -> bool {
    SECRET_NAMES
        .iter()
        .any(|secret| secret.eq_ignore_ascii_case(name))
}
