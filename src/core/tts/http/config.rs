//! Settings and request templates of the generic HTTP engine.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::core::tts::base::{TTSError, TTSResult};
use crate::core::tts::provider::ResumeMode;

/// `{{text}}`, `{{rate}}`, `{{volume}}`, `{{pitch}}`, whitespace allowed inside the braces.
static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\s*(text|rate|volume|pitch)\s*\}\}").expect("placeholder pattern is valid")
});

/// HTTP method of the synthesis request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
}

/// Values substituted into the templates of one request.
#[derive(Debug, Clone, Copy)]
pub struct TemplateValues<'a> {
    pub text: &'a str,
    pub rate: i32,
    pub volume: i32,
    pub pitch: i32,
}

/// How substituted values are escaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escape {
    /// Percent-encoding valid in both path segments and query strings
    Url,
    /// JSON string escaping without the surrounding quotes
    Json,
    Raw,
}

impl Escape {
    fn apply(&self, value: &str) -> String {
        match self {
            // Literal '+' is already %2B, so every remaining '+' is a space
            Self::Url => url::form_urlencoded::byte_serialize(value.as_bytes())
                .collect::<String>()
                .replace('+', "%20"),
            Self::Json => {
                let quoted = serde_json::Value::String(value.to_string()).to_string();
                quoted[1..quoted.len() - 1].to_string()
            }
            Self::Raw => value.to_string(),
        }
    }
}

/// Replaces every known placeholder in `template`.
///
/// Unknown `{{...}}` sequences are left untouched.
pub fn render_template(template: &str, values: &TemplateValues<'_>, escape: Escape) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            let value = match &caps[1] {
                "text" => values.text.to_string(),
                "rate" => values.rate.to_string(),
                "volume" => values.volume.to_string(),
                _ => values.pitch.to_string(),
            };
            escape.apply(&value)
        })
        .into_owned()
}

/// Variant fields of an HTTP engine record.
///
/// ```json
/// {
///   "#type": "http",
///   "url": "http://localhost:5000/tts?text={{text}}&speed={{rate}}",
///   "method": "GET",
///   "headers": {"Authorization": "Bearer ..."},
///   "resume": "range"
/// }
/// ```
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct HttpTtsSettings {
    /// URL template
    pub url: String,
    #[serde(default)]
    pub method: HttpMethod,
    /// Body template, POST only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    /// Only set `replay` for endpoints with deterministic output
    #[serde(default)]
    pub resume: ResumeMode,
}

impl HttpTtsSettings {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_resume(mut self, resume: ResumeMode) -> Self {
        self.resume = resume;
        self
    }

    /// Whether the body template is rendered with JSON escaping.
    pub fn body_is_json(&self) -> bool {
        self.headers.iter().any(|(name, value)| {
            name.eq_ignore_ascii_case("content-type") && value.to_ascii_lowercase().contains("json")
        })
    }

    /// Checks the templates against sample values.
    pub fn validate(&self) -> TTSResult<()> {
        if self.url.trim().is_empty() {
            return Err(TTSError::InvalidConfiguration(
                "HTTP engine requires a url".to_string(),
            ));
        }
        let sample = TemplateValues {
            text: "sample",
            rate: 50,
            volume: 50,
            pitch: 50,
        };
        let rendered = render_template(&self.url, &sample, Escape::Url);
        let url = url::Url::parse(&rendered)
            .map_err(|e| TTSError::InvalidConfiguration(format!("invalid url template: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(TTSError::InvalidConfiguration(format!(
                "unsupported url scheme: {}",
                url.scheme()
            )));
        }
        if self.body.is_some() && self.method == HttpMethod::Get {
            return Err(TTSError::InvalidConfiguration(
                "a body template requires method POST".to_string(),
            ));
        }
        for (name, value) in &self.headers {
            reqwest::header::HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
                TTSError::InvalidConfiguration(format!("invalid header name: {name}"))
            })?;
            reqwest::header::HeaderValue::from_str(value).map_err(|_| {
                TTSError::InvalidConfiguration(format!("invalid value for header {name}"))
            })?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for HttpTtsSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Header values routinely carry credentials
        f.debug_struct("HttpTtsSettings")
            .field("url", &self.url)
            .field("method", &self.method)
            .field("body", &self.body)
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .field("resume", &self.resume)
            .finish()
    }
}
