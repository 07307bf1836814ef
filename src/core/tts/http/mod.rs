//! Generic HTTP engine (`#type: "http"`).
//!
//! The request is described by templates in the record:
//!
//! - `url`: placeholders are percent-encoded
//! - `body` (POST): placeholders are JSON-escaped when a `Content-Type`
//!   header mentions `json`, inserted raw otherwise
//!
//! Placeholders: `{{text}}`, `{{rate}}`, `{{volume}}`, `{{pitch}}`.
//!
//! The engine follows the system rate: `rate == 0` is replaced by the
//! context's system rate before substitution.

mod config;
mod provider;

pub use config::{Escape, HttpMethod, HttpTtsSettings, TemplateValues, render_template};
pub use provider::HttpTTS;

use crate::core::tts::registry::EngineConstructor;

/// Record tag of this engine.
pub const HTTP_TYPE: &str = "http";

inventory::submit! {
    EngineConstructor::new(HTTP_TYPE, "HTTP endpoint", provider::create_http_tts)
}
