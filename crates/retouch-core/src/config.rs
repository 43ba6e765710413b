// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Application configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Top-level settings for the edit pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetouchConfig {
    /// Root directory for stored documents and extracted fonts.
    pub data_dir: PathBuf,
    /// Overlay (cover + insert) settings.
    pub overlay: OverlayConfig,
    /// Region rendering settings used by validation and repair.
    pub render: RenderConfig,
    /// Visual judgment oracle settings.
    pub oracle: OracleConfig,
}

/// Settings for the cover/insert step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Vertical inset (points) trimmed from the top and bottom of each cover.
    pub cover_inset: f32,
    /// Fraction of the font size used to approximate the descender when no
    /// baseline is supplied.
    pub descender_ratio: f32,
}

/// Settings for region rasterisation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Context (points) added around each edit rectangle.
    pub context_margin: f32,
    /// Render resolution in dots per inch.
    pub dpi: u32,
}

/// Settings for the OpenAI-compatible vision endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// API key. Validation is a no-op when this is absent.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Vision model name.
    pub model: String,
    /// Base URL of the API (without `/chat/completions`).
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Retries for transient failures (timeouts, 429, 5xx).
    pub max_retries: u32,
    /// Token budget for the verdict.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
}

impl Default for RetouchConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            overlay: OverlayConfig::default(),
            render: RenderConfig::default(),
            oracle: OracleConfig::default(),
        }
    }
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            cover_inset: 0.3,
            descender_ratio: 0.2,
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            context_margin: 30.0,
            dpi: 288,
        }
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gpt-4o".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            timeout_secs: 60,
            max_retries: 2,
            max_tokens: 1000,
            temperature: 0.1,
        }
    }
}

impl OracleConfig {
    /// Whether a usable credential is present.
    pub fn is_configured(&self) -> bool {
        self.api_key.as_deref().is_some_and(|key| !key.trim().is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

impl RetouchConfig {
    /// Defaults overlaid with values from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with values from an arbitrary key lookup.
    ///
    /// Unparseable numeric values are logged and ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(dir) = lookup("DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(key) = lookup("OPENAI_API_KEY").filter(|k| !k.trim().is_empty()) {
            config.oracle.api_key = Some(key);
        }
        if let Some(model) = lookup("OPENAI_VISION_MODEL") {
            config.oracle.model = model;
        }
        if let Some(url) = lookup("OPENAI_BASE_URL") {
            config.oracle.base_url = url;
        }
        if let Some(secs) = parse_var(&lookup, "RETOUCH_ORACLE_TIMEOUT_SECS") {
            config.oracle.timeout_secs = secs;
        }
        if let Some(retries) = parse_var(&lookup, "RETOUCH_ORACLE_RETRIES") {
            config.oracle.max_retries = retries;
        }
        if let Some(dpi) = parse_var(&lookup, "RETOUCH_RENDER_DPI") {
            config.render.dpi = dpi;
        }
        if let Some(margin) = parse_var(&lookup, "RETOUCH_CONTEXT_MARGIN") {
            config.render.context_margin = margin;
        }
        if let Some(inset) = parse_var(&lookup, "RETOUCH_COVER_INSET") {
            config.overlay.cover_inset = inset;
        }

        config
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparseable configuration value");
            None
        }
    }
}
