//! TOML configuration.
//!
//! Values are resolved with the following priority (highest first):
//! 1. CLI flags (applied by the caller)
//! 2. `ANSWER_OVERLAY_BACKEND_URL`
//! 3. The TOML file (`answer-overlay.toml` unless `--config` says otherwise)
//! 4. Defaults
//!
//! ```toml
//! [backend]
//! base_url = "http://127.0.0.1:5000"
//! request_timeout_secs = 60
//! export_filename = "answers_with_feedback.docx"
//!
//! [layout]
//! columns = 72
//!
//! [[questions]]
//! id = "q1"
//! question = "What is your organisation's mission?"
//! context = "Short bullet points."
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ConfigError;
use crate::overlay::MonospaceMeasure;

pub const DEFAULT_CONFIG_FILE: &str = "answer-overlay.toml";
pub const BACKEND_URL_ENV: &str = "ANSWER_OVERLAY_BACKEND_URL";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    /// Fixed filename for exported answer documents.
    pub export_filename: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig {
            base_url: "http://127.0.0.1:5000".to_string(),
            connect_timeout_secs: 5,
            request_timeout_secs: 60,
            export_filename: "answers_with_feedback.docx".to_string(),
        }
    }
}

impl BackendConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub columns: usize,
    pub line_height: u32,
    pub padding: u32,
    /// Width of each progress-bar container.
    pub progress_width: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        LayoutConfig {
            columns: 80,
            line_height: 20,
            padding: 8,
            progress_width: 40.0,
        }
    }
}

impl LayoutConfig {
    pub fn measure(&self) -> MonospaceMeasure {
        MonospaceMeasure {
            columns: self.columns,
            line_height: self.line_height,
            padding: self.padding,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionConfig {
    pub id: String,
    #[serde(default)]
    pub question: String,
    /// Writing guidance sent along with every evaluation.
    #[serde(default)]
    pub context: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    pub backend: BackendConfig,
    pub layout: LayoutConfig,
    pub questions: Vec<QuestionConfig>,
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        OverlayConfig {
            backend: BackendConfig::default(),
            layout: LayoutConfig::default(),
            questions: default_questions(),
            source: None,
        }
    }
}

impl OverlayConfig {
    pub fn question(&self, id: &str) -> Option<&QuestionConfig> {
        self.questions.iter().find(|q| q.id == id)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.backend.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("backend.base_url is empty".into()));
        }
        if self.layout.columns == 0 {
            return Err(ConfigError::Invalid("layout.columns must be > 0".into()));
        }
        if self.layout.progress_width.is_nan() || self.layout.progress_width <= 0.0 {
            return Err(ConfigError::Invalid("layout.progress_width must be > 0".into()));
        }
        let mut seen = std::collections::HashSet::new();
        for q in &self.questions {
            if q.id.trim().is_empty() {
                return Err(ConfigError::Invalid("question with empty id".into()));
            }
            if !seen.insert(q.id.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate question id '{}'", q.id)));
            }
        }
        Ok(())
    }
}

/// The three grant-proposal prompts the answer form ships with.
pub fn default_questions() -> Vec<QuestionConfig> {
    vec![
        QuestionConfig {
            id: "q1".into(),
            question: "What is your organisation's mission and core value proposition?".into(),
            context: "The text provided by the user should be short and concise, focusing on \
                      the mission and the values in bullet point-style."
                .into(),
        },
        QuestionConfig {
            id: "q2".into(),
            question: "What are the problem(s) your project is trying to address? Give a clear \
                       context and show why your project is relevant."
                .into(),
            context: "The text provided by the user should be clear and demonstrate relevance. \
                      It should not be too long, and should adhere to a free text format."
                .into(),
        },
        QuestionConfig {
            id: "q3".into(),
            question: "What is the project goal?".into(),
            context: "The text provided by the user should have clear points it addresses, with \
                      separate paragraphs for each goal, numbering goals evidently. It should \
                      not elaborate too much."
                .into(),
        },
    ]
}

/// Load from `path`, or from [`DEFAULT_CONFIG_FILE`] when `None`.
///
/// A missing file is not an error. An explicitly named file that is missing
/// is.
pub fn load_config(path: Option<&Path>) -> Result<OverlayConfig, ConfigError> {
    let (config_path, explicit) = match path {
        Some(p) => (p.to_path_buf(), true),
        None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
    };

    let mut config = if config_path.exists() || explicit {
        let content = std::fs::read_to_string(&config_path).map_err(|e| ConfigError::Read {
            path: config_path.clone(),
            source: e,
        })?;
        let mut parsed: OverlayConfig = toml::from_str(&content)?;
        parsed.source = Some(config_path.clone());
        info!(path = %config_path.display(), "loaded configuration from file");
        parsed
    } else {
        debug!(path = %config_path.display(), "config file not found, using defaults");
        OverlayConfig::default()
    };

    if let Ok(url) = std::env::var(BACKEND_URL_ENV) {
        if !url.trim().is_empty() {
            config.backend.base_url = url;
        }
    }

    config.validate()?;
    Ok(config)
}
