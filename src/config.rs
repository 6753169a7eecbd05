use crate::llm::LlmConfig;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the chapter processing service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Pipeline and discovery settings
    pub pipeline: PipelineConfig,

    /// Audio extraction settings
    pub audio: AudioConfig,

    /// Speech engine settings
    pub transcription: TranscriptionConfig,

    /// Chapter synthesis settings
    pub synthesis: SynthesisConfig,

    /// Language model settings
    pub llm: LlmSection,

    /// Notification settings
    pub notification: NotificationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Video file extensions accepted for discovery
    pub supported_extensions: Vec<String>,

    /// Directory for per-video JSON snapshots (none = in-memory only)
    pub state_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Target sample rate for extracted audio
    pub sample_rate: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    /// Whisper model name (tiny, base, small, ...)
    pub model: String,

    /// Language hint; autodetected when unset
    pub language: Option<String>,

    /// Timeout for one engine invocation
    pub timeout_seconds: u64,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            model: "base".to_string(),
            language: None,
            timeout_seconds: 3600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisConfig {
    /// Character budget for the transcript embedded in the prompt
    pub transcript_char_budget: usize,

    /// How many timestamped segments to sample into the prompt
    pub segment_sample: usize,

    /// Window size for the deterministic fallback segmenter
    pub fallback_window_seconds: f64,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            transcript_char_budget: 12_000,
            segment_sample: 40,
            fallback_window_seconds: 300.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSection {
    /// When false the synthesizer runs fallback-only
    pub enabled: bool,

    #[serde(flatten)]
    pub config: LlmConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Webhook receiving terminal notifications; log-only when unset
    pub webhook_url: Option<String>,
}

impl Config {
    /// Load configuration from the usual file locations, falling back to
    /// environment variables.
    pub fn load() -> Result<Self> {
        let config_paths = [
            "autochapter.toml",
            "config/autochapter.toml",
            "/etc/autochapter/config.toml",
        ];

        for path in &config_paths {
            if let Ok(config_str) = std::fs::read_to_string(path) {
                match toml::from_str(&config_str) {
                    Ok(config) => {
                        tracing::info!("loaded configuration from {}", path);
                        return Ok(config);
                    }
                    Err(e) => {
                        tracing::warn!("failed to parse config file {}: {}", path, e);
                    }
                }
            }
        }

        Ok(Self::from_env())
    }

    /// Build configuration from defaults plus environment overrides.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(model) = std::env::var("AUTOCHAPTER_WHISPER_MODEL") {
            config.transcription.model = model;
        }
        if let Ok(sample_rate) = std::env::var("AUTOCHAPTER_SAMPLE_RATE") {
            if let Ok(rate) = sample_rate.parse() {
                config.audio.sample_rate = rate;
            }
        }
        if let Ok(endpoint) = std::env::var("AUTOCHAPTER_LLM_ENDPOINT") {
            config.llm.config.endpoint = Some(endpoint);
        }
        if let Ok(api_key) = std::env::var("AUTOCHAPTER_LLM_API_KEY") {
            config.llm.config.api_key = Some(api_key);
        }
        if let Ok(webhook) = std::env::var("AUTOCHAPTER_WEBHOOK_URL") {
            config.notification.webhook_url = Some(webhook);
        }
        if let Ok(state_dir) = std::env::var("AUTOCHAPTER_STATE_DIR") {
            config.pipeline.state_dir = Some(PathBuf::from(state_dir));
        }

        config
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &str) -> Result<()> {
        let config_str = toml::to_string_pretty(self)?;
        std::fs::write(path, config_str)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.audio.sample_rate == 0 {
            return Err(anyhow!("audio.sample_rate must be greater than 0"));
        }
        if self.synthesis.fallback_window_seconds <= 0.0 {
            return Err(anyhow!("synthesis.fallback_window_seconds must be positive"));
        }
        if self.synthesis.transcript_char_budget == 0 {
            return Err(anyhow!("synthesis.transcript_char_budget must be greater than 0"));
        }
        if self.pipeline.supported_extensions.is_empty() {
            return Err(anyhow!("pipeline.supported_extensions must not be empty"));
        }
        if self.llm.enabled && self.llm.config.endpoint.is_none() && self.llm.config.api_key.is_none()
        {
            return Err(anyhow!(
                "llm is enabled but neither endpoint nor api_key is configured"
            ));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig {
                supported_extensions: vec![
                    "mp4".to_string(),
                    "mkv".to_string(),
                    "avi".to_string(),
                    "mov".to_string(),
                    "webm".to_string(),
                    "m4v".to_string(),
                ],
                state_dir: None,
            },
            audio: AudioConfig { sample_rate: 16000 },
            transcription: TranscriptionConfig::default(),
            synthesis: SynthesisConfig::default(),
            llm: LlmSection {
                enabled: false,
                config: LlmConfig::default(),
            },
            notification: NotificationConfig { webhook_url: None },
        }
    }
}

/// Builder for programmatic configuration, used by tests and embedders.
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_whisper_model(mut self, model: impl Into<String>) -> Self {
        self.config.transcription.model = model.into();
        self
    }

    pub fn with_state_dir(mut self, dir: PathBuf) -> Self {
        self.config.pipeline.state_dir = Some(dir);
        self
    }

    pub fn with_llm(mut self, llm: LlmConfig) -> Self {
        self.config.llm = LlmSection {
            enabled: true,
            config: llm,
        };
        self
    }

    pub fn with_webhook(mut self, url: impl Into<String>) -> Self {
        self.config.notification.webhook_url = Some(url.into());
        self
    }

    pub fn with_fallback_window(mut self, seconds: f64) -> Self {
        self.config.synthesis.fallback_window_seconds = seconds;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
