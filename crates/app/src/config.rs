use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use lingovox_audio::{DEFAULT_CHUNK_INTERVAL_MS, MIN_UTTERANCE_BYTES};
use lingovox_foundation::AppError;
use lingovox_services::ServiceConfig;
use lingovox_vad::SilenceConfig;

/// Default persona/situation context. The scenario library proper lives
/// outside this repository; this string is what crosses its boundary.
pub const DEFAULT_CONTEXT: &str = "Du bist eine freundliche und geduldige \
Deutsch-Sprachtrainerin namens Anna. Antworte immer auf Deutsch in einfachen, \
klaren Sätzen (Niveau A2-B1), korrigiere Fehler sanft, stelle Folgefragen und \
halte deine Antworten kurz (2-4 Sätze).";

/// Config file read when present; everything has a usable default.
pub const DEFAULT_CONFIG_PATH: &str = "lingovox.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Capture device name; the host default when omitted.
    pub device: Option<String>,
    /// Language tag forwarded to transcription.
    pub language: String,
    /// Persona/situation context forwarded verbatim to the dialogue service.
    pub context: String,
    /// Utterances finalized below this size are discarded as noise.
    pub min_utterance_bytes: usize,
    /// Interval at which the recording session flushes captured chunks.
    pub chunk_interval_ms: u64,
    pub silence: SilenceConfig,
    pub services: ServiceConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            device: None,
            language: "de".to_string(),
            context: DEFAULT_CONTEXT.to_string(),
            min_utterance_bytes: MIN_UTTERANCE_BYTES,
            chunk_interval_ms: DEFAULT_CHUNK_INTERVAL_MS,
            silence: SilenceConfig::default(),
            services: ServiceConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from an explicit path (must exist) or from `lingovox.toml` in
    /// the working directory (defaults when absent). The API key may also
    /// come from `LINGOVOX_API_KEY` or `OPENAI_API_KEY`.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let mut config = match path {
            Some(path) => Self::parse_file(path)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_PATH);
                if default_path.exists() {
                    Self::parse_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };

        if config.services.api_key.is_empty() {
            if let Ok(key) = std::env::var("LINGOVOX_API_KEY")
                .or_else(|_| std::env::var("OPENAI_API_KEY"))
            {
                config.services.api_key = key;
            }
        }

        Ok(config)
    }

    fn parse_file(path: &Path) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("{}: {e}", path.display())))?;
        toml::from_str(&raw).map_err(|e| AppError::Config(format!("{}: {e}", path.display())))
    }

    pub fn chunk_interval(&self) -> Duration {
        Duration::from_millis(self.chunk_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_german_learner_oriented() {
        let config = AppConfig::default();
        assert_eq!(config.language, "de");
        assert_eq!(config.min_utterance_bytes, 1_000);
        assert_eq!(config.chunk_interval(), Duration::from_millis(250));
        assert!(config.context.contains("Anna"));
    }

    #[test]
    fn partial_toml_keeps_defaults_for_the_rest() {
        let config: AppConfig = toml::from_str(
            r#"
            language = "fr"

            [silence]
            silence_duration_ms = 1200
            "#,
        )
        .unwrap();
        assert_eq!(config.language, "fr");
        assert_eq!(config.silence.silence_duration_ms, 1_200);
        // untouched sections fall back to defaults
        assert_eq!(config.silence.threshold_energy, 15.0);
        assert_eq!(config.services.chat_model, "gpt-4o-mini");
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let result = AppConfig::load(Some(Path::new("/does/not/exist.toml")));
        assert!(matches!(result, Err(AppError::Config(_))));
    }
}
