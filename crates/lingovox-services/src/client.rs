use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use tracing::debug;

use lingovox_audio::AudioArtifact;

use crate::error::{GenerationError, SynthesisError, TranscriptionError};
use crate::types::DialogueTurn;
use crate::{DialogueGenerator, SpeechSynthesis, SpeechToText};

/// Connection settings for the OpenAI-compatible speech and dialogue
/// endpoints. The request timeout is explicit rather than relying on the
/// remote side to hang up.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Base URL without trailing slash, e.g. https://api.openai.com/v1
    pub base_url: String,
    /// Bearer API key. Usually supplied via environment, not the config file.
    pub api_key: String,
    pub stt_model: String,
    pub chat_model: String,
    pub tts_model: String,
    pub voice: String,
    pub max_reply_tokens: u32,
    pub temperature: f32,
    pub request_timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            stt_model: "whisper-1".to_string(),
            chat_model: "gpt-4o-mini".to_string(),
            tts_model: "tts-1".to_string(),
            voice: "nova".to_string(),
            max_reply_tokens: 300,
            temperature: 0.7,
            request_timeout_secs: 30,
        }
    }
}

/// One HTTP client implementing all three collaborator contracts.
pub struct OpenAiClient {
    config: ServiceConfig,
    http: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(config: ServiceConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    text: String,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[async_trait]
impl SpeechToText for OpenAiClient {
    async fn transcribe(
        &self,
        audio: &AudioArtifact,
        language: &str,
    ) -> Result<String, TranscriptionError> {
        let part = Part::bytes(audio.as_bytes().to_vec())
            .file_name("utterance.wav")
            .mime_str(audio.mime())
            .map_err(|e| TranscriptionError::Request(e.to_string()))?;
        let form = Form::new()
            .part("file", part)
            .text("model", self.config.stt_model.clone())
            .text("language", language.to_string());

        debug!(target: "services", bytes = audio.len(), language, "transcribing utterance");

        let response = self
            .http
            .post(self.endpoint("audio/transcriptions"))
            .bearer_auth(&self.config.api_key)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TranscriptionError::Api {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let parsed: TranscriptionResponse = response.json().await?;
        Ok(parsed.text)
    }
}

#[async_trait]
impl DialogueGenerator for OpenAiClient {
    async fn reply(
        &self,
        transcript: &[DialogueTurn],
        context: &str,
    ) -> Result<String, GenerationError> {
        let mut messages = Vec::with_capacity(transcript.len() + 1);
        messages.push(ChatMessage {
            role: "system",
            content: context,
        });
        for turn in transcript {
            messages.push(ChatMessage {
                role: turn.role.as_str(),
                content: &turn.text,
            });
        }

        let body = serde_json::json!({
            "model": self.config.chat_model,
            "messages": messages,
            "max_tokens": self.config.max_reply_tokens,
            "temperature": self.config.temperature,
        });

        debug!(target: "services", turns = transcript.len(), "requesting reply");

        let response = self
            .http
            .post(self.endpoint("chat/completions"))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GenerationError::Api {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(GenerationError::EmptyReply)
    }
}

#[async_trait]
impl SpeechSynthesis for OpenAiClient {
    async fn synthesize(&self, text: &str) -> Result<AudioArtifact, SynthesisError> {
        let body = serde_json::json!({
            "model": self.config.tts_model,
            "input": text,
            "voice": self.config.voice,
            "response_format": "mp3",
        });

        debug!(target: "services", chars = text.len(), "synthesizing reply");

        let response = self
            .http
            .post(self.endpoint("audio/speech"))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SynthesisError::Api {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(SynthesisError::EmptyAudio);
        }
        Ok(AudioArtifact::mpeg(bytes.to_vec()))
    }
}
