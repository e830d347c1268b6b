use thiserror::Error;

#[derive(Error, Debug)]
pub enum TranscriptionError {
    #[error("Transcription request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Transcription service returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Could not build transcription request: {0}")]
    Request(String),
}

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Reply request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Dialogue service returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Dialogue service produced no usable reply")]
    EmptyReply,
}

#[derive(Error, Debug)]
pub enum SynthesisError {
    #[error("Synthesis request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Synthesis service returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Synthesis service returned no audio")]
    EmptyAudio,
}
