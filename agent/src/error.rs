use async_openai::error::OpenAIError;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Json error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Openai error: {0}")]
    OpenaiError(#[from] OpenAIError),

    #[error("No response from llm: {0}")]
    LLMResponseError(String),

    #[error("llm call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Tool {0} does not exist")]
    ToolDoesNotExist(String),

    #[error("Missing arg: {0}")]
    MissingArg(String),

    #[error("Invalid config: {0}")]
    Config(String),

    #[error("Agent workflow error: {0}")]
    AgentWorkflowError(String),

    /// The model's answer did not match the requested output schema. `raw` is
    /// the untouched model text.
    #[error("Output parse error: {reason}")]
    OutputParse { raw: String, reason: String },

    #[error("IO Error: {0}")]
    IOError(#[from] std::io::Error),
}

impl Error {
    /// Transport level failures that are worth another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Timeout(_) | Error::OpenaiError(OpenAIError::Reqwest(_))
        )
    }
}
