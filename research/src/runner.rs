use crate::answer::StructuredAnswer;
use crate::literal;
use agent::callbacks::MessageLogger;
use agent::llm::{self, Message};
use agent::output::OutputParser;
use agent::tools;
use agent::{AgentBuilder, Error, Result, StopCondition};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

const SYSTEM_PROMPT: &str = "You are a helpful research assistant that provides concise and accurate information.
Answer the user query and use the necessary tools.";

const FORMAT_PROMPT: &str = "Wrap the output in this format and provide no other text.";

/// The model is done once it replies without asking for a tool.
struct FinalAnswer;

impl StopCondition for FinalAnswer {
    fn done(&self, history: &[Message]) -> bool {
        matches!(history.last(), Some(Message::Assistant(_, tool_calls)) if tool_calls.is_empty())
    }
}

/// The outcome of one query: the question and the model's final text.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub query: String,
    pub output: String,
}

/// Renders the response as a single log line, `{'query': '...', 'output': '...'}`.
impl std::fmt::Display for RawResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{'query': {}, 'output': {}}}",
            literal::quote(&self.query),
            literal::quote(&self.output)
        )
    }
}

pub struct Runner {
    llm: Arc<dyn llm::LLM + Send + Sync>,
    parser: OutputParser<StructuredAnswer>,
    output_file: PathBuf,
    max_iterations: usize,
    transcript: bool,
}

impl Runner {
    pub fn new(
        llm: Arc<dyn llm::LLM + Send + Sync>,
        output_file: PathBuf,
        max_iterations: usize,
    ) -> Self {
        Self {
            llm,
            parser: OutputParser::new(),
            output_file,
            max_iterations,
            transcript: false,
        }
    }

    /// Write a markdown transcript of each step to stderr.
    pub fn with_transcript(mut self, transcript: bool) -> Self {
        self.transcript = transcript;
        self
    }

    fn system_prompt(&self, tool_names: &[String]) -> Result<String> {
        Ok(format!(
            "{}\nAvailable tools: {}\n{}\n{}",
            SYSTEM_PROMPT,
            tool_names.join(", "),
            FORMAT_PROMPT,
            self.parser.format_instructions()?
        ))
    }

    pub async fn ask(&self, query: &str) -> Result<RawResponse> {
        let save_tool = tools::SaveToFile::new(self.output_file.clone());
        let tool_names = vec![tools::Tool::definition(&*save_tool)?.name];

        let mut builder = AgentBuilder::new()
            .system_prompt(self.system_prompt(&tool_names)?)
            .user_prompt(query.to_string())
            .llm(self.llm.clone())
            .tool(save_tool)
            .stop_condition(Box::new(FinalAnswer))
            .max_iterations(self.max_iterations);

        if self.transcript {
            builder = builder.callback(MessageLogger::new(query, std::io::stderr())?);
        }

        info!(query, "running research query");
        let mut history = builder.build()?.run().await?;

        match history.pop() {
            Some(Message::Assistant(output, _)) => Ok(RawResponse {
                query: query.to_string(),
                output,
            }),
            _ => Err(Error::AgentWorkflowError(
                "agent finished without a final answer".to_string(),
            )),
        }
    }

    pub fn decode(&self, response: &RawResponse) -> Result<StructuredAnswer> {
        self.parser.parse(&response.output)
    }
}
