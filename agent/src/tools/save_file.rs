use crate::Result;
use crate::llm::Message;
use crate::tools::{FunctionalTool, ToolCall, ToolDefinition};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use std::io::Write;
use std::path::PathBuf;
use tracing::info;

pub const SAVE_TOOL_NAME: &str = "save_text_to_file";

/// Appends research text to a file, each entry under a timestamped header.
pub struct SaveToFile {
    path: PathBuf,
}

impl SaveToFile {
    pub fn new(path: impl Into<PathBuf>) -> Box<Self> {
        Box::new(Self { path: path.into() })
    }

    fn save(&self, data: &str) -> Result<String> {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        write!(
            file,
            "--- Research Output ---\nTimestamp: {}\n\n{}\n\n",
            timestamp, data
        )?;
        file.flush()?;

        info!(path = %self.path.display(), bytes = data.len(), "saved research output");
        Ok(format!("Data successfully saved to {}", self.path.display()))
    }
}

#[derive(Deserialize, JsonSchema)]
struct SaveArgs {
    /// The text to save.
    data: String,
}

#[async_trait]
impl FunctionalTool for SaveToFile {
    fn definition(&self) -> Result<ToolDefinition> {
        ToolDefinition::new::<SaveArgs>(SAVE_TOOL_NAME, "Saves structured research data to a text file.")
    }

    async fn invoke_fn(&mut self, call: &ToolCall) -> Result<Message> {
        let args: SaveArgs = call.args()?;
        Ok(Message::Tool {
            id: call.id.clone(),
            name: SAVE_TOOL_NAME.to_string(),
            result: self.save(&args.data)?,
        })
    }
}
