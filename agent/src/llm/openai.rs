use crate::llm;
use crate::tools;
use crate::{Error, Result};
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
        ChatCompletionRequestAssistantMessageContent, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessage, ChatCompletionRequestSystemMessageContent,
        ChatCompletionRequestToolMessage, ChatCompletionRequestToolMessageContent,
        ChatCompletionRequestUserMessage, ChatCompletionRequestUserMessageContent,
        ChatCompletionTool, ChatCompletionToolArgs, ChatCompletionToolType,
        CreateChatCompletionRequestArgs, FunctionCall, FunctionObjectArgs, Role,
    },
};
use async_trait::async_trait;
use tracing::debug;

/// Connection settings for an OpenAI compatible chat completions endpoint.
#[derive(Clone, Debug)]
pub struct ModelConfig {
    pub api_key: String,
    pub api_base: String,
    pub model: String,
    pub temperature: f32,
}

pub struct OpenAI {
    model: String,
    temperature: f32,
    client: Client<OpenAIConfig>,
}

impl OpenAI {
    pub fn new(config: &ModelConfig) -> std::sync::Arc<Self> {
        let openai_config = OpenAIConfig::new()
            .with_api_key(config.api_key.clone())
            .with_api_base(config.api_base.clone());

        std::sync::Arc::new(Self {
            model: config.model.clone(),
            temperature: config.temperature,
            client: Client::with_config(openai_config),
        })
    }
}

impl TryFrom<&llm::Message> for ChatCompletionRequestMessage {
    type Error = Error;

    fn try_from(msg: &llm::Message) -> Result<Self> {
        match msg {
            llm::Message::User(msg) => Ok(ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessage {
                    content: ChatCompletionRequestUserMessageContent::Text(msg.clone()),
                    name: None,
                },
            )),
            llm::Message::System(msg) => Ok(ChatCompletionRequestMessage::System(
                ChatCompletionRequestSystemMessage {
                    content: ChatCompletionRequestSystemMessageContent::Text(msg.clone()),
                    name: None,
                },
            )),
            llm::Message::Tool { id, result, .. } => Ok(ChatCompletionRequestMessage::Tool(
                ChatCompletionRequestToolMessage {
                    content: ChatCompletionRequestToolMessageContent::Text(result.clone()),
                    tool_call_id: id.clone(),
                },
            )),
            llm::Message::Assistant(msg, tool_calls) => {
                let mut args = ChatCompletionRequestAssistantMessageArgs::default();
                args.content(ChatCompletionRequestAssistantMessageContent::Text(
                    msg.clone(),
                ));

                // an empty tool_calls array is rejected by some providers
                if !tool_calls.is_empty() {
                    args.tool_calls(
                        tool_calls
                            .iter()
                            .map(|call| ChatCompletionMessageToolCall {
                                id: call.id.clone(),
                                r#type: ChatCompletionToolType::Function,
                                function: FunctionCall {
                                    name: call.name.clone(),
                                    arguments: call.args.clone(),
                                },
                            })
                            .collect::<Vec<_>>(),
                    );
                }

                Ok(ChatCompletionRequestMessage::Assistant(args.build()?))
            }
        }
    }
}

impl TryFrom<&tools::ToolDefinition> for ChatCompletionTool {
    type Error = Error;

    fn try_from(tool: &tools::ToolDefinition) -> Result<Self> {
        let res = ChatCompletionToolArgs::default()
            .function(
                FunctionObjectArgs::default()
                    .name(tool.name.clone())
                    .description(tool.desc.clone())
                    .parameters(tool.params.clone())
                    .build()?,
            )
            .build()?;

        Ok(res)
    }
}

#[async_trait]
impl llm::LLM for OpenAI {
    async fn completion<'a>(
        &self,
        request: llm::CompletionRequest<'a>,
    ) -> Result<llm::CompletionResponse> {
        let mut completion = CreateChatCompletionRequestArgs::default();
        completion
            .model(&self.model)
            .temperature(self.temperature)
            .messages(
                request
                    .messages
                    .iter()
                    .map(ChatCompletionRequestMessage::try_from)
                    .collect::<Result<Vec<_>>>()?,
            );

        if !request.tools.is_empty() {
            completion.tools(
                request
                    .tools
                    .iter()
                    .map(ChatCompletionTool::try_from)
                    .collect::<Result<Vec<_>>>()?,
            );
        }

        let completion = completion.build()?;

        debug!(model = %self.model, messages = request.messages.len(), "sending completion request");
        let res = self.client.chat().create(completion).await?;

        let choice = res
            .choices
            .first()
            .ok_or(Error::LLMResponseError("choices is empty".to_string()))?;

        if choice.message.role != Role::Assistant {
            return Err(Error::LLMResponseError(
                "expected role to be assistant".to_string(),
            ));
        }

        let tool_calls: Vec<tools::ToolCall> = choice
            .message
            .tool_calls
            .iter()
            .flat_map(|calls| {
                calls.iter().map(|call| tools::ToolCall {
                    id: call.id.clone(),
                    name: call.function.name.clone(),
                    args: call.function.arguments.clone(),
                })
            })
            .collect();

        // a reply that only carries tool calls usually has no text
        let content = match (&choice.message.content, tool_calls.is_empty()) {
            (Some(content), _) => content.clone(),
            (None, false) => String::new(),
            (None, true) => {
                return Err(Error::LLMResponseError("content is empty".to_string()));
            }
        };

        Ok(llm::CompletionResponse {
            content,
            tool_calls,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::Result;
    use crate::llm::Message;
    use crate::tools::{ToolCall, ToolDefinition};
    use async_openai::types::{ChatCompletionRequestMessage, ChatCompletionTool};

    #[test]
    fn test_assistant_without_tool_calls() -> Result<()> {
        let msg =
            ChatCompletionRequestMessage::try_from(&Message::Assistant("done".to_string(), vec![]))?;

        match msg {
            ChatCompletionRequestMessage::Assistant(assistant) => {
                assert!(assistant.tool_calls.is_none())
            }
            _ => panic!("expected assistant message"),
        }
        Ok(())
    }

    #[test]
    fn test_assistant_with_tool_calls() -> Result<()> {
        let msg = ChatCompletionRequestMessage::try_from(&Message::Assistant(
            String::new(),
            vec![ToolCall {
                id: "call1".to_string(),
                name: "save_text_to_file".to_string(),
                args: "{\"data\":\"abc\"}".to_string(),
            }],
        ))?;

        match msg {
            ChatCompletionRequestMessage::Assistant(assistant) => {
                let calls = assistant.tool_calls.unwrap_or_default();
                assert_eq!(calls.len(), 1);
                assert_eq!(calls[0].id, "call1");
                assert_eq!(calls[0].function.name, "save_text_to_file");
                assert_eq!(calls[0].function.arguments, "{\"data\":\"abc\"}");
            }
            _ => panic!("expected assistant message"),
        }
        Ok(())
    }

    #[test]
    fn test_tool_message_keeps_call_id() -> Result<()> {
        let msg = ChatCompletionRequestMessage::try_from(&Message::Tool {
            id: "call7".to_string(),
            name: "save_text_to_file".to_string(),
            result: "saved".to_string(),
        })?;

        match msg {
            ChatCompletionRequestMessage::Tool(tool) => assert_eq!(tool.tool_call_id, "call7"),
            _ => panic!("expected tool message"),
        }
        Ok(())
    }

    #[derive(serde::Deserialize, schemars::JsonSchema)]
    #[allow(dead_code)]
    struct Args {
        data: String,
    }

    #[test]
    fn test_tool_definition() -> Result<()> {
        let def = ToolDefinition::new::<Args>("save", "save some data")?;
        let tool = ChatCompletionTool::try_from(&def)?;

        assert_eq!(tool.function.name, "save");
        assert_eq!(tool.function.description.as_deref(), Some("save some data"));
        assert_eq!(tool.function.parameters, Some(def.params.clone()));
        Ok(())
    }
}
