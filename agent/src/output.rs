//! Structured output: describe a schema to the model and decode its answer.

use crate::{Error, Result};
use schemars::{JsonSchema, schema_for};
use serde::de::DeserializeOwned;
use std::marker::PhantomData;

/// Decodes model text into `T`, strictly. The only leniency is reading the
/// body of a fenced markdown block when the model wraps its answer in one.
pub struct OutputParser<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> Default for OutputParser<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> OutputParser<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T: JsonSchema + DeserializeOwned> OutputParser<T> {
    pub fn format_instructions(&self) -> Result<String> {
        let schema = serde_json::to_string_pretty(&schema_for!(T))?;
        Ok(format!(
            "The output must be a single JSON object that conforms to the JSON schema below. \
Return an instance of the schema, not the schema itself, and include every required field.\n\n\
Here is the output schema:\n```\n{}\n```",
            schema
        ))
    }

    /// Decodes the whole text first and only falls back to a fenced block
    /// when that fails. Errors report the whole-text failure.
    pub fn parse(&self, text: &str) -> Result<T> {
        let err = match serde_json::from_str(text.trim()) {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        if let Some(body) = fenced_body(text) {
            if let Ok(value) = serde_json::from_str(body) {
                return Ok(value);
            }
        }

        Err(Error::OutputParse {
            raw: text.to_string(),
            reason: err.to_string(),
        })
    }
}

fn fenced_body(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after_fence = &text[start + 3..];
    // skip the info string, e.g. ```json
    let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(after_fence.len());
    let body = &after_fence[body_start..];
    body.find("```").map(|end| body[..end].trim())
}

#[cfg(test)]
mod tests {
    use super::{OutputParser, fenced_body};
    use crate::{Error, Result};

    #[derive(Debug, PartialEq, serde::Deserialize, schemars::JsonSchema)]
    struct Answer {
        topic: String,
        sources: Vec<String>,
    }

    #[test]
    fn test_parse_plain_json() -> Result<()> {
        let parser = OutputParser::<Answer>::new();

        let answer = parser.parse(" {\"topic\": \"Sharks\", \"sources\": [\"a\", \"b\"]}\n")?;

        assert_eq!(
            answer,
            Answer {
                topic: "Sharks".to_string(),
                sources: vec!["a".to_string(), "b".to_string()],
            }
        );
        Ok(())
    }

    #[test]
    fn test_parse_fenced_json() -> Result<()> {
        let parser = OutputParser::<Answer>::new();

        let answer =
            parser.parse("Here you go:\n```json\n{\"topic\": \"T\", \"sources\": []}\n```\n")?;

        assert_eq!(answer.topic, "T");
        assert!(answer.sources.is_empty());
        Ok(())
    }

    #[test]
    fn test_missing_field_fails_with_raw_text() {
        let parser = OutputParser::<Answer>::new();
        let raw = "{\"topic\":\"T\"}";

        match parser.parse(raw) {
            Err(Error::OutputParse { raw: got, reason }) => {
                assert_eq!(got, raw);
                assert!(reason.contains("sources"), "{}", reason);
            }
            other => panic!("expected output parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_wrong_shapes_fail() {
        let parser = OutputParser::<Answer>::new();

        for raw in [
            "[{\"topic\": \"T\", \"sources\": []}]",
            "{\"topic\": \"T\", \"sources\": \"a\"}",
            "{\"topic\": \"T\", \"sources\": [1]}",
            "The topic is sharks.",
            "",
        ] {
            assert!(
                matches!(parser.parse(raw), Err(Error::OutputParse { .. })),
                "{:?} should not decode",
                raw
            );
        }
    }

    #[test]
    fn test_format_instructions_embed_schema() -> Result<()> {
        let text = OutputParser::<Answer>::new().format_instructions()?;

        assert!(text.contains("\"topic\""));
        assert!(text.contains("\"sources\""));
        assert!(text.contains("\"required\""));
        Ok(())
    }

    #[test]
    fn test_fenced_body() {
        assert_eq!(fenced_body("```json\n{}\n```"), Some("{}"));
        assert_eq!(fenced_body("```json\n{}"), None);
        assert_eq!(fenced_body("  {}  "), None);
    }

    #[test]
    fn test_backticks_inside_values() -> Result<()> {
        let parser = OutputParser::<Answer>::new();
        let raw = "{\n  \"topic\": \"Markdown ``` fences\",\n  \"sources\": [\"close with ``` too\"]\n}";

        let answer = parser.parse(raw)?;

        assert_eq!(answer.topic, "Markdown ``` fences");
        assert_eq!(answer.sources, vec!["close with ``` too".to_string()]);
        Ok(())
    }

    #[test]
    fn test_bad_fence_reports_whole_text_error() {
        let parser = OutputParser::<Answer>::new();
        let raw = "Answer:\n```json\n{\"topic\": \"T\"}\n```";

        match parser.parse(raw) {
            Err(Error::OutputParse { raw: got, reason }) => {
                assert_eq!(got, raw);
                assert!(reason.contains("expected value"), "{}", reason);
            }
            other => panic!("expected output parse error, got {:?}", other),
        }
    }
}
