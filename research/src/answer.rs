use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The answer format the model is asked to produce for every query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StructuredAnswer {
    /// A short label for the subject of the query.
    pub topic: String,
    /// The answer itself.
    pub summary: String,
    /// Citations backing the summary.
    pub sources: Vec<String>,
    /// Names of the tools invoked while answering.
    pub tools_used: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::StructuredAnswer;
    use agent::Error;
    use agent::output::OutputParser;

    #[test]
    fn test_decode_full_answer() -> agent::Result<()> {
        let answer = OutputParser::<StructuredAnswer>::new().parse(
            r#"{"topic": "Sharks", "summary": "...", "sources": [], "tools_used": ["save_text_to_file"]}"#,
        )?;

        assert_eq!(
            answer,
            StructuredAnswer {
                topic: "Sharks".to_string(),
                summary: "...".to_string(),
                sources: vec![],
                tools_used: vec!["save_text_to_file".to_string()],
            }
        );
        Ok(())
    }

    #[test]
    fn test_partial_answer_is_rejected() {
        let res = OutputParser::<StructuredAnswer>::new().parse(r#"{"topic":"T"}"#);

        assert!(matches!(res, Err(Error::OutputParse { raw, .. }) if raw == r#"{"topic":"T"}"#));
    }

    #[test]
    fn test_single_pair_is_rejected() {
        let res = OutputParser::<StructuredAnswer>::new()
            .parse(r#"{"output": "{\"topic\": \"T\"}"}"#);

        assert!(matches!(res, Err(Error::OutputParse { .. })));
    }

    #[test]
    fn test_tools_used_must_be_strings() {
        let res = OutputParser::<StructuredAnswer>::new().parse(
            r#"{"topic": "T", "summary": "S", "sources": [], "tools_used": "save_text_to_file"}"#,
        );

        assert!(matches!(res, Err(Error::OutputParse { .. })));
    }
}
