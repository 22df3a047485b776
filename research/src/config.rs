use agent::llm::ModelConfig;
use agent::{Error, Result};
use clap::Args;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-lite";
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/openai/";

#[derive(Args, Debug, Clone)]
pub struct ModelArgs {
    /// API key for the model provider
    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Model name
    #[arg(long, env = "RESEARCH_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Base url of an OpenAI compatible chat completions api
    #[arg(long, env = "RESEARCH_API_BASE", default_value = DEFAULT_API_BASE)]
    pub api_base: String,

    #[arg(long, default_value_t = 0.7)]
    pub temperature: f32,

    /// Timeout for a single model call
    #[arg(long, default_value_t = 60)]
    pub timeout_secs: u64,

    /// Retries after a failed or timed out model call
    #[arg(long, default_value_t = 3)]
    pub max_retries: usize,

    /// Model calls allowed before giving up on an answer
    #[arg(long, default_value_t = 15)]
    pub max_iterations: usize,

    /// File the save tool appends to
    #[arg(long, default_value = "research_output.txt")]
    pub output_file: PathBuf,

    /// Append each raw response to this log, one line per run
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Print a transcript of every agent step to stderr
    #[arg(short, long)]
    pub verbose: bool,
}

/// Everything a query run needs, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub model: ModelConfig,
    pub timeout: Duration,
    pub max_retries: usize,
    pub max_iterations: usize,
    pub output_file: PathBuf,
    pub log_file: Option<PathBuf>,
    pub verbose: bool,
}

impl TryFrom<ModelArgs> for Config {
    type Error = Error;

    fn try_from(args: ModelArgs) -> Result<Self> {
        let api_key = args
            .api_key
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| Error::Config("GOOGLE_API_KEY is not set".to_string()))?;

        if !(0.0..=2.0).contains(&args.temperature) {
            return Err(Error::Config(format!(
                "temperature must be between 0 and 2, got {}",
                args.temperature
            )));
        }
        if args.timeout_secs == 0 {
            return Err(Error::Config("timeout must be at least one second".to_string()));
        }
        if args.max_iterations == 0 {
            return Err(Error::Config("max iterations must be positive".to_string()));
        }

        Ok(Self {
            model: ModelConfig {
                api_key,
                api_base: args.api_base,
                model: args.model,
                temperature: args.temperature,
            },
            timeout: Duration::from_secs(args.timeout_secs),
            max_retries: args.max_retries,
            max_iterations: args.max_iterations,
            output_file: args.output_file,
            log_file: args.log_file,
            verbose: args.verbose,
        })
    }
}
