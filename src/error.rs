use std::path::PathBuf;

use thiserror::Error;

use crate::functions::http::HttpToolError;

#[derive(Debug, Error)]
pub enum LLMError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("missing API key: set the {0} environment variable")]
    MissingApiKey(&'static str),

    #[error("invalid response from provider: {0}")]
    InvalidResponse(&'static str),

    #[error("unknown function: {0}")]
    UnknownFunction(String),

    #[error("invalid function arguments: {0}")]
    InvalidFunctionArguments(String),

    #[error("kernel function execution failed ({function}): {message}")]
    FunctionExecution { function: String, message: String },

    #[error("agent took {0} steps without producing a final answer")]
    StepLimitExceeded(usize),
}

/// Errors surfaced by the run orchestrator, the judge and the aggregator.
#[derive(Debug, Error)]
pub enum BenchError {
    #[error("not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("run directory already exists: {}", .0.display())]
    RunExists(PathBuf),

    #[error("agent failed on task {task_id}: {source}")]
    AgentInvocation {
        task_id: String,
        #[source]
        source: LLMError,
    },

    #[error("judge call failed for criterion '{criterion}': {source}")]
    JudgeInvocation {
        criterion: String,
        #[source]
        source: LLMError,
    },

    #[error(transparent)]
    JudgeOutput(#[from] JudgeOutputError),

    #[error("grading task {task_id} ({}) failed: {source}", path.display())]
    Grading {
        task_id: String,
        path: PathBuf,
        #[source]
        source: Box<BenchError>,
    },

    #[error("template render error: {0}")]
    TemplateRender(#[from] handlebars::RenderError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Tools(#[from] HttpToolError),

    #[error(transparent)]
    Provider(#[from] LLMError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// The judge model answered with something other than `{reasoning, score}`.
#[derive(Debug, Error)]
pub enum JudgeOutputError {
    #[error("judge returned an empty response")]
    Empty,

    #[error("judge output is not valid JSON: {0}")]
    NotJson(String),

    #[error("judge output violates the expected schema: {}", .0.join("; "))]
    Schema(Vec<String>),

    #[error("judge output could not be decoded: {0}")]
    Shape(String),
}
