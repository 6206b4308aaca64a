pub mod agents;
pub mod config;
pub mod error;
pub mod eval;
pub mod functions;
pub mod providers;
pub mod runner;
pub mod store;
pub mod tasks;
pub mod types;

pub use error::{BenchError, JudgeOutputError, LLMError};
pub use providers::LLMProvider;
pub use types::{ChatMessage, CompletionRequest, CompletionResponse, MessageRole, TokenUsage};
pub use functions::{
    DynKernelFunction, FunctionCall, FunctionDefinition, FunctionRegistry, KernelFunction, Tool,
    ToolCall, ToolChoice,
};
pub use tasks::{create_task, load_task, load_tasks, save_task, Criterion, Task};
pub use agents::{
    build_agent,
    AgentKind,
    AgentResult,
    AgentSettings,
    BenchAgent,
    DeepAgent,
    DirectAgent,
    ReactAgent,
};
pub use runner::{
    FailurePolicy,
    RunManifest,
    RunOrchestrator,
    RunOutcome,
    TaskResultRecord,
};
pub use eval::{
    evaluate_run,
    evaluate_run_with,
    recompute_summary,
    summarize,
    EvalResult,
    EvaluateOptions,
    FinalSummary,
    Judge,
    JudgmentResult,
    TaskGrade,
};
pub use config::{BenchConfig, ModelRef};
