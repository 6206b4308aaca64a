//! Drives one agent over a task directory and persists what it produced.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    agents::{round_millis, AgentResult, BenchAgent},
    store,
    tasks::{load_tasks, preview, Task},
    types::TokenUsage,
    BenchError,
};

pub const DEFAULT_OUTPUT_BASE: &str = "output";
pub const MANIFEST_FILE: &str = "manifest.json";

/// Persisted as `<task_id>.json` in the run directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResultRecord {
    pub task_id: String,
    pub domain: String,
    pub prompt: String,
    pub gold_response: String,
    pub rubric: Vec<String>,
    pub agent_response: String,
    pub token_usage: TokenUsage,
    pub time_taken: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskResultRecord {
    pub fn new(task: &Task, result: AgentResult) -> Self {
        Self {
            task_id: task.id.clone(),
            domain: task.domain.clone(),
            prompt: task.prompt.clone(),
            gold_response: task.gold_response.clone(),
            rubric: task.rubric_texts(),
            agent_response: result.response,
            token_usage: result.token_usage,
            time_taken: result.time_taken,
            error: None,
        }
    }

    /// Record for a task whose agent call failed and was isolated.
    pub fn failed(task: &Task, time_taken: f64, error: impl Into<String>) -> Self {
        let mut record = Self::new(
            task,
            AgentResult {
                response: String::new(),
                token_usage: TokenUsage::default(),
                time_taken,
            },
        );
        record.error = Some(error.into());
        record
    }

    pub fn file_name(&self) -> String {
        format!("{}.json", self.task_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: String,
    pub timestamp: String,
    pub agent: String,
    pub tasks_dir: String,
    pub num_tasks: usize,
    pub task_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Stop at the first agent error; no manifest is written.
    #[default]
    Abort,
    /// Record the error for that task and move on.
    Isolate,
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: String,
    pub run_dir: PathBuf,
    pub manifest: RunManifest,
}

pub struct RunOrchestrator {
    agent: Arc<dyn BenchAgent>,
    output_base: PathBuf,
    system_prompt: Option<String>,
    failure_policy: FailurePolicy,
}

impl RunOrchestrator {
    pub fn new(agent: Arc<dyn BenchAgent>) -> Self {
        Self {
            agent,
            output_base: PathBuf::from(DEFAULT_OUTPUT_BASE),
            system_prompt: None,
            failure_policy: FailurePolicy::default(),
        }
    }

    pub fn with_output_base(mut self, output_base: impl Into<PathBuf>) -> Self {
        self.output_base = output_base.into();
        self
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn with_failure_policy(mut self, failure_policy: FailurePolicy) -> Self {
        self.failure_policy = failure_policy;
        self
    }

    pub async fn run(&self, tasks_dir: impl AsRef<Path>) -> Result<RunOutcome, BenchError> {
        let tasks_dir = tasks_dir.as_ref();
        let run_id = Uuid::new_v4().to_string();
        let run_dir = create_run_dir(&self.output_base, &run_id)?;
        info!(run_id = %run_id, agent = self.agent.name(), run_dir = %run_dir.display(), "starting run");

        let tasks = load_tasks(tasks_dir)?;
        let total = tasks.len();
        info!(run_id = %run_id, "loaded {total} tasks from {}", tasks_dir.display());

        for (index, task) in tasks.iter().enumerate() {
            let position = index + 1;
            info!(run_id = %run_id, task_id = %task.id, "Task {position}/{total}: {}", preview(&task.prompt, 80));

            let record = self.run_task(&run_id, position, task).await?;
            debug!(task_id = %task.id, response = %preview(&record.agent_response, 200), "agent responded");
            store::write_json(&run_dir.join(record.file_name()), &record)?;
        }

        let manifest = RunManifest {
            run_id: run_id.clone(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false),
            agent: self.agent.name().to_string(),
            tasks_dir: tasks_dir.display().to_string(),
            num_tasks: total,
            task_ids: tasks.iter().map(|task| task.id.clone()).collect(),
        };
        store::write_json(&run_dir.join(MANIFEST_FILE), &manifest)?;
        info!(run_id = %run_id, "run complete: {total} tasks");

        Ok(RunOutcome {
            run_id,
            run_dir,
            manifest,
        })
    }

    async fn run_task(
        &self,
        run_id: &str,
        position: usize,
        task: &Task,
    ) -> Result<TaskResultRecord, BenchError> {
        let started = Instant::now();
        match self.agent.run(task, self.system_prompt.as_deref()).await {
            Ok(result) => Ok(TaskResultRecord::new(task, result)),
            Err(source) => match self.failure_policy {
                FailurePolicy::Abort => {
                    error!(
                        run_id = %run_id,
                        task = position,
                        task_id = %task.id,
                        error = %source,
                        "agent failed on prompt: {}",
                        preview(&task.prompt, 80)
                    );
                    Err(BenchError::AgentInvocation {
                        task_id: task.id.clone(),
                        source,
                    })
                }
                FailurePolicy::Isolate => {
                    warn!(
                        run_id = %run_id,
                        task = position,
                        task_id = %task.id,
                        error = %source,
                        "agent failed, recording and continuing: {}",
                        preview(&task.prompt, 80)
                    );
                    let elapsed = round_millis(started.elapsed().as_secs_f64());
                    Ok(TaskResultRecord::failed(task, elapsed, source.to_string()))
                }
            },
        }
    }
}

/// Creates `<output_base>/<run_id>`. The base may be created on the way, the
/// run directory itself must not exist yet.
pub fn create_run_dir(output_base: &Path, run_id: &str) -> Result<PathBuf, BenchError> {
    fs::create_dir_all(output_base)?;
    let run_dir = output_base.join(run_id);
    match fs::create_dir(&run_dir) {
        Ok(()) => Ok(run_dir),
        Err(error) if error.kind() == ErrorKind::AlreadyExists => Err(BenchError::RunExists(run_dir)),
        Err(error) => Err(error.into()),
    }
}
