//! Benchmark tasks: a prompt, a reference answer and a rubric of pass/fail
//! criteria. Task files are JSON (YAML is accepted too) and are loaded in file
//! name order so runs are reproducible.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store;
use crate::BenchError;

/// One pass/fail condition of a rubric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "CriterionRepr")]
pub struct Criterion {
    pub criteria: String,
}

impl Criterion {
    pub fn new(criteria: impl Into<String>) -> Self {
        Self {
            criteria: criteria.into(),
        }
    }
}

impl From<String> for Criterion {
    fn from(criteria: String) -> Self {
        Self { criteria }
    }
}

impl From<&str> for Criterion {
    fn from(criteria: &str) -> Self {
        Self::new(criteria)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CriterionRepr {
    Text(String),
    Record { criteria: String },
}

impl From<CriterionRepr> for Criterion {
    fn from(repr: CriterionRepr) -> Self {
        match repr {
            CriterionRepr::Text(criteria) | CriterionRepr::Record { criteria } => Self { criteria },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    #[serde(default = "new_task_id")]
    pub id: String,
    pub domain: String,
    pub prompt: String,
    pub gold_response: String,
    #[serde(default)]
    pub rubric: Vec<Criterion>,
}

impl Task {
    pub fn rubric_texts(&self) -> Vec<String> {
        self.rubric.iter().map(|c| c.criteria.clone()).collect()
    }
}

/// Ids that would collide with run bookkeeping files.
const RESERVED_IDS: [&str; 3] = ["manifest", "grades", "final"];

fn new_task_id() -> String {
    Uuid::new_v4().to_string()
}

pub fn create_task<I, C>(
    domain: impl Into<String>,
    prompt: impl Into<String>,
    gold_response: impl Into<String>,
    rubric: I,
    id: Option<String>,
) -> Task
where
    I: IntoIterator<Item = C>,
    C: Into<Criterion>,
{
    Task {
        id: id.filter(|id| !id.trim().is_empty()).unwrap_or_else(new_task_id),
        domain: domain.into(),
        prompt: prompt.into(),
        gold_response: gold_response.into(),
        rubric: rubric.into_iter().map(Into::into).collect(),
    }
}

pub fn save_task(task: &Task, path: impl AsRef<Path>) -> Result<(), BenchError> {
    store::write_json(path.as_ref(), task)
}

pub fn load_task(path: impl AsRef<Path>) -> Result<Task, BenchError> {
    let path = path.as_ref();
    let mut task: Task = if is_yaml(path) {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Err(BenchError::NotFound {
                    path: path.to_path_buf(),
                })
            }
            Err(error) => return Err(error.into()),
        };
        serde_yaml::from_str(&contents).map_err(|error| BenchError::Parse {
            path: path.to_path_buf(),
            message: error.to_string(),
        })?
    } else {
        store::read_json(path)?
    };

    if task.id.trim().is_empty() {
        task.id = new_task_id();
    }
    check_task_id(&task.id).map_err(|message| BenchError::Parse {
        path: path.to_path_buf(),
        message,
    })?;
    Ok(task)
}

/// Task ids become file names inside the run directory.
fn check_task_id(id: &str) -> Result<(), String> {
    if RESERVED_IDS.contains(&id) {
        return Err(format!("task id '{id}' is reserved"));
    }
    if id.ends_with(".eval") {
        return Err(format!("task id '{id}' must not end in '.eval'"));
    }
    if id.starts_with('.') || id.contains(['/', '\\', '\0']) {
        return Err(format!("task id '{id}' is not a plain file name"));
    }
    Ok(())
}

pub fn load_tasks(directory: impl AsRef<Path>) -> Result<Vec<Task>, BenchError> {
    let directory = directory.as_ref();
    if !directory.is_dir() {
        return Err(BenchError::NotFound {
            path: directory.to_path_buf(),
        });
    }

    let mut files: Vec<PathBuf> = Vec::new();
    for entry in fs::read_dir(directory)? {
        let path = entry?.path();
        if path.is_file() && is_task_file(&path) {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    let mut seen: HashMap<String, PathBuf> = HashMap::new();
    let mut tasks = Vec::with_capacity(files.len());
    for path in files {
        let task = load_task(&path)?;
        if let Some(first) = seen.get(&task.id) {
            return Err(BenchError::Parse {
                message: format!("duplicate task id '{}' (first seen in {})", task.id, first.display()),
                path,
            });
        }
        seen.insert(task.id.clone(), path);
        tasks.push(task);
    }
    Ok(tasks)
}

fn is_task_file(path: &Path) -> bool {
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("");
    matches!(ext, "json" | "yaml" | "yml")
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|s| s.to_str()),
        Some("yaml") | Some("yml")
    )
}

/// First `max_chars` characters of `text`, for log lines.
pub fn preview(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}
