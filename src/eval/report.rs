use serde::{Deserialize, Serialize};

use crate::types::TokenUsage;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgmentResult {
    pub criterion: String,
    pub score: bool,
    pub comment: String,
}

/// Verdicts for every criterion of one task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalResult {
    pub judgments: Vec<JudgmentResult>,
    pub passed: usize,
    pub total: usize,
}

impl EvalResult {
    pub fn from_judgments(judgments: Vec<JudgmentResult>) -> Self {
        let passed = judgments.iter().filter(|j| j.score).count();
        let total = judgments.len();
        Self {
            judgments,
            passed,
            total,
        }
    }

    /// Fraction of criteria met; an empty rubric scores 0.0.
    pub fn score(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.passed as f64 / self.total as f64
        }
    }
}

/// Persisted as `<task_id>.eval.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskEvaluation {
    pub task_id: String,
    #[serde(flatten)]
    pub result: EvalResult,
}

impl TaskEvaluation {
    pub fn file_name(&self) -> String {
        format!("{}.eval.json", self.task_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskGrade {
    pub task_id: String,
    pub domain: String,
    pub prompt: String,
    pub score: f64,
    pub passed: usize,
    pub total: usize,
    pub token_usage: TokenUsage,
    pub time_taken: f64,
}

/// `grades.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradesFile {
    pub run_id: String,
    pub grades: Vec<TaskGrade>,
}

/// `final.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalSummary {
    pub run_id: String,
    pub num_tasks: usize,
    pub avg_score: f64,
    pub avg_time_taken: f64,
    pub total_token_usage: TokenUsage,
    pub avg_token_usage: TokenUsage,
}
