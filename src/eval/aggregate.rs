//! Folding per-task grades into the run summary.
//!
//! Averages round half to even, matching the downstream tooling that reads
//! `final.json`.

use std::path::Path;

use tracing::info;

use crate::{
    eval::report::{EvalResult, FinalSummary, GradesFile, TaskGrade},
    runner::TaskResultRecord,
    store,
    types::TokenUsage,
    BenchError,
};

pub const GRADES_FILE: &str = "grades.json";
pub const FINAL_FILE: &str = "final.json";

pub fn grade_task(record: &TaskResultRecord, eval: &EvalResult) -> TaskGrade {
    TaskGrade {
        task_id: record.task_id.clone(),
        domain: record.domain.clone(),
        prompt: record.prompt.clone(),
        score: eval.score(),
        passed: eval.passed,
        total: eval.total,
        token_usage: record.token_usage,
        time_taken: record.time_taken,
    }
}

pub fn summarize(run_id: &str, grades: &[TaskGrade]) -> FinalSummary {
    let num_tasks = grades.len();
    let total_token_usage: TokenUsage = grades.iter().map(|grade| &grade.token_usage).sum();

    if num_tasks == 0 {
        return FinalSummary {
            run_id: run_id.to_string(),
            num_tasks,
            avg_score: 0.0,
            avg_time_taken: 0.0,
            total_token_usage,
            avg_token_usage: TokenUsage::default(),
        };
    }

    let n = num_tasks as f64;
    let score_sum: f64 = grades.iter().map(|grade| grade.score).sum();
    let time_sum: f64 = grades.iter().map(|grade| grade.time_taken).sum();
    let count = num_tasks as u64;

    FinalSummary {
        run_id: run_id.to_string(),
        num_tasks,
        avg_score: round_to(score_sum / n, 4),
        avg_time_taken: round_to(time_sum / n, 3),
        total_token_usage,
        avg_token_usage: TokenUsage {
            input_tokens: mean_rounded(total_token_usage.input_tokens, count),
            output_tokens: mean_rounded(total_token_usage.output_tokens, count),
            total_tokens: mean_rounded(total_token_usage.total_tokens, count),
        },
    }
}

/// Rebuilds `final.json` from `grades.json` alone.
pub fn recompute_summary(run_dir: &Path) -> Result<FinalSummary, BenchError> {
    let grades: GradesFile = store::read_json(&run_dir.join(GRADES_FILE))?;
    let summary = summarize(&grades.run_id, &grades.grades);
    store::write_json(&run_dir.join(FINAL_FILE), &summary)?;
    info!(run_id = %summary.run_id, "recomputed summary for {} tasks", summary.num_tasks);
    Ok(summary)
}

/// Rounds to `decimals` places, ties to even on the exact binary value.
pub(crate) fn round_to(value: f64, decimals: usize) -> f64 {
    format!("{:.*}", decimals, value).parse().unwrap_or(value)
}

/// `total / count` rounded to the nearest integer, ties to even.
pub(crate) fn mean_rounded(total: u64, count: u64) -> u64 {
    if count == 0 {
        return 0;
    }
    let quotient = total / count;
    let twice_remainder = u128::from(total % count) * 2;
    let count = u128::from(count);

    if twice_remainder > count || (twice_remainder == count && quotient % 2 == 1) {
        quotient + 1
    } else {
        quotient
    }
}
