//! Grades a finished run directory.

use std::fs;
use std::path::{Path, PathBuf};

use futures_util::{stream, StreamExt, TryStreamExt};
use tracing::{error, info};

use crate::{
    eval::{
        aggregate::{grade_task, summarize, FINAL_FILE, GRADES_FILE},
        judge::Judge,
        report::{FinalSummary, GradesFile, TaskEvaluation, TaskGrade},
    },
    runner::{TaskResultRecord, MANIFEST_FILE},
    store,
    tasks::preview,
    BenchError,
};

const EVAL_SUFFIX: &str = ".eval.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvaluateOptions {
    /// Tasks graded at once. Criteria of one task are always judged in order.
    pub concurrency: usize,
}

impl Default for EvaluateOptions {
    fn default() -> Self {
        Self { concurrency: 1 }
    }
}

/// Task result files of a run, sorted by file name.
pub fn result_files(run_dir: &Path) -> Result<Vec<PathBuf>, BenchError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(run_dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if is_result_file(name) {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

fn is_result_file(name: &str) -> bool {
    name.ends_with(".json")
        && !name.ends_with(EVAL_SUFFIX)
        && !name.starts_with('.')
        && ![MANIFEST_FILE, GRADES_FILE, FINAL_FILE].contains(&name)
}

pub async fn evaluate_run(
    run_id: &str,
    output_base: &Path,
    judge: &Judge,
) -> Result<FinalSummary, BenchError> {
    evaluate_run_with(run_id, output_base, judge, EvaluateOptions::default()).await
}

pub async fn evaluate_run_with(
    run_id: &str,
    output_base: &Path,
    judge: &Judge,
    options: EvaluateOptions,
) -> Result<FinalSummary, BenchError> {
    let run_dir = output_base.join(run_id);
    if !run_dir.is_dir() {
        return Err(BenchError::NotFound { path: run_dir });
    }

    let files = result_files(&run_dir)?;
    let total = files.len();
    info!(judge_model = judge.model(), "Evaluating run: {run_id}");
    info!("Tasks to evaluate: {total}");

    let dir = run_dir.as_path();
    let grades: Vec<TaskGrade> = stream::iter(files.iter().enumerate())
        .map(move |(index, path)| grade_file(judge, dir, path, index + 1, total))
        .buffered(options.concurrency.max(1))
        .try_collect()
        .await?;

    let grades_file = GradesFile {
        run_id: run_id.to_string(),
        grades,
    };
    store::write_json(&run_dir.join(GRADES_FILE), &grades_file)?;

    let summary = summarize(run_id, &grades_file.grades);
    store::write_json(&run_dir.join(FINAL_FILE), &summary)?;

    let passed: usize = grades_file.grades.iter().map(|g| g.passed).sum();
    let criteria: usize = grades_file.grades.iter().map(|g| g.total).sum();
    let usage = &summary.total_token_usage;
    info!(
        "Score: {:.0}%  ({passed}/{criteria} criteria passed)",
        summary.avg_score * 100.0
    );
    info!(
        "Tokens: {} total  ({} in / {} out)",
        usage.total_tokens, usage.input_tokens, usage.output_tokens
    );
    info!("Time:   {}s avg per task", summary.avg_time_taken);
    info!("Results: {}/", run_dir.display());

    Ok(summary)
}

async fn grade_file(
    judge: &Judge,
    run_dir: &Path,
    path: &Path,
    position: usize,
    total: usize,
) -> Result<TaskGrade, BenchError> {
    let record: TaskResultRecord = store::read_json(path).map_err(|err| {
        error!(task = position, path = %path.display(), error = %err, "failed to read task result");
        err
    })?;
    info!(
        "Task {position}/{total} [{}]: {}",
        record.domain,
        preview(&record.prompt, 80)
    );

    grade_record(judge, run_dir, &record).await.map_err(|err| {
        error!(
            task = position,
            task_id = %record.task_id,
            path = %path.display(),
            error = %err,
            "failed to grade task"
        );
        BenchError::Grading {
            task_id: record.task_id.clone(),
            path: path.to_path_buf(),
            source: Box::new(err),
        }
    })
}

async fn grade_record(
    judge: &Judge,
    run_dir: &Path,
    record: &TaskResultRecord,
) -> Result<TaskGrade, BenchError> {
    let result = judge
        .judge(
            &record.prompt,
            &record.agent_response,
            &record.rubric,
            &record.gold_response,
        )
        .await?;

    let evaluation = TaskEvaluation {
        task_id: record.task_id.clone(),
        result,
    };
    store::write_json(&run_dir.join(evaluation.file_name()), &evaluation)?;

    let grade = grade_task(record, &evaluation.result);
    info!(
        task_id = %grade.task_id,
        "Task scored {:.0}% ({}/{})",
        grade.score * 100.0,
        grade.passed,
        grade.total
    );
    Ok(grade)
}
