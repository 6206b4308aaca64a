pub mod aggregate;
pub mod evaluate;
pub mod judge;
pub mod report;

pub use aggregate::{grade_task, recompute_summary, summarize, FINAL_FILE, GRADES_FILE};
pub use evaluate::{evaluate_run, evaluate_run_with, result_files, EvaluateOptions};
pub use judge::{parse_judge_output, Judge, JudgeOutput};
pub use report::{EvalResult, FinalSummary, GradesFile, JudgmentResult, TaskEvaluation, TaskGrade};
