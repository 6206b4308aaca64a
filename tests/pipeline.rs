use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use agentbench::{
    build_agent,
    eval::{evaluate_run, evaluate_run_with, EvaluateOptions, GradesFile, Judge, TaskEvaluation},
    providers::scripted::ScriptedProvider,
    store, AgentKind, AgentSettings, BenchError, FailurePolicy, FinalSummary, RunManifest,
    RunOrchestrator, TaskResultRecord, TokenUsage,
};
use tempfile::TempDir;

fn write_task(dir: &Path, id: &str, prompt: &str, rubric: &[&str]) {
    let task = agentbench::create_task("demo", prompt, "reference answer", rubric.to_vec(), Some(id.to_string()));
    agentbench::save_task(&task, dir.join(format!("{id}.json"))).expect("save task");
}

fn verdict(score: bool) -> String {
    format!(r#"{{"reasoning": "checked", "score": {score}}}"#)
}

fn only_run_dir(output: &Path) -> PathBuf {
    let dirs: Vec<PathBuf> = fs::read_dir(output)
        .expect("list output")
        .map(|entry| entry.expect("entry").path())
        .filter(|path| path.is_dir())
        .collect();
    assert_eq!(dirs.len(), 1, "expected exactly one run directory");
    dirs.into_iter().next().expect("run dir")
}

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .expect("list run dir")
        .map(|entry| entry.expect("entry").file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn run_then_evaluate_produces_all_artifacts() {
    let tasks = TempDir::new().expect("tempdir");
    let output = TempDir::new().expect("tempdir");
    write_task(tasks.path(), "t1", "Find the ACME invoice", &["mentions ACME", "gives the amount"]);
    write_task(tasks.path(), "t2", "What is 2 + 2?", &["answers 4"]);

    let agent_provider = Arc::new(
        ScriptedProvider::new()
            .with_usage_reply("The ACME invoice is #42.", TokenUsage::reported(10, 4, 0))
            .with_usage_reply("4", TokenUsage::reported(20, 6, 30)),
    );
    let agent = build_agent(AgentKind::Direct, agent_provider, AgentSettings::new("agent-model"));
    let outcome = RunOrchestrator::new(agent)
        .with_output_base(output.path())
        .with_system_prompt("Answer concisely.")
        .run(tasks.path())
        .await
        .expect("run");

    let manifest: RunManifest =
        store::read_json(&outcome.run_dir.join("manifest.json")).expect("manifest");
    assert_eq!(manifest.run_id, outcome.run_id);
    assert_eq!(manifest.agent, "direct");
    assert_eq!(manifest.task_ids, vec!["t1", "t2"]);

    let judge_provider = Arc::new(
        ScriptedProvider::new()
            .with_reply(verdict(true))
            .with_reply(verdict(false))
            .with_reply(verdict(true)),
    );
    let judge = Judge::new(judge_provider.clone(), "judge-model");
    let summary = evaluate_run(&outcome.run_id, output.path(), &judge)
        .await
        .expect("evaluate");

    assert_eq!(judge_provider.requests().len(), 3);
    assert_eq!(summary.num_tasks, 2);
    assert_eq!(summary.avg_score, 0.75);
    assert_eq!(summary.total_token_usage, TokenUsage::reported(30, 10, 44));
    assert_eq!(summary.avg_token_usage, TokenUsage::reported(15, 5, 22));

    assert_eq!(
        file_names(&outcome.run_dir),
        vec![
            "final.json",
            "grades.json",
            "manifest.json",
            "t1.eval.json",
            "t1.json",
            "t2.eval.json",
            "t2.json",
        ]
    );

    let eval: TaskEvaluation =
        store::read_json(&outcome.run_dir.join("t1.eval.json")).expect("eval file");
    assert_eq!((eval.result.passed, eval.result.total), (1, 2));
    assert_eq!(eval.result.judgments[1].criterion, "gives the amount");

    let grades: GradesFile = store::read_json(&outcome.run_dir.join("grades.json")).expect("grades");
    assert_eq!(grades.run_id, outcome.run_id);
    assert_eq!(grades.grades[0].score, 0.5);
    assert_eq!(grades.grades[1].score, 1.0);

    let final_summary: FinalSummary =
        store::read_json(&outcome.run_dir.join("final.json")).expect("final");
    assert_eq!(final_summary, summary);
}

#[tokio::test]
async fn hello_world_task_scores_full_marks() {
    let tasks = TempDir::new().expect("tempdir");
    let output = TempDir::new().expect("tempdir");
    write_task(tasks.path(), "hello", "Say hello", &["greets the user"]);

    let agent = build_agent(
        AgentKind::Direct,
        Arc::new(ScriptedProvider::new().with_usage_reply("Hello!", TokenUsage::new(5, 2))),
        AgentSettings::new("agent-model"),
    );
    let outcome = RunOrchestrator::new(agent)
        .with_output_base(output.path())
        .run(tasks.path())
        .await
        .expect("run");

    let judge = Judge::new(Arc::new(ScriptedProvider::new().with_reply(verdict(true))), "judge-model");
    let summary = evaluate_run(&outcome.run_id, output.path(), &judge)
        .await
        .expect("evaluate");

    assert_eq!(summary.num_tasks, 1);
    assert_eq!(summary.avg_score, 1.0);
    assert_eq!(summary.total_token_usage.total_tokens, 7);
}

#[tokio::test]
async fn agent_failure_aborts_without_manifest() {
    let tasks = TempDir::new().expect("tempdir");
    let output = TempDir::new().expect("tempdir");
    for id in ["t1", "t2", "t3"] {
        write_task(tasks.path(), id, &format!("prompt {id}"), &["anything"]);
    }

    let provider = Arc::new(
        ScriptedProvider::new()
            .with_reply("first")
            .with_failure("upstream timeout")
            .with_reply("third"),
    );
    let agent = build_agent(AgentKind::Direct, provider.clone(), AgentSettings::new("agent-model"));
    let error = RunOrchestrator::new(agent)
        .with_output_base(output.path())
        .run(tasks.path())
        .await
        .unwrap_err();

    assert!(matches!(error, BenchError::AgentInvocation { ref task_id, .. } if task_id == "t2"));
    assert_eq!(provider.remaining(), 1);

    let run_dir = only_run_dir(output.path());
    assert_eq!(file_names(&run_dir), vec!["t1.json"]);
}

#[tokio::test]
async fn isolated_failure_is_graded_like_any_task() {
    let tasks = TempDir::new().expect("tempdir");
    let output = TempDir::new().expect("tempdir");
    write_task(tasks.path(), "a", "prompt a", &["anything"]);
    write_task(tasks.path(), "b", "prompt b", &["anything"]);

    let agent = build_agent(
        AgentKind::Direct,
        Arc::new(ScriptedProvider::new().with_failure("boom").with_reply("fine")),
        AgentSettings::new("agent-model"),
    );
    let outcome = RunOrchestrator::new(agent)
        .with_output_base(output.path())
        .with_failure_policy(FailurePolicy::Isolate)
        .run(tasks.path())
        .await
        .expect("run");

    let failed: TaskResultRecord = store::read_json(&outcome.run_dir.join("a.json")).expect("a");
    assert!(failed.error.is_some());
    assert_eq!(outcome.manifest.num_tasks, 2);

    let judge = Judge::new(
        Arc::new(ScriptedProvider::new().with_reply(verdict(false)).with_reply(verdict(true))),
        "judge-model",
    );
    let summary = evaluate_run(&outcome.run_id, output.path(), &judge)
        .await
        .expect("evaluate");
    assert_eq!(summary.avg_score, 0.5);
}

#[tokio::test]
async fn concurrent_grading_keeps_file_order() {
    let tasks = TempDir::new().expect("tempdir");
    let output = TempDir::new().expect("tempdir");
    for id in ["t1", "t2", "t3"] {
        write_task(tasks.path(), id, &format!("prompt {id}"), &["relevant", "polite"]);
    }

    let agent = build_agent(
        AgentKind::Direct,
        Arc::new(
            ScriptedProvider::new()
                .with_reply("one")
                .with_reply("two")
                .with_reply("three"),
        ),
        AgentSettings::new("agent-model"),
    );
    let outcome = RunOrchestrator::new(agent)
        .with_output_base(output.path())
        .run(tasks.path())
        .await
        .expect("run");

    let judge_provider = ScriptedProvider::new();
    for _ in 0..6 {
        judge_provider.push(agentbench::providers::scripted::ScriptedReply::Message {
            message: agentbench::ChatMessage::assistant(verdict(true)),
            usage: None,
        });
    }
    let judge = Judge::new(Arc::new(judge_provider), "judge-model");
    let summary = evaluate_run_with(
        &outcome.run_id,
        output.path(),
        &judge,
        EvaluateOptions { concurrency: 3 },
    )
    .await
    .expect("evaluate");

    assert_eq!(summary.avg_score, 1.0);
    let grades: GradesFile = store::read_json(&outcome.run_dir.join("grades.json")).expect("grades");
    let ids: Vec<&str> = grades.grades.iter().map(|g| g.task_id.as_str()).collect();
    assert_eq!(ids, vec!["t1", "t2", "t3"]);
}

#[tokio::test]
async fn empty_rubric_scores_zero_without_judge_calls() {
    let tasks = TempDir::new().expect("tempdir");
    let output = TempDir::new().expect("tempdir");
    write_task(tasks.path(), "bare", "Do something", &[]);

    let agent = build_agent(
        AgentKind::Direct,
        Arc::new(ScriptedProvider::new().with_reply("done")),
        AgentSettings::new("agent-model"),
    );
    let outcome = RunOrchestrator::new(agent)
        .with_output_base(output.path())
        .run(tasks.path())
        .await
        .expect("run");

    let judge_provider = Arc::new(ScriptedProvider::new());
    let judge = Judge::new(judge_provider.clone(), "judge-model");
    let summary = evaluate_run(&outcome.run_id, output.path(), &judge)
        .await
        .expect("evaluate");

    assert!(judge_provider.requests().is_empty());
    assert_eq!(summary.avg_score, 0.0);
    let grades: GradesFile = store::read_json(&outcome.run_dir.join("grades.json")).expect("grades");
    assert_eq!((grades.grades[0].passed, grades.grades[0].total), (0, 0));
}

#[tokio::test]
async fn evaluating_an_unknown_run_is_not_found() {
    let output = TempDir::new().expect("tempdir");
    let judge = Judge::new(Arc::new(ScriptedProvider::new()), "judge-model");

    let error = evaluate_run("does-not-exist", output.path(), &judge)
        .await
        .unwrap_err();
    assert!(matches!(error, BenchError::NotFound { .. }));
}

#[tokio::test]
async fn judge_failure_fails_the_evaluation() {
    let tasks = TempDir::new().expect("tempdir");
    let output = TempDir::new().expect("tempdir");
    write_task(tasks.path(), "t1", "prompt", &["criterion"]);

    let agent = build_agent(
        AgentKind::Direct,
        Arc::new(ScriptedProvider::new().with_reply("answer")),
        AgentSettings::new("agent-model"),
    );
    let outcome = RunOrchestrator::new(agent)
        .with_output_base(output.path())
        .run(tasks.path())
        .await
        .expect("run");

    let judge = Judge::new(
        Arc::new(ScriptedProvider::new().with_reply(r#"{"reasoning": "x", "score": 1}"#)),
        "judge-model",
    );
    let error = evaluate_run(&outcome.run_id, output.path(), &judge)
        .await
        .unwrap_err();

    match error {
        BenchError::Grading { task_id, path, source } => {
            assert_eq!(task_id, "t1");
            assert_eq!(path, outcome.run_dir.join("t1.json"));
            assert!(matches!(*source, BenchError::JudgeOutput(_)));
        }
        other => panic!("expected grading error, got {other}"),
    }
    assert!(!outcome.run_dir.join("grades.json").exists());
    assert!(!outcome.run_dir.join("final.json").exists());
}
