use std::{path::PathBuf, process::ExitCode, sync::Arc};

use agentbench::{
    build_agent,
    config::BenchConfig,
    eval::{evaluate_run_with, recompute_summary, EvaluateOptions, Judge},
    functions::http::load_http_tools,
    AgentKind, AgentSettings, BenchError, FailurePolicy, LLMProvider, RunOrchestrator,
};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "agentbench")]
#[command(about = "Run agents over rubric-graded tasks and grade them with an LLM judge")]
struct Cli {
    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run an agent over every task in a directory
    Run {
        #[arg(value_enum)]
        agent: AgentKind,

        tasks_dir: PathBuf,

        /// Base directory for run outputs
        #[arg(short, long, default_value = "output")]
        output: PathBuf,

        #[arg(short, long)]
        system_prompt: Option<String>,

        /// YAML file of HTTP tools exposed to react/deep agents
        #[arg(long)]
        tools: Option<PathBuf>,

        /// Model calls allowed per task for tool-using agents
        #[arg(long, default_value_t = 25)]
        max_steps: usize,

        /// Record agent failures per task instead of stopping the run
        #[arg(long)]
        isolate_failures: bool,
    },
    /// Judge every task result of a run and write grades.json and final.json
    Evaluate {
        run_id: String,

        #[arg(short, long, default_value = "output")]
        output: PathBuf,

        /// Tasks graded concurrently
        #[arg(long, default_value_t = 1)]
        concurrency: usize,
    },
    /// Recompute final.json from grades.json
    Summarize {
        run_id: String,

        #[arg(short, long, default_value = "output")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)))
        .init();

    match execute(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "agentbench failed");
            ExitCode::FAILURE
        }
    }
}

async fn execute(command: Command) -> Result<(), BenchError> {
    match command {
        Command::Run {
            agent,
            tasks_dir,
            output,
            system_prompt,
            tools,
            max_steps,
            isolate_failures,
        } => {
            let config = BenchConfig::from_env()?;
            let provider = config.agent_model.provider()?;
            info!(provider = provider.name(), model = %config.agent_model.model, "agent model");
            let mut settings =
                AgentSettings::new(config.agent_model.model.clone()).with_max_steps(max_steps);
            if let Some(path) = tools {
                let registry = load_http_tools(&path)?;
                info!(tools = registry.len(), path = %path.display(), "loaded HTTP tools");
                settings = settings.with_tools(Arc::new(registry));
            }

            let agent = build_agent(agent, provider, settings);
            let mut orchestrator = RunOrchestrator::new(agent).with_output_base(output);
            if let Some(system_prompt) = system_prompt {
                orchestrator = orchestrator.with_system_prompt(system_prompt);
            }
            if isolate_failures {
                orchestrator = orchestrator.with_failure_policy(FailurePolicy::Isolate);
            }

            let outcome = orchestrator.run(&tasks_dir).await?;
            println!("{}", outcome.run_id);
        }
        Command::Evaluate {
            run_id,
            output,
            concurrency,
        } => {
            let config = BenchConfig::from_env()?;
            let provider = config.judge_model.provider()?;
            info!(provider = provider.name(), model = %config.judge_model.model, "judge model");
            let judge = Judge::new(provider, config.judge_model.model.clone());
            evaluate_run_with(&run_id, &output, &judge, EvaluateOptions { concurrency }).await?;
        }
        Command::Summarize { run_id, output } => {
            let summary = recompute_summary(&output.join(&run_id))?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }

    Ok(())
}
