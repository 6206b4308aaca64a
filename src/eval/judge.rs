//! LLM-as-judge grading of one response against a rubric.
//!
//! Every criterion is judged in its own single-message conversation so one
//! verdict cannot leak into the next. The judge must answer with exactly
//! `{"reasoning": <string>, "score": <bool>}`; anything else is a
//! [`JudgeOutputError`].

use std::sync::Arc;

use handlebars::Handlebars;
use jsonschema::{Draft, JSONSchema};
use once_cell::sync::Lazy;
use regex::Regex;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::{
    eval::report::{EvalResult, JudgmentResult},
    tasks::preview,
    types::{ChatMessage, CompletionRequest},
    BenchError, JudgeOutputError, LLMProvider,
};

const PROMPT_TEMPLATE: &str = "judge";

const JUDGE_PROMPT: &str = "\
You are an expert evaluator. Judge whether the agent's response satisfies the following criterion.

Criterion: {{criterion}}

Question asked to the agent:
{{question}}

Agent's response:
{{response}}

Reference (gold) answer:
{{reference}}

Return score=true if the criterion is satisfied, false otherwise. Explain your reasoning briefly.
";

/// Structured verdict for one criterion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct JudgeOutput {
    pub reasoning: String,
    pub score: bool,
}

static TEMPLATES: Lazy<Handlebars<'static>> = Lazy::new(|| {
    let mut hb = Handlebars::new();
    hb.register_escape_fn(handlebars::no_escape);
    hb.set_strict_mode(true);
    hb.register_template_string(PROMPT_TEMPLATE, JUDGE_PROMPT)
        .expect("judge prompt template should parse");
    hb
});

static OUTPUT_SCHEMA: Lazy<Value> = Lazy::new(|| {
    let mut schema = serde_json::to_value(schema_for!(JudgeOutput))
        .expect("schema serialization should not fail");
    if let Some(object) = schema.as_object_mut() {
        object.remove("$schema");
    }
    schema
});

static OUTPUT_VALIDATOR: Lazy<JSONSchema> = Lazy::new(|| {
    JSONSchema::options()
        .with_draft(Draft::Draft7)
        .compile(&OUTPUT_SCHEMA)
        .expect("judge output schema should compile")
});

static RE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:json)?\s*(.*?)\s*```$").unwrap());

#[derive(Serialize)]
struct PromptData<'a> {
    criterion: &'a str,
    question: &'a str,
    response: &'a str,
    reference: &'a str,
}

/// `response_format` payload asking for strict `JudgeOutput` JSON.
pub fn response_format() -> Value {
    json!({
        "type": "json_schema",
        "json_schema": {
            "name": "judge_output",
            "strict": true,
            "schema": OUTPUT_SCHEMA.clone(),
        }
    })
}

pub fn render_prompt(
    criterion: &str,
    question: &str,
    response: &str,
    reference: &str,
) -> Result<String, BenchError> {
    let data = PromptData {
        criterion,
        question,
        response,
        reference,
    };
    Ok(TEMPLATES.render(PROMPT_TEMPLATE, &data)?)
}

/// Decodes a judge reply. A single ```json fence around the object is
/// tolerated.
pub fn parse_judge_output(content: &str) -> Result<JudgeOutput, JudgeOutputError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(JudgeOutputError::Empty);
    }

    let body = match RE_FENCE.captures(trimmed).and_then(|caps| caps.get(1)) {
        Some(inner) => inner.as_str(),
        None => trimmed,
    };

    let value: Value =
        serde_json::from_str(body).map_err(|error| JudgeOutputError::NotJson(error.to_string()))?;

    if let Err(errors) = OUTPUT_VALIDATOR.validate(&value) {
        return Err(JudgeOutputError::Schema(
            errors.map(|error| error.to_string()).collect(),
        ));
    }

    serde_json::from_value(value).map_err(|error| JudgeOutputError::Shape(error.to_string()))
}

#[derive(Clone)]
pub struct Judge {
    provider: Arc<dyn LLMProvider>,
    model: String,
}

impl Judge {
    pub fn new(provider: Arc<dyn LLMProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn judge_criterion(
        &self,
        criterion: &str,
        prompt: &str,
        agent_output: &str,
        gold_response: &str,
    ) -> Result<JudgmentResult, BenchError> {
        debug!(model = %self.model, "Judging criterion: {}", preview(criterion, 80));
        let content = render_prompt(criterion, prompt, agent_output, gold_response)?;

        let request = CompletionRequest::new(self.model.clone(), vec![ChatMessage::user(content)])
            .with_temperature(0.0)
            .with_response_format(response_format());

        let response = self
            .provider
            .complete(request)
            .await
            .map_err(|source| BenchError::JudgeInvocation {
                criterion: criterion.to_string(),
                source,
            })?;

        let verdict = parse_judge_output(response.message.text().unwrap_or_default())?;
        let mark = if verdict.score { "PASS" } else { "FAIL" };
        info!("[{mark}] {}", preview(criterion, 80));

        Ok(JudgmentResult {
            criterion: criterion.to_string(),
            score: verdict.score,
            comment: verdict.reasoning,
        })
    }

    /// Judges every criterion in rubric order. The first failing call aborts
    /// the whole task.
    pub async fn judge(
        &self,
        prompt: &str,
        agent_output: &str,
        rubric: &[String],
        gold_response: &str,
    ) -> Result<EvalResult, BenchError> {
        let mut judgments = Vec::with_capacity(rubric.len());
        for criterion in rubric {
            judgments.push(
                self.judge_criterion(criterion, prompt, agent_output, gold_response)
                    .await?,
            );
        }
        Ok(EvalResult::from_judgments(judgments))
    }
}
