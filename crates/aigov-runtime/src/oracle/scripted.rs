//! Deterministic oracles for tests and `mode: mock`.

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{Oracle, OracleError, OracleTask};
use crate::prompts;

#[derive(Debug, Clone)]
enum Reply {
    Text(String),
    Fail(String),
}

/// Answers prompts from ordered (substring, reply) rules.
///
/// The first rule whose pattern occurs in the prompt wins. A prompt that
/// matches no rule gets the default reply, or fails when there is none.
/// Every prompt is recorded in arrival order.
#[derive(Debug, Default)]
pub struct ScriptedOracle {
    rules: Vec<(String, Reply)>,
    default: Option<Reply>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply with `reply` to prompts containing `pattern`.
    pub fn on(mut self, pattern: impl Into<String>, reply: impl Into<String>) -> Self {
        self.rules
            .push((pattern.into(), Reply::Text(reply.into())));
        self
    }

    /// Reply with `reply` to the prompt for `task`.
    pub fn on_task(self, task: OracleTask, reply: impl Into<String>) -> Self {
        self.on(prompts::task_marker(task), reply)
    }

    /// Fail prompts containing `pattern`.
    pub fn fail_on(mut self, pattern: impl Into<String>, message: impl Into<String>) -> Self {
        self.rules
            .push((pattern.into(), Reply::Fail(message.into())));
        self
    }

    pub fn fail_task(self, task: OracleTask, message: impl Into<String>) -> Self {
        self.fail_on(prompts::task_marker(task), message)
    }

    pub fn otherwise(mut self, reply: impl Into<String>) -> Self {
        self.default = Some(Reply::Text(reply.into()));
        self
    }

    pub fn fail_otherwise(mut self, message: impl Into<String>) -> Self {
        self.default = Some(Reply::Fail(message.into()));
        self
    }

    /// A plausible fixed script covering every task, for offline runs.
    pub fn demo() -> Self {
        Self::new()
            .on_task(
                OracleTask::Summary,
                "The proposal requests a change to DAO operations. It should be reviewed \
                 against the treasury and community impact.",
            )
            .on_task(OracleTask::RiskScore, "5")
            .on_task(OracleTask::Category, "Governance")
            .on_task(
                OracleTask::Explanation,
                "The proposal changes how the DAO operates, which places it under \
                 Governance. Its impact is moderate and reversible.",
            )
            .on_task(OracleTask::Vote, "For")
            .on_task(OracleTask::Confidence, "70")
            .on_task(
                OracleTask::Reasoning,
                "The moderate risk fits the stated tolerance and the change supports \
                 community priorities.",
            )
    }

    /// Every prompt received so far, oldest first.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    /// The task of every prompt received so far, oldest first.
    pub fn tasks_seen(&self) -> Vec<OracleTask> {
        self.prompts
            .lock()
            .iter()
            .filter_map(|p| prompts::task_of(p))
            .collect()
    }

    fn reply_for(&self, prompt: &str) -> Option<&Reply> {
        self.rules
            .iter()
            .find(|(pattern, _)| prompt.contains(pattern.as_str()))
            .map(|(_, reply)| reply)
            .or(self.default.as_ref())
    }
}

#[async_trait]
impl Oracle for ScriptedOracle {
    async fn complete(&self, prompt: &str) -> Result<String, OracleError> {
        self.prompts.lock().push(prompt.to_string());

        match self.reply_for(prompt) {
            Some(Reply::Text(text)) => Ok(text.clone()),
            Some(Reply::Fail(message)) => Err(OracleError::Unavailable(message.clone())),
            None => Err(OracleError::Unavailable(
                "no scripted reply for prompt".to_string(),
            )),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// An oracle that is always down.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingOracle;

#[async_trait]
impl Oracle for FailingOracle {
    async fn complete(&self, _prompt: &str) -> Result<String, OracleError> {
        Err(OracleError::Unavailable("oracle is offline".to_string()))
    }

    fn name(&self) -> &str {
        "failing"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_matching_rule_wins() {
        let oracle = ScriptedOracle::new()
            .on("risk", "7")
            .on("risk score", "2")
            .otherwise("fallthrough");

        assert_eq!(oracle.complete("assign a risk score").await.unwrap(), "7");
        assert_eq!(oracle.complete("something else").await.unwrap(), "fallthrough");
        assert_eq!(oracle.prompts().len(), 2);
    }

    #[tokio::test]
    async fn test_unmatched_prompt_without_default_fails() {
        let oracle = ScriptedOracle::new().on("a", "b");
        assert!(matches!(
            oracle.complete("zzz").await,
            Err(OracleError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_fail_rules() {
        let oracle = ScriptedOracle::new()
            .fail_on("vote", "rate limited")
            .otherwise("ok");
        match oracle.complete("how to vote").await {
            Err(OracleError::Unavailable(msg)) => assert_eq!(msg, "rate limited"),
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_demo_script_answers_every_task() {
        let oracle = ScriptedOracle::demo();
        let profile = aigov_core::PreferenceProfile::new(5, 3, 3, 3, "balanced", None).unwrap();
        let attributes = aigov_core::ProposalAttributes::fallback();

        let all_prompts = [
            prompts::summary_prompt("text"),
            prompts::risk_prompt("text"),
            prompts::category_prompt("text"),
            prompts::explanation_prompt("text", aigov_core::Category::Other, attributes.risk_score),
            prompts::vote_prompt("text", &attributes, &profile),
            prompts::confidence_prompt("text", &attributes, &profile, aigov_core::Vote::For),
            prompts::reasoning_prompt(
                "text",
                &attributes,
                &profile,
                aigov_core::Vote::For,
                aigov_core::Confidence::new(70).unwrap(),
            ),
        ];
        for prompt in &all_prompts {
            assert!(oracle.complete(prompt).await.is_ok());
        }
        assert_eq!(oracle.tasks_seen(), OracleTask::ALL.to_vec());
    }

    #[tokio::test]
    async fn test_failing_oracle() {
        assert!(FailingOracle.complete("anything").await.is_err());
    }
}
