//! Proposal analysis.
//!
//! Four oracle questions per proposal. Summary, risk score and category
//! are independent and asked concurrently; the explanation needs the
//! category and risk score, so it is asked last. If any step fails the
//! whole analysis is replaced by the fixed fallback: partial results are
//! never returned.

use std::sync::Arc;
use thiserror::Error;

use aigov_core::{
    parse_category, parse_risk_score, ParseError, ProposalAttributes, ValidationError,
};

use crate::oracle::{GuardedOracle, OracleError, OracleTask};
use crate::prompts;

/// A failed oracle step, before the fallback is applied.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("{task} request failed: {source}")]
    Oracle {
        task: OracleTask,
        #[source]
        source: OracleError,
    },

    #[error("Unusable {task} reply: {source}")]
    Parse {
        task: OracleTask,
        #[source]
        source: ParseError,
    },
}

impl AnalysisError {
    pub fn task(&self) -> OracleTask {
        match self {
            AnalysisError::Oracle { task, .. } | AnalysisError::Parse { task, .. } => *task,
        }
    }
}

pub(crate) async fn ask(
    oracle: &GuardedOracle,
    task: OracleTask,
    prompt: &str,
) -> Result<String, AnalysisError> {
    oracle
        .ask(task, prompt)
        .await
        .map(|reply| reply.trim().to_string())
        .map_err(|source| AnalysisError::Oracle { task, source })
}

pub struct ProposalAnalyzer {
    oracle: Arc<GuardedOracle>,
}

impl ProposalAnalyzer {
    pub fn new(oracle: Arc<GuardedOracle>) -> Self {
        Self { oracle }
    }

    /// Analyze proposal text, falling back on any oracle failure.
    ///
    /// Only blank text is an error; everything else yields attributes.
    pub async fn analyze(
        &self,
        proposal_text: &str,
    ) -> Result<ProposalAttributes, ValidationError> {
        if proposal_text.trim().is_empty() {
            return Err(ValidationError::EmptyField("proposal text"));
        }

        match self.try_analyze(proposal_text).await {
            Ok(attributes) => Ok(attributes),
            Err(e) => {
                tracing::warn!(
                    task = %e.task(),
                    oracle = self.oracle.name(),
                    error = %e,
                    "Proposal analysis failed, using fallback"
                );
                Ok(ProposalAttributes::fallback())
            }
        }
    }

    /// Analyze without the fallback.
    pub async fn try_analyze(
        &self,
        proposal_text: &str,
    ) -> Result<ProposalAttributes, AnalysisError> {
        let summary_prompt = prompts::summary_prompt(proposal_text);
        let risk_prompt = prompts::risk_prompt(proposal_text);
        let category_prompt = prompts::category_prompt(proposal_text);

        let (summary, risk, category) = tokio::join!(
            ask(&self.oracle, OracleTask::Summary, &summary_prompt),
            ask(&self.oracle, OracleTask::RiskScore, &risk_prompt),
            ask(&self.oracle, OracleTask::Category, &category_prompt),
        );

        let summary = summary?;
        let risk_score = parse_risk_score(&risk?).map_err(|source| AnalysisError::Parse {
            task: OracleTask::RiskScore,
            source,
        })?;
        let category = parse_category(&category?).map_err(|source| AnalysisError::Parse {
            task: OracleTask::Category,
            source,
        })?;

        let explanation_prompt = prompts::explanation_prompt(proposal_text, category, risk_score);
        let explanation = ask(&self.oracle, OracleTask::Explanation, &explanation_prompt).await?;

        tracing::debug!(
            risk_score = risk_score.get(),
            category = %category,
            "Proposal analyzed"
        );

        Ok(ProposalAttributes {
            summary,
            risk_score,
            category,
            explanation,
        })
    }
}
