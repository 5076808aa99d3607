//! Oracle prompts for analysis and delegate voting.
//!
//! Each prompt opens with one instruction paragraph that asks exactly one
//! question and names the reply format, followed by the proposal text and,
//! for delegate prompts, the AI analysis and the member's preferences.
//! Every instruction carries a phrase that appears in no other prompt; see
//! [`task_marker`].

use aigov_core::{
    format_preferences, Category, Confidence, PreferenceProfile, ProposalAttributes, RiskScore,
    Vote,
};

use crate::oracle::OracleTask;

/// System message sent ahead of every prompt by provider-backed oracles.
pub const SYSTEM_PROMPT: &str = "You assist members of a DAO with governance decisions. \
Answer exactly in the format the request asks for. When a single value is requested, \
reply with that value alone and no commentary.";

const ANALYST: &str = "You are an AI assistant for a DAO governance platform.";
const DELEGATE: &str = "You are an AI delegate for a DAO governance platform. \
                        Based on the user's preferences and the proposal details,";

const SUMMARY_MARKER: &str = "Summarize the following proposal";
const RISK_MARKER: &str = "assign a risk score from 1-10";
const CATEGORY_MARKER: &str = "Categorize the following proposal";
const EXPLANATION_MARKER: &str = "Explain why this classification and risk score are appropriate";
const VOTE_MARKER: &str = "Return only 'For' or 'Against'.";
const CONFIDENCE_MARKER: &str = "determine your confidence level (0-100%)";
const REASONING_MARKER: &str = "Explain why you recommended voting";

/// A phrase unique to the instruction of `task`'s prompt.
pub fn task_marker(task: OracleTask) -> &'static str {
    match task {
        OracleTask::Summary => SUMMARY_MARKER,
        OracleTask::RiskScore => RISK_MARKER,
        OracleTask::Category => CATEGORY_MARKER,
        OracleTask::Explanation => EXPLANATION_MARKER,
        OracleTask::Vote => VOTE_MARKER,
        OracleTask::Confidence => CONFIDENCE_MARKER,
        OracleTask::Reasoning => REASONING_MARKER,
    }
}

/// Identify which task a prompt asks, from its instruction paragraph only.
pub fn task_of(prompt: &str) -> Option<OracleTask> {
    let instruction = prompt.split("\n\n").next().unwrap_or(prompt);
    OracleTask::ALL
        .into_iter()
        .find(|task| instruction.contains(task_marker(*task)))
}

pub fn summary_prompt(proposal_text: &str) -> String {
    format!(
        "{ANALYST} {SUMMARY_MARKER} in a concise TL;DR format (max 2 sentences).\n\n\
         Proposal:\n{proposal_text}"
    )
}

pub fn risk_prompt(proposal_text: &str) -> String {
    format!(
        "{ANALYST} Analyze the following proposal and {RISK_MARKER} \
         (where 1 is lowest risk and 10 is highest risk). Consider financial, technical, \
         and governance risks. Return only the numeric score.\n\n\
         Proposal:\n{proposal_text}"
    )
}

pub fn category_prompt(proposal_text: &str) -> String {
    let categories = Category::ALL
        .iter()
        .map(|c| c.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "{ANALYST} {CATEGORY_MARKER} into one of these categories: {categories}. \
         Return only the category name.\n\n\
         Proposal:\n{proposal_text}"
    )
}

pub fn explanation_prompt(
    proposal_text: &str,
    category: Category,
    risk_score: RiskScore,
) -> String {
    format!(
        "{ANALYST} This proposal has been classified as {category} with a risk score of \
         {risk_score}/10. {EXPLANATION_MARKER} in 2-3 sentences.\n\n\
         Proposal:\n{proposal_text}"
    )
}

/// Proposal text, AI analysis and preferences shared by the delegate prompts.
fn delegate_context(
    proposal_text: &str,
    attributes: &ProposalAttributes,
    profile: &PreferenceProfile,
) -> String {
    format!(
        "Proposal:\n{proposal_text}\n\n\
         AI Analysis:\n\
         Summary: {}\n\
         Category: {}\n\
         Risk Score: {}/10\n\n\
         User Preferences:\n{}",
        attributes.summary,
        attributes.category,
        attributes.risk_score,
        format_preferences(profile)
    )
}

pub fn vote_prompt(
    proposal_text: &str,
    attributes: &ProposalAttributes,
    profile: &PreferenceProfile,
) -> String {
    format!(
        "{DELEGATE} determine how the user would likely vote. {VOTE_MARKER}\n\n{}",
        delegate_context(proposal_text, attributes, profile)
    )
}

pub fn confidence_prompt(
    proposal_text: &str,
    attributes: &ProposalAttributes,
    profile: &PreferenceProfile,
    vote: Vote,
) -> String {
    format!(
        "{DELEGATE} {CONFIDENCE_MARKER} in your vote recommendation. \
         Return only the numeric percentage.\n\n{}\n\nVote: {vote}",
        delegate_context(proposal_text, attributes, profile)
    )
}

pub fn reasoning_prompt(
    proposal_text: &str,
    attributes: &ProposalAttributes,
    profile: &PreferenceProfile,
    vote: Vote,
    confidence: Confidence,
) -> String {
    format!(
        "You are an AI delegate for a DAO governance platform. {REASONING_MARKER} '{vote}' \
         on this proposal with {confidence}% confidence, based on the user's preferences.\n\n{}",
        delegate_context(proposal_text, attributes, profile)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn profile() -> PreferenceProfile {
        PreferenceProfile::new(3, 5, 2, 4, "conservative", Some("Never fund marketing".into()))
            .unwrap()
    }

    fn attributes() -> ProposalAttributes {
        ProposalAttributes {
            summary: "Move 40% of the treasury into a new token.".to_string(),
            risk_score: RiskScore::new(9).unwrap(),
            category: Category::Finance,
            explanation: "Large treasury exposure.".to_string(),
        }
    }

    fn every_prompt() -> Vec<(OracleTask, String)> {
        let text = "Allocate treasury funds";
        let (a, p) = (attributes(), profile());
        vec![
            (OracleTask::Summary, summary_prompt(text)),
            (OracleTask::RiskScore, risk_prompt(text)),
            (OracleTask::Category, category_prompt(text)),
            (
                OracleTask::Explanation,
                explanation_prompt(text, a.category, a.risk_score),
            ),
            (OracleTask::Vote, vote_prompt(text, &a, &p)),
            (OracleTask::Confidence, confidence_prompt(text, &a, &p, Vote::Against)),
            (
                OracleTask::Reasoning,
                reasoning_prompt(text, &a, &p, Vote::Against, Confidence::new(85).unwrap()),
            ),
        ]
    }

    #[test]
    fn test_each_marker_identifies_exactly_one_prompt() {
        let prompts = every_prompt();
        for (task, prompt) in &prompts {
            assert_eq!(task_of(prompt), Some(*task), "prompt for {task}");
            let hits = prompts
                .iter()
                .filter(|(_, other)| other.contains(task_marker(*task)))
                .count();
            assert_eq!(hits, 1, "marker for {task} is not unique");
        }
    }

    #[test]
    fn test_task_of_ignores_proposal_body() {
        let prompt = summary_prompt("Return only 'For' or 'Against'.");
        assert_eq!(task_of(&prompt), Some(OracleTask::Summary));
        assert_eq!(task_of("hello"), None);
    }

    #[test]
    fn test_explanation_embeds_classification() {
        let prompt = explanation_prompt("x", Category::Finance, RiskScore::new(9).unwrap());
        assert!(prompt.contains("classified as Finance with a risk score of 9/10"));
    }

    #[test]
    fn test_delegate_prompts_embed_analysis_and_preferences() {
        for (task, prompt) in every_prompt().into_iter().skip(4) {
            assert!(prompt.contains("Allocate treasury funds"), "{task}");
            assert!(prompt.contains("Category: Finance"), "{task}");
            assert!(prompt.contains("Risk Score: 9/10"), "{task}");
            assert!(prompt.contains("Risk Tolerance: 3/10"), "{task}");
            assert!(prompt.contains("Custom Rules: Never fund marketing"), "{task}");
        }
    }

    #[test]
    fn test_later_delegate_prompts_carry_earlier_outcomes() {
        let (a, p) = (attributes(), profile());
        let confidence = confidence_prompt("x", &a, &p, Vote::Against);
        assert!(confidence.ends_with("Vote: Against"));

        let reasoning = reasoning_prompt("x", &a, &p, Vote::Against, Confidence::new(85).unwrap());
        assert!(reasoning.contains("voting 'Against' on this proposal with 85% confidence"));
    }

    proptest! {
        #[test]
        fn proposal_text_never_changes_the_task(text in "\\PC{0,200}") {
            let (a, p) = (attributes(), profile());
            prop_assert_eq!(task_of(&summary_prompt(&text)), Some(OracleTask::Summary));
            prop_assert_eq!(task_of(&risk_prompt(&text)), Some(OracleTask::RiskScore));
            prop_assert_eq!(task_of(&category_prompt(&text)), Some(OracleTask::Category));
            prop_assert_eq!(task_of(&vote_prompt(&text, &a, &p)), Some(OracleTask::Vote));
            prop_assert_eq!(
                task_of(&confidence_prompt(&text, &a, &p, Vote::For)),
                Some(OracleTask::Confidence)
            );
        }
    }
}
