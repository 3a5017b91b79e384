//! Conversation context management.
//!
//! Keeps a sliding window of recent turns, classifies new input as a
//! follow-up or a fresh query, rewrites follow-ups against the latest turn,
//! and decides between retrieval and a clarifying question.

use std::collections::VecDeque;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::debug;

use deskmate_core::config::ConversationConfig;
use deskmate_core::types::{IntentLabel, Turn};
use deskmate_nlu::text::word_count;
use deskmate_nlu::Prediction;

/// Cues that mark a follow-up regardless of length.
static STRONG_CUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:what\s+if|what\s+about|how\s+about|that|this)\b").unwrap()
});

/// Cues that only count in short queries.
static WEAK_CUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:and|also|but|however|still|it|them|those)\b").unwrap()
});

/// Labels scoring within this margin of the top score are offered together.
const CLOSE_SCORE_MARGIN: f32 = 0.1;

pub const GENERIC_CLARIFICATION: &str = "I'm not sure I understand your question. \
Could you please rephrase it? I can help you with billing, technical issues, \
account management, or complaints.";

// =============================================================================
// State
// =============================================================================

/// Where a session is in the dialogue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    /// Waiting for a new query.
    #[default]
    AwaitingQuery,
    /// The current input refers back to the previous turn.
    FollowUpDetected,
    /// A clarifying question was asked; a short reply answers it.
    Clarifying,
}

// =============================================================================
// ConversationContext
// =============================================================================

/// The last N turns of a session, oldest first.
#[derive(Debug, Clone)]
pub struct ConversationContext {
    turns: VecDeque<Turn>,
    capacity: usize,
}

impl ConversationContext {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            turns: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a turn, evicting the oldest when the window is full.
    /// Returns the evicted turn, if any.
    pub fn push(&mut self, turn: Turn) -> Option<Turn> {
        self.turns.push_back(turn);
        if self.turns.len() > self.capacity {
            self.turns.pop_front()
        } else {
            None
        }
    }

    /// The chronologically latest turn.
    pub fn latest(&self) -> Option<&Turn> {
        self.turns.back()
    }

    pub fn get(&self, id: uuid::Uuid) -> Option<&Turn> {
        self.turns.iter().find(|t| t.id == id)
    }

    pub fn turns(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}

// =============================================================================
// Follow-up classification and planning
// =============================================================================

/// Outcome of follow-up classification.
#[derive(Debug, Clone, Copy)]
pub enum FollowUp<'a> {
    NotFollowUp,
    /// Refers to this turn, always the latest one in the window.
    FollowUp(&'a Turn),
}

impl<'a> FollowUp<'a> {
    pub fn is_follow_up(&self) -> bool {
        matches!(self, FollowUp::FollowUp(_))
    }

    pub fn referenced(&self) -> Option<&'a Turn> {
        match self {
            FollowUp::FollowUp(turn) => Some(turn),
            FollowUp::NotFollowUp => None,
        }
    }
}

/// What to do with the current turn.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnPlan {
    /// Search the knowledge base with `query`.
    Retrieve {
        query: String,
        rewritten: Option<String>,
        intent_filter: Option<IntentLabel>,
        /// The referenced turn's intent when it differs from
        /// `intent_filter`; searched as well and kept if it scores higher.
        context_filter: Option<IntentLabel>,
    },
    /// Ask a clarifying question instead of retrieving.
    Clarify { question: String },
}

impl TurnPlan {
    /// State the session moves to once the turn is answered.
    pub fn next_state(&self) -> ConversationState {
        match self {
            TurnPlan::Retrieve { .. } => ConversationState::AwaitingQuery,
            TurnPlan::Clarify { .. } => ConversationState::Clarifying,
        }
    }
}

/// Drives the per-session dialogue state machine.
pub struct ConversationManager {
    config: ConversationConfig,
}

impl ConversationManager {
    pub fn new(config: ConversationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ConversationConfig {
        &self.config
    }

    pub fn is_short(&self, text: &str) -> bool {
        word_count(text) <= self.config.short_query_words
    }

    /// Decide whether `text` continues the latest turn in `context`.
    pub fn classify<'a>(
        &self,
        text: &str,
        context: &'a ConversationContext,
        state: ConversationState,
    ) -> FollowUp<'a> {
        let Some(latest) = context.latest() else {
            return FollowUp::NotFollowUp;
        };
        if text.trim().is_empty() {
            return FollowUp::NotFollowUp;
        }

        let short = self.is_short(text);
        let follow_up = STRONG_CUE.is_match(text)
            || (short && WEAK_CUE.is_match(text))
            || (short && state == ConversationState::Clarifying);

        if follow_up {
            debug!(referenced = %latest.id, "Follow-up detected");
            FollowUp::FollowUp(latest)
        } else {
            FollowUp::NotFollowUp
        }
    }

    /// `"{prior raw query} {text}"` for a follow-up; `None` otherwise.
    pub fn rewrite(text: &str, follow_up: FollowUp<'_>) -> Option<String> {
        follow_up
            .referenced()
            .map(|prior| format!("{} {}", prior.raw_text.trim(), text.trim()))
    }

    /// Choose between retrieval and a clarifying question.
    ///
    /// Follow-ups always retrieve with the rewritten query. A confident
    /// current intent is the filter; the referenced turn's confident
    /// intent fills in when the current one is not, and otherwise rides
    /// along as `context_filter`. A fresh query whose top confidence is
    /// below the low-confidence threshold gets a clarifying question.
    pub fn plan(&self, text: &str, prediction: &Prediction, follow_up: FollowUp<'_>) -> TurnPlan {
        let current_filter = (!prediction.low_confidence).then(|| prediction.top().label);

        if let Some(prior) = follow_up.referenced() {
            let rewritten = Self::rewrite(text, follow_up).unwrap_or_else(|| text.to_string());
            let prior_filter = prior
                .top_intent()
                .filter(|_| !prior.low_confidence)
                .map(|s| s.label);
            let intent_filter = current_filter.or(prior_filter);
            let context_filter = prior_filter.filter(|p| Some(*p) != intent_filter);
            return TurnPlan::Retrieve {
                query: rewritten.clone(),
                rewritten: Some(rewritten),
                intent_filter,
                context_filter,
            };
        }

        if prediction.top().confidence < self.config.low_confidence_threshold {
            return TurnPlan::Clarify {
                question: self.clarifying_question(prediction),
            };
        }

        TurnPlan::Retrieve {
            query: text.to_string(),
            rewritten: None,
            intent_filter: current_filter,
            context_filter: None,
        }
    }

    /// Pick a clarifying question from the score table.
    pub fn clarifying_question(&self, prediction: &Prediction) -> String {
        let Some(top) = prediction.scores.first() else {
            return GENERIC_CLARIFICATION.to_string();
        };
        if top.confidence < self.config.clarify_hint_floor {
            return GENERIC_CLARIFICATION.to_string();
        }

        let close: Vec<&str> = prediction
            .scores
            .iter()
            .filter(|s| top.confidence - s.confidence <= CLOSE_SCORE_MARGIN)
            .map(|s| s.label.as_str())
            .collect();
        if close.len() >= 2 {
            return format!(
                "I see you might be asking about {}. Which one would you like help with?",
                join_alternatives(&close)
            );
        }

        intent_question(top.label).to_string()
    }
}

fn intent_question(label: IntentLabel) -> &'static str {
    match label {
        IntentLabel::Billing => "Are you asking about billing, payments, or subscription?",
        IntentLabel::Technical => "Is this a technical issue with the app or website?",
        IntentLabel::Account => "Do you need help with your account settings or profile?",
        IntentLabel::Complaint => "Would you like to file a complaint or speak with a supervisor?",
    }
}

/// "a", "a or b", "a, b or c".
fn join_alternatives(items: &[&str]) -> String {
    match items {
        [] => String::new(),
        [only] => only.to_string(),
        [init @ .., last] => format!("{} or {}", init.join(", "), last),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use deskmate_core::types::{EntityMap, IntentScore, ReplyKind};
    use uuid::Uuid;

    fn make_turn(raw: &str) -> Turn {
        Turn {
            id: Uuid::new_v4(),
            raw_text: raw.to_string(),
            rewritten_text: None,
            intents: vec![IntentScore {
                label: IntentLabel::Technical,
                confidence: 0.9,
            }],
            low_confidence: false,
            entities: EntityMap::new(),
            retrieved_answer: None,
            matched_faq_id: None,
            similarity: Some(0.9),
            reply_kind: ReplyKind::Answer,
            timestamp: Utc::now(),
        }
    }

    fn prediction(scores: &[(IntentLabel, f32)], threshold: f32) -> Prediction {
        let mut scores: Vec<IntentScore> = scores
            .iter()
            .map(|(label, confidence)| IntentScore {
                label: *label,
                confidence: *confidence,
            })
            .collect();
        scores.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        let mut intents: Vec<IntentScore> = scores
            .iter()
            .filter(|s| s.confidence >= threshold)
            .copied()
            .collect();
        let low_confidence = intents.is_empty();
        if low_confidence {
            intents.push(scores[0]);
        }
        Prediction {
            intents,
            scores,
            low_confidence,
        }
    }

    fn manager() -> ConversationManager {
        ConversationManager::new(ConversationConfig::default())
    }

    fn context_with(raws: &[&str]) -> ConversationContext {
        let mut ctx = ConversationContext::new(5);
        for raw in raws {
            ctx.push(make_turn(raw));
        }
        ctx
    }

    // -------------------------------------------------------------------------
    // ConversationContext
    // -------------------------------------------------------------------------

    #[test]
    fn test_context_evicts_oldest() {
        let mut ctx = ConversationContext::new(3);
        for i in 0..5 {
            let evicted = ctx.push(make_turn(&format!("q{}", i)));
            assert_eq!(evicted.is_some(), i >= 3);
        }
        assert_eq!(ctx.len(), 3);
        let raws: Vec<&str> = ctx.turns().map(|t| t.raw_text.as_str()).collect();
        assert_eq!(raws, vec!["q2", "q3", "q4"]);
        assert_eq!(ctx.latest().unwrap().raw_text, "q4");
    }

    #[test]
    fn test_context_never_exceeds_capacity() {
        let mut ctx = ConversationContext::new(5);
        for i in 0..100 {
            ctx.push(make_turn(&i.to_string()));
            assert!(ctx.len() <= 5);
        }
    }

    #[test]
    fn test_context_zero_capacity_keeps_one() {
        let mut ctx = ConversationContext::new(0);
        ctx.push(make_turn("a"));
        ctx.push(make_turn("b"));
        assert_eq!(ctx.len(), 1);
    }

    #[test]
    fn test_context_get_by_id() {
        let mut ctx = ConversationContext::new(5);
        let turn = make_turn("refund");
        let id = turn.id;
        ctx.push(turn);
        assert_eq!(ctx.get(id).unwrap().raw_text, "refund");
        assert!(ctx.get(Uuid::new_v4()).is_none());
    }

    // -------------------------------------------------------------------------
    // Classification
    // -------------------------------------------------------------------------

    #[test]
    fn test_no_follow_up_without_context() {
        let ctx = ConversationContext::new(5);
        let result = manager().classify("what about that?", &ctx, ConversationState::AwaitingQuery);
        assert!(!result.is_follow_up());
    }

    #[test]
    fn test_strong_cue_in_long_query() {
        let ctx = context_with(&["How do I reset my password?"]);
        let result = manager().classify(
            "And what if I never received the verification email at my work address?",
            &ctx,
            ConversationState::AwaitingQuery,
        );
        assert!(result.is_follow_up());
    }

    #[test]
    fn test_weak_cue_only_counts_when_short() {
        let ctx = context_with(&["How do I reset my password?"]);
        let m = manager();
        assert!(m
            .classify("is it free?", &ctx, ConversationState::AwaitingQuery)
            .is_follow_up());
        assert!(!m
            .classify(
                "my invoice shows a charge and I want it refunded today",
                &ctx,
                ConversationState::AwaitingQuery
            )
            .is_follow_up());
    }

    #[test]
    fn test_cues_match_whole_words() {
        let ctx = context_with(&["How do I reset my password?"]);
        let result = manager().classify("withdraw funds", &ctx, ConversationState::AwaitingQuery);
        assert!(!result.is_follow_up());
    }

    #[test]
    fn test_short_reply_while_clarifying_is_follow_up() {
        let ctx = context_with(&["I have a problem"]);
        let m = manager();
        assert!(m
            .classify("billing", &ctx, ConversationState::Clarifying)
            .is_follow_up());
        assert!(!m
            .classify("billing", &ctx, ConversationState::AwaitingQuery)
            .is_follow_up());
    }

    #[test]
    fn test_follow_up_refers_to_latest_turn() {
        let ctx = context_with(&["first question", "second question", "third question"]);
        let result = manager().classify("what about that", &ctx, ConversationState::AwaitingQuery);
        assert_eq!(result.referenced().unwrap().raw_text, "third question");
    }

    #[test]
    fn test_empty_text_is_not_follow_up() {
        let ctx = context_with(&["refund"]);
        assert!(!manager()
            .classify("   ", &ctx, ConversationState::Clarifying)
            .is_follow_up());
    }

    // -------------------------------------------------------------------------
    // Rewrite and planning
    // -------------------------------------------------------------------------

    #[test]
    fn test_rewrite_prepends_prior_query() {
        let ctx = context_with(&["How do I reset my password?"]);
        let fu = manager().classify(
            "What if I don't get an email?",
            &ctx,
            ConversationState::AwaitingQuery,
        );
        assert_eq!(
            ConversationManager::rewrite("What if I don't get an email?", fu).unwrap(),
            "How do I reset my password? What if I don't get an email?"
        );
    }

    #[test]
    fn test_rewrite_identity_without_follow_up() {
        assert!(ConversationManager::rewrite("refund", FollowUp::NotFollowUp).is_none());
    }

    #[test]
    fn test_plan_retrieves_confident_query() {
        let p = prediction(&[(IntentLabel::Billing, 0.9), (IntentLabel::Technical, 0.1)], 0.5);
        let plan = manager().plan("refund please", &p, FollowUp::NotFollowUp);
        assert_eq!(
            plan,
            TurnPlan::Retrieve {
                query: "refund please".to_string(),
                rewritten: None,
                intent_filter: Some(IntentLabel::Billing),
                context_filter: None,
            }
        );
        assert_eq!(plan.next_state(), ConversationState::AwaitingQuery);
    }

    #[test]
    fn test_plan_clarifies_low_confidence() {
        let p = prediction(&[(IntentLabel::Billing, 0.18), (IntentLabel::Technical, 0.18)], 0.5);
        let plan = manager().plan("asdkjaslkd", &p, FollowUp::NotFollowUp);
        assert!(matches!(plan, TurnPlan::Clarify { .. }));
        assert_eq!(plan.next_state(), ConversationState::Clarifying);
    }

    #[test]
    fn test_plan_moderate_confidence_retrieves_unfiltered() {
        // Below the reporting threshold but above the clarify threshold.
        let p = prediction(&[(IntentLabel::Account, 0.4), (IntentLabel::Billing, 0.2)], 0.5);
        let plan = manager().plan("change name", &p, FollowUp::NotFollowUp);
        assert!(matches!(
            plan,
            TurnPlan::Retrieve {
                intent_filter: None,
                ..
            }
        ));
    }

    #[test]
    fn test_plan_follow_up_searches_current_and_prior_intent() {
        let ctx = context_with(&["How do I reset my password?"]);
        let p = prediction(&[(IntentLabel::Account, 0.8), (IntentLabel::Technical, 0.3)], 0.5);
        let fu = manager().classify("what if I don't get an email?", &ctx, ConversationState::AwaitingQuery);
        let plan = manager().plan("what if I don't get an email?", &p, fu);
        match plan {
            TurnPlan::Retrieve {
                query,
                rewritten,
                intent_filter,
                context_filter,
            } => {
                assert!(query.starts_with("How do I reset my password?"));
                assert_eq!(rewritten.as_deref(), Some(query.as_str()));
                assert_eq!(intent_filter, Some(IntentLabel::Account));
                assert_eq!(context_filter, Some(IntentLabel::Technical));
            }
            other => panic!("expected retrieval, got {:?}", other),
        }
    }

    #[test]
    fn test_plan_follow_up_low_confidence_uses_prior_intent() {
        let ctx = context_with(&["How do I reset my password?"]);
        let p = prediction(&[(IntentLabel::Billing, 0.1)], 0.5);
        let fu = manager().classify("and this?", &ctx, ConversationState::AwaitingQuery);
        assert!(matches!(
            manager().plan("and this?", &p, fu),
            TurnPlan::Retrieve {
                intent_filter: Some(IntentLabel::Technical),
                context_filter: None,
                ..
            }
        ));
    }

    #[test]
    fn test_plan_follow_up_same_intent_has_no_context_filter() {
        let ctx = context_with(&["How do I reset my password?"]);
        let p = prediction(&[(IntentLabel::Technical, 0.9)], 0.5);
        let fu = manager().classify("what about that?", &ctx, ConversationState::AwaitingQuery);
        assert!(matches!(
            manager().plan("what about that?", &p, fu),
            TurnPlan::Retrieve {
                intent_filter: Some(IntentLabel::Technical),
                context_filter: None,
                ..
            }
        ));
    }

    #[test]
    fn test_plan_follow_up_never_clarifies() {
        let ctx = context_with(&["How do I reset my password?"]);
        let p = prediction(&[(IntentLabel::Billing, 0.1)], 0.5);
        let fu = manager().classify("and this?", &ctx, ConversationState::AwaitingQuery);
        assert!(matches!(
            manager().plan("and this?", &p, fu),
            TurnPlan::Retrieve { .. }
        ));
    }

    // -------------------------------------------------------------------------
    // Clarifying questions
    // -------------------------------------------------------------------------

    #[test]
    fn test_clarifying_generic_for_very_low_scores() {
        let p = prediction(
            &[
                (IntentLabel::Billing, 0.18),
                (IntentLabel::Technical, 0.18),
                (IntentLabel::Account, 0.18),
                (IntentLabel::Complaint, 0.18),
            ],
            0.5,
        );
        assert_eq!(manager().clarifying_question(&p), GENERIC_CLARIFICATION);
    }

    #[test]
    fn test_clarifying_lists_close_labels() {
        let p = prediction(
            &[
                (IntentLabel::Billing, 0.32),
                (IntentLabel::Complaint, 0.27),
                (IntentLabel::Account, 0.1),
            ],
            0.5,
        );
        assert_eq!(
            manager().clarifying_question(&p),
            "I see you might be asking about billing or complaint. Which one would you like help with?"
        );
    }

    #[test]
    fn test_clarifying_intent_specific() {
        let p = prediction(&[(IntentLabel::Technical, 0.3), (IntentLabel::Billing, 0.1)], 0.5);
        assert_eq!(
            manager().clarifying_question(&p),
            "Is this a technical issue with the app or website?"
        );
    }

    #[test]
    fn test_join_alternatives() {
        assert_eq!(join_alternatives(&["a"]), "a");
        assert_eq!(join_alternatives(&["a", "b"]), "a or b");
        assert_eq!(join_alternatives(&["a", "b", "c"]), "a, b or c");
    }
}
