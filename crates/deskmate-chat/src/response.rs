//! Reply text composition.
//!
//! Turns a retrieval result, a clarifying question, or the lack of a match
//! into the text shown to the user. Templates only, no generation.

use std::sync::LazyLock;

use regex::Regex;

use deskmate_core::types::{EntityKind, EntityMap, IntentLabel};
use deskmate_knowledge::FaqMatch;
use deskmate_nlu::Prediction;

/// Greetings and small talk, only checked on short inputs without a question mark.
static SMALL_TALK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(?:hi|hello|hey|good\s+(?:morning|evening|night)|thanks|thank\s+you|ok|okay|bye|goodbye|happy|sad|wow|nice)\b",
    )
    .unwrap()
});

static OFF_TOPIC_KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:birthday|weather|joke|game|recipe|news|sports?|movie|music|song|poem|story)s?\b")
        .unwrap()
});

/// Inputs shorter than this many characters may be small talk.
const SMALL_TALK_MAX_CHARS: usize = 15;

pub const OFF_TOPIC_REPLY: &str = "I don't understand that question. I'm a customer support \
chatbot that can help with:\n\n\
• Billing and payment questions\n\
• Technical issues and troubleshooting\n\
• Account management\n\
• Complaints and feedback\n\n\
Please ask a question related to customer support.";

pub const REPHRASE_REPLY: &str = "I couldn't understand your question. Could you please rephrase it?\n\n\
I can help with:\n\
• Billing questions\n\
• Technical support\n\
• Account management\n\
• Filing complaints";

// =============================================================================
// ResponseComposer
// =============================================================================

/// Builds reply text from turn results.
pub struct ResponseComposer {
    /// Maximum number of alternative questions offered with an answer.
    pub max_related: usize,
}

impl Default for ResponseComposer {
    fn default() -> Self {
        Self::new(2)
    }
}

impl ResponseComposer {
    pub fn new(max_related: usize) -> Self {
        Self { max_related }
    }

    /// The matched FAQ answer, personalized with any account or order
    /// number the user mentioned.
    pub fn answer(&self, best: &FaqMatch, entities: &EntityMap) -> String {
        let mut text = best.entry.answer.trim().to_string();
        if let Some(account) = entities.get(&EntityKind::AccountNumber) {
            text.push_str(&format!(
                "\n\nFor account {}, you can access this in your account dashboard.",
                account.value
            ));
        }
        if let Some(order) = entities.get(&EntityKind::OrderNumber) {
            text.push_str(&format!(
                "\n\nFor order {}, you can follow its status under Orders in your account.",
                order.value
            ));
        }
        text
    }

    /// Reply used when retrieval found nothing above the similarity floor.
    pub fn fallback(&self, text: &str, prediction: &Prediction) -> String {
        if Self::is_off_topic(text) {
            return OFF_TOPIC_REPLY.to_string();
        }
        if prediction.low_confidence {
            return REPHRASE_REPLY.to_string();
        }
        intent_fallback(prediction.top().label).to_string()
    }

    /// The clarifying question, unless the input is plainly off-topic.
    pub fn clarification(&self, text: &str, question: &str) -> String {
        if Self::is_off_topic(text) {
            OFF_TOPIC_REPLY.to_string()
        } else {
            question.to_string()
        }
    }

    /// Questions of the runner-up matches that also cleared `floor`.
    pub fn related_questions(&self, matches: &[FaqMatch], floor: f32) -> Vec<String> {
        matches
            .iter()
            .skip(1)
            .filter(|m| m.similarity >= floor)
            .take(self.max_related)
            .map(|m| m.entry.question.clone())
            .collect()
    }

    /// Greetings, small talk and topics a support desk does not cover.
    pub fn is_off_topic(text: &str) -> bool {
        let trimmed = text.trim();
        if trimmed.chars().count() < SMALL_TALK_MAX_CHARS
            && !trimmed.contains('?')
            && SMALL_TALK.is_match(trimmed)
        {
            return true;
        }
        OFF_TOPIC_KEYWORD.is_match(trimmed)
    }
}

fn intent_fallback(label: IntentLabel) -> &'static str {
    match label {
        IntentLabel::Billing => {
            "I understand you're asking about billing, but I need more details. Try asking:\n\
             • How do I check my bill?\n\
             • What payment methods do you accept?\n\
             • Can I get a refund?\n\
             • How do I cancel my subscription?"
        }
        IntentLabel::Technical => {
            "I understand you need technical help, but could you be more specific? Try:\n\
             • My app is crashing\n\
             • How do I reset my password?\n\
             • I can't log in\n\
             • How do I update the software?"
        }
        IntentLabel::Account => {
            "I understand you're asking about your account, but I need more information. Try:\n\
             • How do I update my email?\n\
             • Can I change my username?\n\
             • How do I delete my account?\n\
             • How do I update my profile?"
        }
        IntentLabel::Complaint => {
            "I understand you have a concern. To help you better, please be more specific:\n\
             • I received a damaged product\n\
             • The service quality is poor\n\
             • I want to speak to a manager\n\
             • My order hasn't arrived"
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
