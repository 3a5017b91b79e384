use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Enums
// =============================================================================

/// A discrete category of user need. The set is closed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentLabel {
    /// Invoices, payments, refunds, subscriptions.
    Billing,
    /// App or website problems, passwords, login.
    Technical,
    /// Profile, email, username, account lifecycle.
    Account,
    /// Dissatisfaction with a product or service.
    #[serde(alias = "complaints")]
    Complaint,
}

impl IntentLabel {
    /// Every label, in canonical order.
    pub const ALL: [IntentLabel; 4] = [
        IntentLabel::Billing,
        IntentLabel::Technical,
        IntentLabel::Account,
        IntentLabel::Complaint,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IntentLabel::Billing => "billing",
            IntentLabel::Technical => "technical",
            IntentLabel::Account => "account",
            IntentLabel::Complaint => "complaint",
        }
    }
}

impl fmt::Display for IntentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IntentLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "billing" => Ok(IntentLabel::Billing),
            "technical" => Ok(IntentLabel::Technical),
            "account" => Ok(IntentLabel::Account),
            "complaint" | "complaints" => Ok(IntentLabel::Complaint),
            other => Err(format!("unknown intent label: {}", other)),
        }
    }
}

/// The kind of structured fact pulled out of free text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    AccountNumber,
    OrderNumber,
    Date,
    Amount,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::AccountNumber => "account_number",
            EntityKind::OrderNumber => "order_number",
            EntityKind::Date => "date",
            EntityKind::Amount => "amount",
        }
    }
}

/// How a reply was produced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyKind {
    /// An FAQ answer above the similarity floor.
    Answer,
    /// A generic or intent-specific fallback in place of a weak match.
    #[default]
    Fallback,
    /// A clarifying question; no retrieval was performed.
    Clarification,
}

/// Thumbs up / thumbs down on a reply.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Satisfaction {
    Positive,
    Negative,
}

// =============================================================================
// Structs
// =============================================================================

/// A structured fact extracted from free text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub kind: EntityKind,
    /// The substring that matched.
    pub text: String,
    /// Normalized value (digits, ISO date, decimal amount).
    pub value: String,
}

/// Extracted entities keyed by kind. At most one entity per kind.
pub type EntityMap = BTreeMap<EntityKind, Entity>;

/// An intent label paired with its predicted probability.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntentScore {
    pub label: IntentLabel,
    pub confidence: f32,
}

/// A single FAQ entry. Static once loaded.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FaqEntry {
    pub id: String,
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub intent: Option<IntentLabel>,
}

/// One user message and everything the pipeline derived from it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Turn {
    pub id: Uuid,
    pub raw_text: String,
    /// Set when the query was rewritten as a follow-up.
    pub rewritten_text: Option<String>,
    /// Detected intents, highest confidence first.
    pub intents: Vec<IntentScore>,
    /// True when no intent cleared the threshold and `intents` holds a guess.
    pub low_confidence: bool,
    pub entities: EntityMap,
    pub retrieved_answer: Option<String>,
    pub matched_faq_id: Option<String>,
    /// Best retrieval similarity in [0, 1]; `None` when no retrieval ran.
    pub similarity: Option<f32>,
    pub reply_kind: ReplyKind,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    /// The text that was sent to retrieval: the rewrite if any, else the raw text.
    pub fn effective_text(&self) -> &str {
        self.rewritten_text.as_deref().unwrap_or(&self.raw_text)
    }

    /// The dominant intent of this turn.
    pub fn top_intent(&self) -> Option<&IntentScore> {
        self.intents.first()
    }

    /// Top intent confidence, or 0.0 for a turn without intents.
    pub fn top_confidence(&self) -> f32 {
        self.top_intent().map(|s| s.confidence).unwrap_or(0.0)
    }
}
