//! Turn orchestration: entity extraction, intent prediction, follow-up
//! handling, retrieval, reply composition and analytics for one session.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use deskmate_analytics::{AnalyticsLog, FailurePolicy, TurnRecord};
use deskmate_core::config::DeskmateConfig;
use deskmate_core::types::{EntityMap, IntentLabel, IntentScore, ReplyKind, Satisfaction, Turn};
use deskmate_knowledge::{ConfidenceBand, Embedder, FaqMatch, KnowledgeBase, KnowledgeError};
use deskmate_nlu::{EntityExtractor, IntentPredictor, Prediction};

use crate::context::{ConversationContext, ConversationManager, ConversationState, TurnPlan};
use crate::error::ChatError;
use crate::response::ResponseComposer;

// =============================================================================
// Reply
// =============================================================================

/// What the bot says back, plus everything it decided along the way.
#[derive(Debug, Clone, Serialize)]
pub struct Reply {
    pub turn_id: Uuid,
    pub text: String,
    pub kind: ReplyKind,
    /// Intents reported for the turn (above threshold, or the top-1 guess).
    pub intents: Vec<IntentScore>,
    pub low_confidence: bool,
    pub entities: EntityMap,
    /// Best similarity, `None` when retrieval did not run or failed.
    pub similarity: Option<f32>,
    pub band: Option<ConfidenceBand>,
    pub matched_faq_id: Option<String>,
    /// The follow-up rewrite used for retrieval.
    pub rewritten_query: Option<String>,
    /// Other FAQ questions that also matched well.
    pub related: Vec<String>,
    /// Why the turn landed in the failed-query log.
    pub failure_reason: Option<String>,
}

impl Reply {
    pub fn is_fallback(&self) -> bool {
        self.kind == ReplyKind::Fallback
    }
}

// =============================================================================
// Session
// =============================================================================

/// Per-user conversation state, passed `&mut` into every turn.
pub struct Session {
    id: Uuid,
    context: ConversationContext,
    state: ConversationState,
    analytics: Option<AnalyticsLog>,
    started_at: DateTime<Utc>,
}

impl Session {
    pub fn new(context_turns: usize, analytics: Option<AnalyticsLog>) -> Self {
        Self {
            id: Uuid::new_v4(),
            context: ConversationContext::new(context_turns),
            state: ConversationState::AwaitingQuery,
            analytics,
            started_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn context(&self) -> &ConversationContext {
        &self.context
    }

    pub fn state(&self) -> ConversationState {
        self.state
    }

    pub fn analytics(&self) -> Option<&AnalyticsLog> {
        self.analytics.as_ref()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn last_turn(&self) -> Option<&Turn> {
        self.context.latest()
    }

    /// Forget the conversation. The analytics log stays attached.
    pub fn reset(&mut self) {
        self.context.clear();
        self.state = ConversationState::AwaitingQuery;
    }

    /// Append a feedback event for a turn still in the context window.
    pub fn record_feedback(&mut self, turn_id: Uuid, satisfaction: Satisfaction) -> Result<(), ChatError> {
        let turn = self
            .context
            .get(turn_id)
            .ok_or(ChatError::TurnNotFound(turn_id))?;
        match self.analytics.as_mut() {
            Some(log) => log.record_feedback(self.id, turn, satisfaction)?,
            None => debug!(turn_id = %turn_id, ?satisfaction, "Feedback ignored, no analytics log"),
        }
        Ok(())
    }

    /// Rate the latest reply.
    pub fn rate_last(&mut self, satisfaction: Satisfaction) -> Result<(), ChatError> {
        let turn_id = self.last_turn().map(|t| t.id).ok_or(ChatError::NoTurnYet)?;
        self.record_feedback(turn_id, satisfaction)
    }
}

// =============================================================================
// SupportBot
// =============================================================================

/// Outcome of the retrieval or clarification step.
struct Outcome {
    text: String,
    kind: ReplyKind,
    similarity: Option<f32>,
    band: Option<ConfidenceBand>,
    matched_faq_id: Option<String>,
    retrieved_answer: Option<String>,
    related: Vec<String>,
}

/// Read-only pipeline shared by every session.
pub struct SupportBot {
    extractor: EntityExtractor,
    predictor: IntentPredictor,
    knowledge: KnowledgeBase,
    embedder: Box<dyn Embedder>,
    manager: ConversationManager,
    composer: ResponseComposer,
    failure_policy: FailurePolicy,
    top_k: usize,
    similarity_floor: f32,
    ambiguity_margin: f32,
    context_turns: usize,
}

impl SupportBot {
    pub fn new(
        predictor: IntentPredictor,
        knowledge: KnowledgeBase,
        embedder: Box<dyn Embedder>,
        config: &DeskmateConfig,
    ) -> Self {
        if embedder.dimensions() != knowledge.dimension() {
            warn!(
                embedder = embedder.dimensions(),
                index = knowledge.dimension(),
                "Embedder and FAQ index dimensions differ, retrieval will fail"
            );
        }
        info!(
            labels = predictor.model().labels().len(),
            faqs = knowledge.index().len(),
            embedder = %embedder.name(),
            "Support bot ready"
        );
        Self {
            extractor: EntityExtractor::new(),
            predictor,
            knowledge,
            embedder,
            manager: ConversationManager::new(config.conversation.clone()),
            composer: ResponseComposer::default(),
            failure_policy: FailurePolicy {
                confidence_threshold: config.analytics.failed_confidence_threshold,
                similarity_floor: config.knowledge.similarity_floor,
            },
            top_k: config.knowledge.top_k.max(1),
            similarity_floor: config.knowledge.similarity_floor,
            ambiguity_margin: config.intent.ambiguity_margin,
            context_turns: config.conversation.context_turns,
        }
    }

    /// A fresh session, optionally writing to `analytics`.
    pub fn start_session(&self, analytics: Option<AnalyticsLog>) -> Session {
        Session::new(self.context_turns, analytics)
    }

    pub fn predictor(&self) -> &IntentPredictor {
        &self.predictor
    }

    pub fn knowledge(&self) -> &KnowledgeBase {
        &self.knowledge
    }

    pub fn extractor(&self) -> &EntityExtractor {
        &self.extractor
    }

    /// Process one user message. Never fails: retrieval and analytics
    /// errors degrade into a fallback reply and a warning.
    pub fn handle_turn(&self, session: &mut Session, text: &str) -> Reply {
        let started = Instant::now();

        let entities = self.extractor.extract(text);
        let prediction = self.predictor.predict(text);

        let follow_up = self.manager.classify(text, &session.context, session.state);
        let plan = self.manager.plan(text, &prediction, follow_up);
        // Account or order numbers from the referenced turn still apply.
        let mut known_entities = follow_up
            .referenced()
            .map(|t| t.entities.clone())
            .unwrap_or_default();
        known_entities.extend(entities.clone());
        if follow_up.is_follow_up() {
            session.state = ConversationState::FollowUpDetected;
        }

        debug!(
            session_id = %session.id,
            top = %prediction.top().label,
            confidence = prediction.top().confidence,
            ambiguous = IntentPredictor::is_ambiguous(&prediction, self.ambiguity_margin),
            follow_up = session.state == ConversationState::FollowUpDetected,
            "Turn planned"
        );

        let next_state = plan.next_state();
        let (outcome, rewritten) = match plan {
            TurnPlan::Clarify { question } => (
                Outcome {
                    text: self.composer.clarification(text, &question),
                    kind: ReplyKind::Clarification,
                    similarity: None,
                    band: None,
                    matched_faq_id: None,
                    retrieved_answer: None,
                    related: Vec::new(),
                },
                None,
            ),
            TurnPlan::Retrieve {
                query,
                rewritten,
                intent_filter,
                context_filter,
            } => (
                self.retrieve(
                    text,
                    &query,
                    (intent_filter, context_filter),
                    &prediction,
                    &known_entities,
                ),
                rewritten,
            ),
        };

        let turn = Turn {
            id: Uuid::new_v4(),
            raw_text: text.to_string(),
            rewritten_text: rewritten.clone(),
            intents: prediction.intents.clone(),
            low_confidence: prediction.low_confidence,
            entities: entities.clone(),
            retrieved_answer: outcome.retrieved_answer,
            matched_faq_id: outcome.matched_faq_id.clone(),
            similarity: outcome.similarity,
            reply_kind: outcome.kind,
            timestamp: Utc::now(),
        };

        let elapsed = started.elapsed();
        let failure_reason = match session.analytics.as_mut() {
            Some(log) => match log.record_turn(session.id, &turn, elapsed) {
                Ok(reason) => reason,
                Err(e) => {
                    warn!(error = %e, turn_id = %turn.id, "Failed to write analytics");
                    self.failure_policy
                        .evaluate(&TurnRecord::from_turn(session.id, &turn, elapsed))
                }
            },
            None => self
                .failure_policy
                .evaluate(&TurnRecord::from_turn(session.id, &turn, elapsed)),
        };

        let reply = Reply {
            turn_id: turn.id,
            text: outcome.text,
            kind: outcome.kind,
            intents: turn.intents.clone(),
            low_confidence: turn.low_confidence,
            entities,
            similarity: outcome.similarity,
            band: outcome.band,
            matched_faq_id: outcome.matched_faq_id,
            rewritten_query: rewritten,
            related: outcome.related,
            failure_reason,
        };

        session.context.push(turn);
        session.state = next_state;

        debug!(
            turn_id = %reply.turn_id,
            kind = ?reply.kind,
            similarity = ?reply.similarity,
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            "Turn handled"
        );
        reply
    }

    /// Search under the primary intent filter, and under the context
    /// filter when there is one. The context result wins only with a
    /// strictly higher best similarity.
    fn lookup(
        &self,
        embedding: &[f32],
        (primary, context): (Option<IntentLabel>, Option<IntentLabel>),
    ) -> Result<Vec<FaqMatch>, KnowledgeError> {
        let matches = self.knowledge.lookup(embedding, self.top_k, primary)?;
        let Some(context) = context else {
            return Ok(matches);
        };
        let alternative = self.knowledge.lookup(embedding, self.top_k, Some(context))?;
        if best_similarity(&alternative) > best_similarity(&matches) {
            debug!(intent = %context, "Referenced turn's intent gave the better match");
            Ok(alternative)
        } else {
            Ok(matches)
        }
    }

    fn retrieve(
        &self,
        text: &str,
        query: &str,
        filters: (Option<IntentLabel>, Option<IntentLabel>),
        prediction: &Prediction,
        entities: &EntityMap,
    ) -> Outcome {
        let embedding = self.embedder.embed(query);
        let matches = match self.lookup(&embedding, filters) {
            Ok(matches) => matches,
            Err(e) => {
                warn!(error = %e, "FAQ retrieval failed, replying with fallback");
                return Outcome {
                    text: self.composer.fallback(text, prediction),
                    kind: ReplyKind::Fallback,
                    similarity: None,
                    band: None,
                    matched_faq_id: None,
                    retrieved_answer: None,
                    related: Vec::new(),
                };
            }
        };

        match matches.first() {
            Some(best) if best.similarity >= self.similarity_floor => {
                Outcome {
                    text: self.composer.answer(best, entities),
                    kind: ReplyKind::Answer,
                    similarity: Some(best.similarity),
                    band: Some(best.band),
                    matched_faq_id: Some(best.entry.id.clone()),
                    retrieved_answer: Some(best.entry.answer.clone()),
                    related: self
                        .composer
                        .related_questions(&matches, self.similarity_floor),
                }
            }
            best => {
                debug!(
                    best = ?best.map(|m| m.similarity),
                    floor = self.similarity_floor,
                    "No FAQ above the similarity floor"
                );
                Outcome {
                    text: self.composer.fallback(text, prediction),
                    kind: ReplyKind::Fallback,
                    similarity: best.map(|m| m.similarity),
                    band: best.map(|m| m.band),
                    matched_faq_id: None,
                    retrieved_answer: None,
                    related: Vec::new(),
                }
            }
        }
    }
}

fn best_similarity(matches: &[FaqMatch]) -> f32 {
    matches.first().map(|m| m.similarity).unwrap_or(0.0)
}

// =============================================================================
// Tests
// =============================================================================
