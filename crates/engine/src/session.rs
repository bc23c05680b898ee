use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use nutricoach_core::{
    config::AppConfig, ActionRisk, ActionType, AuditCategory, AuditContext, AuditEvent,
    AuditOutcome, AuditSink, ConversationContextFull, ConversationLog, ConversationMetrics,
    ConversationResponse, ConversationTurn, GenerationPath, IntentDetectionResult, QuotaKind,
    Role, SafetyAction, SafetyCheckResult, SessionId, TurnError, TurnId, UserInfo,
    config::GenerationMode,
};
use nutricoach_core::flows::{
    StandardTurnFlow, TurnEvent, TurnFlowContext, TurnFlowEngine, TurnState,
};
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};
use uuid::Uuid;

use crate::assembler::ResponseAssembler;
use crate::compactor::ContextCompactor;
use crate::extractor::IntentExtractor;
use crate::gate::ActionGate;
use crate::generation::{DeadlineGenerator, ResponseGenerator, RulesGenerator};
use crate::memory::{
    read_memory, shared_memory, spawn_summarizer, MemorySummarizer, SharedMemory,
};
use crate::quota::QuotaLedger;
use crate::safety::SafetyGuard;

/// Shared, session-independent machinery: configuration, the pipeline
/// components, the quota ledger, and the observability sinks. One engine
/// serves many concurrent sessions.
pub struct CoachEngine {
    config: AppConfig,
    extractor: IntentExtractor,
    guard: SafetyGuard,
    compactor: ContextCompactor,
    gate: ActionGate,
    assembler: ResponseAssembler,
    rules: RulesGenerator,
    generator: DeadlineGenerator<Arc<dyn ResponseGenerator>>,
    ledger: Arc<QuotaLedger>,
    audit: Arc<dyn AuditSink>,
    metrics: Arc<ConversationMetrics>,
    flow: TurnFlowEngine<StandardTurnFlow>,
}

impl CoachEngine {
    pub fn new(
        config: AppConfig,
        generator: Arc<dyn ResponseGenerator>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        let compactor = ContextCompactor::new(
            config.engine.compact_budget_chars,
            config.engine.history_window,
            config.engine.memory_summary_max_chars,
        );
        let ledger = Arc::new(QuotaLedger::new(config.tiers.clone()));
        let generator =
            DeadlineGenerator::new(generator, Duration::from_millis(config.generator.timeout_ms));

        Self {
            config,
            extractor: IntentExtractor::new(),
            guard: SafetyGuard::new(),
            compactor,
            gate: ActionGate::default(),
            assembler: ResponseAssembler::new(),
            rules: RulesGenerator::new(),
            generator,
            ledger,
            audit,
            metrics: Arc::new(ConversationMetrics::default()),
            flow: TurnFlowEngine::default(),
        }
    }

    /// Engine without an external orchestrator: every turn takes the
    /// deterministic rules path.
    pub fn rules_only(config: AppConfig, audit: Arc<dyn AuditSink>) -> Self {
        let mut config = config;
        config.generator.mode = GenerationMode::Rules;
        Self::new(config, Arc::new(RulesGenerator::new()), audit)
    }

    pub fn metrics(&self) -> &ConversationMetrics {
        &self.metrics
    }

    pub fn ledger(&self) -> &QuotaLedger {
        &self.ledger
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Action vocabulary handed to the generator: whitelist entries the
    /// current tier may use, minus high-risk entries when the safety
    /// decision blocks them. The gate re-validates everything afterwards.
    fn allowed_action_types(
        &self,
        user: &UserInfo,
        safety: &SafetyCheckResult,
    ) -> Vec<ActionType> {
        self.gate
            .whitelist()
            .entries
            .iter()
            .filter(|entry| entry.allows_tier(user.tier))
            .filter(|entry| !(safety.block_high_risk_actions && entry.risk == ActionRisk::High))
            .map(|entry| entry.action_type)
            .collect()
    }
}

/// One user's conversation: owns the append-only turn log and the memory
/// cell, and processes turns strictly one at a time.
pub struct CoachSession {
    engine: Arc<CoachEngine>,
    session_id: SessionId,
    log: ConversationLog,
    memory: SharedMemory,
    memory_queue: mpsc::Sender<ConversationTurn>,
}

const MEMORY_QUEUE_CAP: usize = 64;

impl CoachSession {
    /// Spawns the background summarizer, so this must be called from within
    /// a tokio runtime.
    pub fn new(engine: Arc<CoachEngine>, session_id: SessionId) -> Self {
        let memory = shared_memory();
        let (sender, receiver) = mpsc::channel(MEMORY_QUEUE_CAP);
        let summarizer =
            MemorySummarizer::new(engine.config.engine.memory_summary_every_turns);
        spawn_summarizer(receiver, memory.clone(), summarizer);

        Self { engine, session_id, log: ConversationLog::default(), memory, memory_queue: sender }
    }

    pub fn log(&self) -> &ConversationLog {
        &self.log
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Processes one message to completion. Never fails for policy or
    /// upstream reasons: refusals, quota blocks, and generation failures
    /// all come back as regular responses.
    pub async fn process_message(
        &mut self,
        text: &str,
        context: ConversationContextFull,
    ) -> Result<ConversationResponse, TurnError> {
        self.process(text, context, None).await
    }

    /// Like [`Self::process_message`], but the turn can be abandoned
    /// through `cancel`. A cancelled turn persists nothing and refunds
    /// nothing.
    pub async fn process_message_with_cancel(
        &mut self,
        text: &str,
        context: ConversationContextFull,
        cancel: oneshot::Receiver<()>,
    ) -> Result<ConversationResponse, TurnError> {
        self.process(text, context, Some(cancel)).await
    }

    async fn process(
        &mut self,
        text: &str,
        mut context: ConversationContextFull,
        cancel: Option<oneshot::Receiver<()>>,
    ) -> Result<ConversationResponse, TurnError> {
        let engine = Arc::clone(&self.engine);
        let started = Instant::now();
        let now = Utc::now();
        let turn_id = TurnId::generate();
        let correlation_id = Uuid::new_v4().to_string();
        let audit_ctx = AuditContext::new(
            self.session_id.clone(),
            Some(turn_id),
            correlation_id.clone(),
            "coach-session",
        );
        let user = context.user.clone();

        let mut state = engine.flow.initial_state();
        let mut flow_ctx = TurnFlowContext::default();

        // Extraction. Co-reference looks at the previous user turn.
        let prior_turn = self.log.turns().iter().rev().find(|turn| turn.role == Role::User);
        let detected = engine.extractor.extract(text, prior_turn);
        state = self.apply(&flow_ctx, &state, TurnEvent::IntentExtracted, &audit_ctx)?;
        info!(
            event_name = "turn.extracted",
            session_id = %self.session_id.0,
            correlation_id = %correlation_id,
            primary_intent = detected.primary().intent.label(),
            "intent extracted"
        );

        // Safety decision before anything else may happen.
        let safety = engine.guard.evaluate(&detected, text, &user);
        flow_ctx.safety_action = Some(safety.action);
        state = self.apply(&flow_ctx, &state, TurnEvent::SafetyEvaluated, &audit_ctx)?;

        if safety.action == SafetyAction::RefuseRedirect {
            self.apply(&flow_ctx, &state, TurnEvent::RefusalIssued, &audit_ctx)?;
            engine.metrics.record_refusal();
            engine.metrics.record_turn(GenerationPath::Rules);
            engine.audit.emit(
                AuditEvent::new(
                    audit_ctx.session_id.clone(),
                    audit_ctx.turn_id.clone(),
                    correlation_id.clone(),
                    "safety.turn_refused",
                    AuditCategory::Safety,
                    "safety-guard",
                    AuditOutcome::Rejected,
                )
                .with_metadata("flag_count", safety.flags.len().to_string()),
            );
            let response = engine.assembler.assemble_refusal(&safety, started);
            self.persist_turn(text, detected, response.clone());
            return Ok(response);
        }

        // Message quota. Charged to the day the turn was initiated.
        let message_budget = engine.ledger.try_consume(
            &user.user_id,
            user.tier,
            QuotaKind::Message,
            now,
            user.utc_offset_minutes,
        );
        if let Err(TurnError::QuotaExceeded { tier, kind }) = message_budget {
            self.apply(&flow_ctx, &state, TurnEvent::QuotaExhausted, &audit_ctx)?;
            engine.metrics.record_quota_block();
            engine.metrics.record_turn(GenerationPath::Rules);
            engine.audit.emit(
                AuditEvent::new(
                    audit_ctx.session_id.clone(),
                    audit_ctx.turn_id.clone(),
                    correlation_id.clone(),
                    "quota.message_blocked",
                    AuditCategory::Quota,
                    "quota-ledger",
                    AuditOutcome::Rejected,
                )
                .with_metadata("tier", format!("{tier:?}"))
                .with_metadata("kind", format!("{kind:?}")),
            );
            let response = engine.assembler.assemble_quota_notice(user.tier, started);
            self.persist_turn(text, detected, response.clone());
            return Ok(response);
        }

        // The session owns the history and the memory; the caller's other
        // snapshots pass through untouched.
        context.history = self.log.turns().to_vec();
        if context.memory.is_none() {
            context.memory = read_memory(&self.memory);
        }

        // One generator call per turn, budgeted separately from messages.
        let configured_path = match engine.config.generator.mode {
            GenerationMode::Rules => GenerationPath::Rules,
            GenerationMode::Hybrid => GenerationPath::Hybrid,
            GenerationMode::Llm => GenerationPath::Llm,
        };
        let mut path = configured_path;
        if path != GenerationPath::Rules {
            let generator_budget = engine.ledger.try_consume(
                &user.user_id,
                user.tier,
                QuotaKind::GeneratorCall,
                now,
                user.utc_offset_minutes,
            );
            if generator_budget.is_err() {
                engine.audit.emit(
                    AuditEvent::new(
                        audit_ctx.session_id.clone(),
                        audit_ctx.turn_id.clone(),
                        correlation_id.clone(),
                        "quota.generator_exhausted",
                        AuditCategory::Quota,
                        "quota-ledger",
                        AuditOutcome::Rejected,
                    )
                    .with_metadata("tier", format!("{:?}", user.tier)),
                );
                path = GenerationPath::Rules;
            }
        }

        state = self.apply(&flow_ctx, &state, TurnEvent::GenerationStarted, &audit_ctx)?;

        let allowed_actions = engine.allowed_action_types(&user, &safety);
        let compaction = engine.compactor.compact(&context, text, &detected, &safety);
        if compaction.overflow {
            warn!(
                event_name = "compactor.budget_overflow",
                session_id = %self.session_id.0,
                correlation_id = %correlation_id,
                chars = compaction.context.char_len(),
                "compact context exceeds budget after maximal truncation"
            );
            engine.audit.emit(AuditEvent::new(
                audit_ctx.session_id.clone(),
                audit_ctx.turn_id.clone(),
                correlation_id.clone(),
                "compactor.budget_overflow",
                AuditCategory::System,
                "context-compactor",
                AuditOutcome::Failed,
            ));
        }
        let compact = compaction.context;

        let (mut draft, path, degraded) = if path == GenerationPath::Rules {
            (engine.rules.draft(&compact, &allowed_actions), GenerationPath::Rules, false)
        } else {
            let mut generation = engine.generator.generate(&compact, &allowed_actions);
            let outcome = match cancel {
                Some(mut cancel) => {
                    let raced = tokio::select! {
                        cancelled = &mut cancel => Err(cancelled.is_ok()),
                        outcome = &mut generation => Ok(outcome),
                    };
                    match raced {
                        Ok(outcome) => outcome,
                        Err(true) => {
                            engine.audit.emit(AuditEvent::new(
                                audit_ctx.session_id.clone(),
                                audit_ctx.turn_id.clone(),
                                correlation_id.clone(),
                                "turn.cancelled",
                                AuditCategory::System,
                                "coach-session",
                                AuditOutcome::Failed,
                            ));
                            return Err(TurnError::Cancelled);
                        }
                        // The cancel handle was dropped without firing:
                        // the turn keeps going.
                        Err(false) => generation.await,
                    }
                }
                None => generation.await,
            };

            match outcome {
                Ok(draft) => (draft, path, false),
                Err(error) => {
                    engine.metrics.record_generation_fallback();
                    engine.audit.emit(
                        AuditEvent::new(
                            audit_ctx.session_id.clone(),
                            audit_ctx.turn_id.clone(),
                            correlation_id.clone(),
                            "generation.fallback_to_rules",
                            AuditCategory::Generation,
                            "generation-orchestrator",
                            AuditOutcome::Failed,
                        )
                        .with_metadata("error", error.to_string()),
                    );
                    warn!(
                        event_name = "generation.fallback_to_rules",
                        session_id = %self.session_id.0,
                        correlation_id = %correlation_id,
                        error = %error,
                        "generator failed, serving rules response"
                    );
                    (engine.rules.draft(&compact, &allowed_actions), GenerationPath::Rules, true)
                }
            }
        };

        state = self.apply(&flow_ctx, &state, TurnEvent::ActionsGated, &audit_ctx)?;

        let candidates = std::mem::take(&mut draft.candidate_actions);
        let gated = engine.gate.gate(
            candidates,
            user.tier,
            &safety,
            &engine.ledger,
            &user.user_id,
            now,
            user.utc_offset_minutes,
        );
        engine.metrics.record_actions_rejected(gated.rejected.len() as u64);
        for rejection in &gated.rejected {
            engine.audit.emit(
                AuditEvent::new(
                    audit_ctx.session_id.clone(),
                    audit_ctx.turn_id.clone(),
                    correlation_id.clone(),
                    "gate.action_rejected",
                    AuditCategory::Gating,
                    "action-gate",
                    AuditOutcome::Rejected,
                )
                .with_metadata("action", rejection.action.action_type.key())
                .with_metadata("reason", rejection.reason.label()),
            );
        }

        let response =
            engine.assembler.assemble(draft, gated, &safety, path, started, degraded);
        self.apply(&flow_ctx, &state, TurnEvent::ResponseAssembled, &audit_ctx)?;
        engine.metrics.record_turn(path);

        info!(
            event_name = "turn.assembled",
            session_id = %self.session_id.0,
            correlation_id = %correlation_id,
            path = path.label(),
            degraded,
            actions = response.actions.len(),
            processing_ms = response.meta.processing_ms,
            "turn assembled"
        );

        self.persist_turn(text, detected, response.clone());
        Ok(response)
    }

    fn apply(
        &self,
        flow_ctx: &TurnFlowContext,
        state: &TurnState,
        event: TurnEvent,
        audit_ctx: &AuditContext,
    ) -> Result<TurnState, TurnError> {
        let outcome = self.engine.flow.apply_with_audit(
            state,
            &event,
            flow_ctx,
            &*self.engine.audit,
            audit_ctx,
        )?;
        Ok(outcome.to)
    }

    /// Appends both sides of the exchange to the log and feeds the
    /// summarizer queue. Dropping a queued turn is acceptable: memory is
    /// eventually consistent, the log is authoritative.
    fn persist_turn(
        &mut self,
        text: &str,
        detected: IntentDetectionResult,
        response: ConversationResponse,
    ) {
        let user_turn = ConversationTurn::user(text, detected);
        let assistant_turn = ConversationTurn::assistant(response);

        let _ = self.memory_queue.try_send(user_turn.clone());
        self.log.append(user_turn);
        self.log.append(assistant_turn);
    }
}
