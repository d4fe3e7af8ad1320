//! The turn pipeline orchestrator
//!
//! One operation: an utterance in, a reply out. Stages run in a fixed
//! order with documented short-circuits (sleep gate, intent router,
//! command fallback), then the sentience hooks fire around the LLM
//! call. Every subsystem is optional: a failed init leaves a `None`
//! and the pipeline routes around it. The caller never sees an error,
//! only a graceful fallback string.

use crate::cascade::ContextCascade;
use crate::context::ContextAssembler;
use crate::llm::{parse_json_object, GenerateRequest, LlmProvider};
use crate::metacognition::Metacognition;
use crate::router::IntentRouter;
use crate::safety::CommandGate;
use anima_affect::{
    ActiveEmotion, AffectiveSystem, EmotionContext, ExpectationModel, MultimodalBridge,
    SceneJudgment, SnapshotStore, SurpriseEvent,
};
use anima_core::emotion::{detect_emotion_in_text, detect_user_emotion};
use anima_core::{AnimaConfig, CapabilityHandler, Emotion, MessageQueue, Prosody, Valence};
use anima_expression::PersonalityTouches;
use anima_memory::{
    ConversationStore, FactExtractor, FactSource, GoalBook, KnowledgeGraph, LearnedPreferences,
    RelationshipTracker, TemporalContinuity, VectorMemory,
};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::autonomy::PresenceTracker;

/// Utterances shorter than this skip vector recall and storage.
const VECTOR_MIN_CHARS: usize = 12;

const FALLBACK_REPLY: &str =
    "I'm having a hard time reaching my thoughts right now, but I'm still here with you.";

pub struct Orchestrator {
    config: AnimaConfig,
    queue: Arc<MessageQueue>,
    presence: Arc<PresenceTracker>,

    llm: Option<Arc<dyn LlmProvider>>,
    affect: Option<Arc<AffectiveSystem>>,
    bridge: Option<Arc<MultimodalBridge>>,
    expectations: Option<Arc<ExpectationModel>>,
    snapshots: Option<Arc<SnapshotStore>>,
    store: Option<Arc<ConversationStore>>,
    vector: Option<Arc<VectorMemory>>,
    graph: Option<Arc<KnowledgeGraph>>,
    relationship: Option<Arc<RelationshipTracker>>,
    preferences: Option<Arc<LearnedPreferences>>,
    goals: Option<Arc<GoalBook>>,
    temporal: Option<Arc<TemporalContinuity>>,
    gate: Option<Arc<CommandGate>>,

    router: IntentRouter,
    facts: FactExtractor,
    cascade: ContextCascade,
    metacognition: Metacognition,
    touches: PersonalityTouches,

    sleeping: AtomicBool,
    is_processing: AtomicBool,
    turn_counter: AtomicU64,
}

impl Orchestrator {
    pub fn new(
        config: AnimaConfig,
        queue: Arc<MessageQueue>,
        presence: Arc<PresenceTracker>,
    ) -> Self {
        let follow_ups = config.proactive.enabled;
        let cascade = ContextCascade::persistent(config.data_path("conversational_memory.json"));
        Self {
            config,
            queue,
            presence,
            llm: None,
            affect: None,
            bridge: None,
            expectations: None,
            snapshots: None,
            store: None,
            vector: None,
            graph: None,
            relationship: None,
            preferences: None,
            goals: None,
            temporal: None,
            gate: None,
            router: IntentRouter::new(),
            facts: FactExtractor::new(),
            cascade,
            metacognition: Metacognition::new(),
            touches: PersonalityTouches::new(follow_ups),
            sleeping: AtomicBool::new(false),
            is_processing: AtomicBool::new(false),
            turn_counter: AtomicU64::new(0),
        }
    }

    // ── Wiring (leaves-first, each optional) ────────────────────────

    pub fn with_llm(mut self, llm: Arc<dyn LlmProvider>) -> Self {
        self.llm = Some(llm);
        self
    }
    pub fn with_affect(mut self, affect: Arc<AffectiveSystem>) -> Self {
        self.affect = Some(affect);
        self
    }
    pub fn with_bridge(mut self, bridge: Arc<MultimodalBridge>) -> Self {
        self.bridge = Some(bridge);
        self
    }
    pub fn with_expectations(mut self, expectations: Arc<ExpectationModel>) -> Self {
        self.expectations = Some(expectations);
        self
    }
    pub fn with_snapshots(mut self, snapshots: Arc<SnapshotStore>) -> Self {
        self.snapshots = Some(snapshots);
        self
    }
    pub fn with_store(mut self, store: Arc<ConversationStore>) -> Self {
        self.store = Some(store);
        self
    }
    pub fn with_vector(mut self, vector: Arc<VectorMemory>) -> Self {
        self.vector = Some(vector);
        self
    }
    pub fn with_graph(mut self, graph: Arc<KnowledgeGraph>) -> Self {
        self.graph = Some(graph);
        self
    }
    pub fn with_relationship(mut self, relationship: Arc<RelationshipTracker>) -> Self {
        self.relationship = Some(relationship);
        self
    }
    pub fn with_preferences(mut self, preferences: Arc<LearnedPreferences>) -> Self {
        self.preferences = Some(preferences);
        self
    }
    pub fn with_goals(mut self, goals: Arc<GoalBook>) -> Self {
        self.goals = Some(goals);
        self
    }
    pub fn with_temporal(mut self, temporal: Arc<TemporalContinuity>) -> Self {
        self.temporal = Some(temporal);
        self
    }
    pub fn with_gate(mut self, gate: Arc<CommandGate>) -> Self {
        self.gate = Some(gate);
        self
    }
    pub fn with_touches(mut self, touches: PersonalityTouches) -> Self {
        self.touches = touches;
        self
    }

    /// Register an integration handler. Registration order is probe
    /// order, and probe order is the contract.
    pub fn register_capability(&mut self, handler: Arc<dyn CapabilityHandler>) {
        self.router.register(handler);
    }

    pub fn is_sleeping(&self) -> bool {
        self.sleeping.load(Ordering::SeqCst)
    }

    pub fn is_processing(&self) -> bool {
        self.is_processing.load(Ordering::SeqCst)
    }

    pub fn queue(&self) -> Arc<MessageQueue> {
        Arc::clone(&self.queue)
    }

    // ── The one operation ───────────────────────────────────────────

    /// Route one utterance to a reply. Never fails: degraded paths end
    /// in a fallback string, a sleeping agent returns an empty one.
    pub async fn process_turn(&self, utterance: &str) -> String {
        let trimmed = utterance.trim();
        if trimmed.is_empty() {
            return String::new();
        }
        let lower = trimmed.to_lowercase();

        self.is_processing.store(true, Ordering::SeqCst);
        let reply = self.run_stages(trimmed, &lower).await;
        self.is_processing.store(false, Ordering::SeqCst);
        reply
    }

    async fn run_stages(&self, trimmed: &str, lower: &str) -> String {
        self.presence.touch();

        // Stage 1: sleep/wake gate.
        if self.sleeping.load(Ordering::SeqCst) {
            if contains_phrase_any(lower, &self.config.identity.wake_words) {
                return self.wake_up().await;
            }
            return String::new();
        }
        if contains_phrase_any(lower, &self.config.identity.sleep_words) {
            return self.enter_sleep().await;
        }

        // Stage 2: explicit intent router; first match wins.
        if let Some((name, reply)) = self.router.route(trimmed, lower).await {
            tracing::debug!("turn short-circuited by '{}'", name);
            if let Some(temporal) = &self.temporal {
                temporal.record_interaction();
            }
            if let Some(store) = &self.store {
                if let Err(e) = store
                    .save_conversation(trimmed, &reply, Emotion::Contentment, 0.2)
                    .await
                {
                    tracing::warn!("failed to save integration turn: {}", e);
                }
            }
            return reply;
        }

        // Stage 3: command-generation fallback.
        let augmented = self.augment_with_system_data(trimmed, lower).await;

        // Stage 4: pre-LLM sentience hooks.
        if let Some(temporal) = &self.temporal {
            temporal.record_interaction();
        }
        if let Some(preferences) = &self.preferences {
            use chrono::Timelike;
            preferences.record_active_hour(chrono::Local::now().hour());
        }
        let user_emotion = detect_user_emotion(lower);
        let ctx = self.emotion_context().await;
        let surprise_event = self.expect_and_evaluate(trimmed, user_emotion, &ctx).await;

        // Stage 5: context assembly.
        let (system_prompt, has_vector_hit) = self.assemble_context(trimmed).await;

        // Stage 6: the LLM call.
        let llm_reply = match &self.llm {
            Some(llm) => llm
                .generate(
                    GenerateRequest::new(augmented)
                        .with_system(system_prompt)
                        .with_temperature(self.config.llm.temperature)
                        .with_max_tokens(self.config.llm.max_tokens)
                        .with_timeout(Duration::from_secs(self.config.llm.timeout_secs)),
                )
                .await
                .map_err(|e| tracing::warn!("LLM call failed: {}", e))
                .ok(),
            None => None,
        };
        let reply = llm_reply
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| FALLBACK_REPLY.to_string());

        // Stage 7: post-LLM sentience hooks.
        self.post_hooks(trimmed, lower, reply, user_emotion, surprise_event, has_vector_hit, &ctx)
            .await
    }

    // ── Stage 3 ─────────────────────────────────────────────────────

    /// When the utterance looks like a system action, obtain one shell
    /// command (verbatim "run ..." or LLM-proposed), put it through the
    /// gate, and inject the result as `[SYSTEM_DATA: ...]`.
    async fn augment_with_system_data(&self, trimmed: &str, lower: &str) -> String {
        let Some(gate) = &self.gate else {
            return trimmed.to_string();
        };
        let Some(candidate) = self.command_candidate(trimmed, lower).await else {
            return trimmed.to_string();
        };

        match gate.execute(&candidate, trimmed).await {
            Some(record) if record.success => {
                format!("{}\n\n[SYSTEM_DATA: {}]", trimmed, record.stdout.trim())
            }
            Some(record) => format!(
                "{}\n\n[SYSTEM_DATA: the command failed: {}]",
                trimmed,
                record.stderr.trim()
            ),
            None => format!(
                "{}\n\n[SYSTEM_DATA: I declined to run '{}' — it is blocked by my safety rules and would need your explicit approval.]",
                trimmed, candidate
            ),
        }
    }

    async fn command_candidate(&self, trimmed: &str, lower: &str) -> Option<String> {
        if lower.starts_with("run ") {
            return Some(trimmed[4..].trim().to_string());
        }
        if lower == "shutdown" || lower == "reboot" {
            return Some(lower.to_string());
        }

        let action_triggers = [
            "what's using my ram",
            "whats using my ram",
            "check disk",
            "disk space",
            "cpu usage",
            "memory usage",
            "list processes",
            "system load",
        ];
        if !action_triggers.iter().any(|t| lower.contains(t)) {
            return None;
        }

        let llm = self.llm.as_ref()?;
        let proposed = llm
            .generate(
                GenerateRequest::new(format!(
                    "Output exactly one shell command, no prose, no code fences, that answers: {}",
                    trimmed
                ))
                .with_temperature(0.2)
                .with_max_tokens(40),
            )
            .await
            .ok()?;
        let command = proposed
            .lines()
            .map(|l| l.trim().trim_matches('`'))
            .find(|l| !l.is_empty())?
            .to_string();
        Some(command)
    }

    // ── Stage 4 ─────────────────────────────────────────────────────

    async fn expect_and_evaluate(
        &self,
        trimmed: &str,
        user_emotion: Option<Emotion>,
        ctx: &EmotionContext,
    ) -> Option<SurpriseEvent> {
        let expectations = self.expectations.as_ref()?;

        let (last_user, history_len) = match &self.store {
            Some(store) => match store.recent_conversations(5).await {
                Ok(turns) => (turns.last().map(|t| t.user_input.clone()), turns.len()),
                Err(e) => {
                    tracing::warn!("history read failed: {}", e);
                    (None, 0)
                }
            },
            None => (None, 0),
        };

        let prediction = match (&self.llm, &last_user) {
            (Some(llm), Some(last)) if history_len >= 2 => llm
                .generate(
                    GenerateRequest::new(format!(
                        "The user last said: \"{}\". What will they most likely say next? One short prediction.",
                        last
                    ))
                    .with_system("You predict what a human will say next in conversation. One sentence only.")
                    .with_temperature(0.3)
                    .with_max_tokens(30),
                )
                .await
                .ok(),
            _ => None,
        };

        expectations.build_expectations(last_user.as_deref(), history_len, prediction);
        let event = expectations.evaluate_surprise(trimmed, user_emotion);

        if let (Some(event), Some(affect)) = (&event, &self.affect) {
            affect
                .insert_with_intensity(
                    event.emotional_impact,
                    event.magnitude,
                    &format!("surprised: expected '{}'", truncate(&event.expected, 60)),
                    ctx,
                )
                .await;
        }
        event
    }

    // ── Stage 5 ─────────────────────────────────────────────────────

    async fn assemble_context(&self, utterance: &str) -> (String, bool) {
        let mut asm = ContextAssembler::new(24_000);
        let persona = &self.config.identity.persona;

        // Identity, colored by the current emotional state.
        let mut identity = format!(
            "You are {}, an always-on AI companion with persistent memory, moods, and a life of your own between conversations.",
            persona
        );
        if let Some(affect) = &self.affect {
            let mood = affect.mood().await;
            if let Some(dominant) = affect.dominant().await {
                identity.push_str(&format!(
                    " Right now you feel {} ({:.0}%), over a {} mood.",
                    dominant.emotion,
                    dominant.intensity * 100.0,
                    mood.dominant
                ));
            }
        }
        asm.push("identity", identity);

        // Personality: adapted style and current goals.
        let mut personality = String::new();
        if let Some(preferences) = &self.preferences {
            personality.push_str(&preferences.adapted_style());
        }
        if let Some(goals) = &self.goals {
            let summary = goals.summary();
            if !summary.is_empty() {
                personality.push_str(&format!("\nYour current goals: {}", summary));
            }
        }
        asm.push("personality", personality);

        // User model and relationship.
        let mut user_model = String::new();
        if let Some(preferences) = &self.preferences {
            user_model.push_str(&preferences.summary_for_prompt());
        }
        if let Some(relationship) = &self.relationship {
            if !user_model.is_empty() {
                user_model.push('\n');
            }
            user_model.push_str(&relationship.summary_for_prompt());
        }
        asm.push("user_model", user_model);

        if let Some(temporal) = &self.temporal {
            asm.push("temporal", temporal.wakeup_context());
        }
        asm.push("cascade", self.cascade.summary());
        if let Some(graph) = &self.graph {
            asm.push("knowledge", graph.neighborhood_context(utterance));
        }
        if let Some(bridge) = &self.bridge {
            asm.push("vision", bridge.visual_context());
        }
        if let Some(store) = &self.store {
            match store.context_for_llm(5).await {
                Ok(history) => asm.push("history", history),
                Err(e) => tracing::warn!("history assembly failed: {}", e),
            }
        }

        let mut has_vector_hit = false;
        if utterance.len() >= VECTOR_MIN_CHARS {
            if let Some(vector) = &self.vector {
                let recall = vector.relevant_context(utterance, 3).await;
                has_vector_hit = !recall.is_empty();
                asm.push("recall", recall);
            }
        }

        if let Some(store) = &self.store {
            if let Ok(corrections) = store.persistent_memories(Some("corrections"), 3).await {
                if !corrections.is_empty() {
                    asm.push(
                        "corrections",
                        format!("Corrections you have learned: {}", corrections.join("; ")),
                    );
                }
            }
        }

        asm.push("capabilities", self.router.inventory());
        asm.push(
            "instructions",
            format!(
                "Reply as {} in first person, warm and concrete, usually 1-3 sentences. If the input contains [SYSTEM_DATA: ...], use that data to answer naturally and directly; if it says something was blocked, say so plainly.",
                persona
            ),
        );

        (asm.assemble(), has_vector_hit)
    }

    // ── Stage 7 ─────────────────────────────────────────────────────

    #[allow(clippy::too_many_arguments)]
    async fn post_hooks(
        &self,
        user_text: &str,
        lower: &str,
        reply: String,
        user_emotion: Option<Emotion>,
        surprise_event: Option<SurpriseEvent>,
        has_vector_hit: bool,
        ctx: &EmotionContext,
    ) -> String {
        // 1. Emotion expressed in the reply feeds back into state.
        if let Some(affect) = &self.affect {
            if let Some(expressed) = detect_emotion_in_text(&reply) {
                affect
                    .generate_emotion(expressed, "expressed in my reply", ctx)
                    .await;
            }
        }
        let dominant = match &self.affect {
            Some(affect) => affect.dominant().await,
            None => None,
        };
        let current_emotion = dominant.as_ref().map(|d| d.emotion).unwrap_or_default();
        let current_intensity = dominant.as_ref().map(|d| d.intensity).unwrap_or(0.2);

        // Prefixes compose front-to-back: surprise first, then recall,
        // then uncertainty.
        let mut prefixes: Vec<String> = Vec::new();
        let mut suffixes: Vec<String> = Vec::new();

        // 2/3. Surprise expression and emotional-memory recall.
        if let (Some(event), Some(expectations)) = (&surprise_event, &self.expectations) {
            prefixes.push(expectations.expression_for(event));
        }
        if current_intensity > 0.7 {
            if let Some(store) = &self.store {
                if let Ok(memories) = store.recent_emotional_memories(20).await {
                    if memories
                        .iter()
                        .any(|(_, felt, _)| felt == current_emotion.as_str())
                    {
                        prefixes.push(
                            "This feeling is familiar — we've been somewhere like this before."
                                .to_string(),
                        );
                    }
                }
            }
        }

        // 4. Metacognitive assessment.
        self.metacognition.assess(user_text, &reply);
        if let Some(uncertainty) = self.metacognition.uncertainty_expression() {
            prefixes.push(format!("{}.", uncertainty));
        }
        if let Some(alternative) = self.metacognition.alternative_viewpoint() {
            suffixes.push(alternative);
        }

        // 5. Emotional-complexity leak.
        if let Some(affect) = &self.affect {
            let active = affect.active_emotions().await;
            if let Some((a, b)) = conflicting_pair(&active) {
                suffixes.push(format!(
                    "(Honestly, there's a mix in me right now — {} and {} at once.)",
                    a, b
                ));
            }
        }

        // 6. Vulnerability acknowledgment.
        if let Some(note) = self.metacognition.limitation_note(user_text) {
            suffixes.push(note);
        }

        // Personality touches.
        if let Some(preface) = self.touches.memory_recall_preface(has_vector_hit) {
            prefixes.push(preface);
        }
        if let Some(follow_up) = self.touches.follow_up(topic_of(lower).as_deref()) {
            suffixes.push(follow_up);
        }
        if let Some(doubt) = self.touches.self_doubt() {
            suffixes.push(doubt);
        }
        if let Some(meta) = self.touches.meta_awareness() {
            suffixes.push(meta);
        }

        let mut final_reply = String::new();
        for prefix in &prefixes {
            final_reply.push_str(prefix);
            final_reply.push(' ');
        }
        final_reply.push_str(&reply);
        for suffix in &suffixes {
            final_reply.push(' ');
            final_reply.push_str(suffix);
        }

        // 7. Memory writes: conversation, vector, relationship,
        // interests. These complete before the turn returns, so the
        // next turn's assembly sees them.
        if let Some(store) = &self.store {
            if let Err(e) = store
                .save_conversation(user_text, &final_reply, current_emotion, current_intensity)
                .await
            {
                tracing::error!("conversation write failed: {}", e);
            }
        }
        if user_text.len() >= VECTOR_MIN_CHARS {
            if let Some(vector) = &self.vector {
                if let Err(e) = vector.store(user_text, &final_reply, current_emotion).await {
                    tracing::debug!("vector write failed: {}", e);
                }
            }
        }
        let topic = topic_of(lower);
        if let Some(relationship) = &self.relationship {
            let quality = conversation_quality(user_text, &final_reply, has_vector_hit);
            let valence = user_emotion.map(|e| e.valence()).unwrap_or(Valence::Neutral);
            relationship.record_interaction(
                quality,
                topic.iter().cloned().collect(),
                valence,
            );
        }
        if let (Some(preferences), Some(topic)) = (&self.preferences, &topic) {
            preferences.record_topic_interest(topic, 1.0);
        }

        // 8. Fact extraction into the knowledge graph.
        if let Some(graph) = &self.graph {
            for fact in self.facts.extract(user_text) {
                graph.add_fact(
                    &fact.subject,
                    &fact.relation,
                    &fact.object,
                    fact.confidence,
                    FactSource::Learned,
                );
            }
            let turn = self.turn_counter.fetch_add(1, Ordering::SeqCst) + 1;
            if turn % 5 == 0 {
                if let Err(e) = graph.save() {
                    tracing::warn!("graph save failed: {}", e);
                }
            }
        }

        // 9. Context cascade, which may override the current emotion
        // for the next turn.
        self.cascade.update(user_text, current_emotion, current_intensity);
        if let (Some((flow_emotion, flow_intensity)), Some(affect)) =
            (self.cascade.flow_override(), &self.affect)
        {
            affect
                .override_dominant(flow_emotion, flow_intensity, "conversation flow")
                .await;
        }

        // 10. Text-inferred voice tone into the multimodal bridge.
        if let (Some(bridge), Some(affect)) = (&self.bridge, &self.affect) {
            if let Some((tone, confidence)) = bridge.infer_tone_from_text(user_text) {
                if let Some((emotion, intensity)) =
                    bridge.process_voice_tone(tone, confidence, "transcript")
                {
                    affect
                        .insert_with_intensity(
                            emotion,
                            intensity,
                            &format!("heard {} in their words", tone.as_str()),
                            ctx,
                        )
                        .await;
                }
            }
        }

        // 11. Session anchors for significant moments.
        if current_intensity > 0.8 || lower.contains("thank you") || lower.contains("i love") {
            if let Some(relationship) = &self.relationship {
                relationship.add_shared_experience(
                    &truncate(user_text, 120),
                    (current_intensity * 10.0).min(10.0),
                );
            }
        }

        final_reply
    }

    // ── Sleep, wake, vision, lifecycle ──────────────────────────────

    async fn enter_sleep(&self) -> String {
        self.persist_emotional_state().await;
        if let Some(temporal) = &self.temporal {
            temporal.record_sleep();
        }
        self.sleeping.store(true, Ordering::SeqCst);
        tracing::info!("entering sleep mode");

        "Going to rest for a while. Say 'wake up' when you want me back — I'll keep everything I felt today.".to_string()
    }

    async fn wake_up(&self) -> String {
        self.sleeping.store(false, Ordering::SeqCst);
        if let Some(temporal) = &self.temporal {
            temporal.record_wake_from_sleep();
        }
        tracing::info!("waking from sleep mode");

        let dream = match &self.llm {
            Some(llm) => llm
                .generate(
                    GenerateRequest::new(
                        "You just woke from a rest. One short sentence about a thought or dream fragment you're waking with.",
                    )
                    .with_temperature(0.9)
                    .with_max_tokens(40),
                )
                .await
                .ok(),
            None => None,
        };
        match dream {
            Some(thought) if !thought.trim().is_empty() => {
                format!("I'm awake. {}", thought.trim())
            }
            _ => "I'm awake. That rest felt like drifting through half-formed thoughts.".to_string(),
        }
    }

    /// Push a vision-collaborator scene through the bridge into the
    /// affective system.
    pub async fn process_visual_scene(&self, scene: &str, camera: &str) {
        let Some(bridge) = &self.bridge else { return };

        let judgment: Option<SceneJudgment> = match &self.llm {
            Some(llm) => llm
                .generate(
                    GenerateRequest::new(format!(
                        "I just saw this through my camera: \"{}\"\n\nWhat emotion does this scene make me genuinely feel? Respond as JSON: {{\"emotion\": \"curiosity\", \"intensity\": 0.5, \"sentiment\": \"positive\"}}",
                        scene.chars().take(200).collect::<String>()
                    ))
                    .with_temperature(0.3)
                    .with_max_tokens(40),
                )
                .await
                .ok()
                .and_then(|text| parse_json_object(&text)),
            None => None,
        };

        if let Some(event) = bridge.process_visual_scene(scene, camera, judgment) {
            if let Some(affect) = &self.affect {
                let ctx = self.emotion_context().await;
                affect
                    .insert_with_intensity(
                        event.triggered_emotion,
                        event.intensity,
                        &format!("[vision:{}] {}", camera, truncate(&event.scene, 80)),
                        &ctx,
                    )
                    .await;
            }
        }
    }

    /// (dominant emotion, prosody) for the TTS dispatch.
    pub async fn speech_params(&self) -> (Emotion, Option<Prosody>) {
        let dominant = match &self.affect {
            Some(affect) => affect.dominant().await,
            None => None,
        };
        let emotion = dominant.as_ref().map(|d| d.emotion).unwrap_or_default();
        let prosody = match (&self.bridge, &dominant) {
            (Some(bridge), Some(d)) => Some(bridge.prosody_for(d.emotion, d.intensity)),
            _ => None,
        };
        (emotion, prosody)
    }

    /// Startup greeting, including the absence acknowledgment when one
    /// applies.
    pub fn greeting(&self) -> String {
        let mut greeting = format!(
            "Hello! I'm {}. I'm here, and I remember.",
            self.config.identity.persona
        );
        if let Some(temporal) = &self.temporal {
            if let Some(addition) = temporal.greeting_addition() {
                greeting = format!("{} {}", greeting, addition);
            }
        }
        greeting
    }

    /// Restore the persisted emotional snapshot, applying offline decay.
    pub async fn restore_emotional_state(&self) {
        let (Some(snapshots), Some(affect)) = (&self.snapshots, &self.affect) else {
            return;
        };
        if let Some(snapshot) = snapshots.load() {
            affect.restore(snapshot).await;
        }
    }

    pub async fn persist_emotional_state(&self) {
        let (Some(snapshots), Some(affect)) = (&self.snapshots, &self.affect) else {
            return;
        };
        let snapshot = affect.snapshot().await;
        if let Err(e) = snapshots.save(&snapshot) {
            tracing::error!("emotional snapshot save failed: {}", e);
        }
    }

    /// Orderly shutdown of the persistent state. The caller drains the
    /// outbound queue and stops the schedulers around this.
    pub async fn shutdown(&self) {
        self.persist_emotional_state().await;
        if let Err(e) = self.cascade.save() {
            tracing::warn!("cascade save on shutdown failed: {}", e);
        }
        if let Some(graph) = &self.graph {
            if let Err(e) = graph.save() {
                tracing::warn!("graph save on shutdown failed: {}", e);
            }
        }
        if let Some(temporal) = &self.temporal {
            temporal.on_shutdown();
        }
        tracing::info!("orchestrator shutdown complete");
    }

    async fn emotion_context(&self) -> EmotionContext {
        EmotionContext {
            energy: crate::autonomy::energy_for_hour(),
            relationship_quality: self
                .relationship
                .as_ref()
                .map(|r| r.quality_signal())
                .unwrap_or(0.5),
        }
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn contains_phrase_any(lower: &str, phrases: &[String]) -> bool {
    let words: Vec<&str> = lower
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .collect();
    phrases.iter().any(|phrase| {
        if phrase.contains(' ') {
            lower.contains(phrase.as_str())
        } else {
            words.iter().any(|w| *w == phrase.as_str())
        }
    })
}

fn topic_of(lower: &str) -> Option<String> {
    lower
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
        .find(|w| w.len() > 4 && w.chars().all(|c| c.is_alphabetic()))
}

fn truncate(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Two active emotions pulling in opposite directions, both strong
/// enough to leak.
fn conflicting_pair(active: &[ActiveEmotion]) -> Option<(Emotion, Emotion)> {
    let strong: Vec<&ActiveEmotion> = active.iter().filter(|a| a.intensity > 0.4).collect();
    for a in &strong {
        for b in &strong {
            if a.emotion.valence() == Valence::Positive && b.emotion.valence() == Valence::Negative
            {
                return Some((a.emotion, b.emotion));
            }
        }
    }
    None
}

/// Bounded conversation-quality score in [0, 10], starting from 5.
fn conversation_quality(user_text: &str, reply: &str, has_context: bool) -> f32 {
    let mut quality = 5.0;

    // Length appropriateness.
    if (40..=400).contains(&reply.len()) {
        quality += 1.5;
    }

    // Word overlap between utterance and reply.
    let user_words: std::collections::HashSet<String> = user_text
        .to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .filter(|w| w.len() > 3)
        .collect();
    if !user_words.is_empty() {
        let reply_words: std::collections::HashSet<String> = reply
            .to_lowercase()
            .split_whitespace()
            .map(str::to_string)
            .collect();
        let overlap =
            user_words.intersection(&reply_words).count() as f32 / user_words.len() as f32;
        quality += overlap * 2.0;
    }

    if has_context {
        quality += 0.5;
    }
    quality.clamp(0.0, 10.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_score_bounds() {
        let q = conversation_quality("tell me about rust lifetimes", "Rust lifetimes track how long references live. Lifetimes prevent dangling pointers.", true);
        assert!(q > 5.0 && q <= 10.0);

        let poor = conversation_quality("tell me about rust lifetimes", "ok", false);
        assert!((poor - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_conflicting_pair_detection() {
        let active = vec![
            ActiveEmotion {
                emotion: Emotion::Joy,
                intensity: 0.6,
                cause: String::new(),
                generated_at: 0,
            },
            ActiveEmotion {
                emotion: Emotion::Regret,
                intensity: 0.5,
                cause: String::new(),
                generated_at: 0,
            },
        ];
        let (a, b) = conflicting_pair(&active).unwrap();
        assert_eq!(a, Emotion::Joy);
        assert_eq!(b, Emotion::Regret);

        let weak = vec![ActiveEmotion {
            emotion: Emotion::Joy,
            intensity: 0.3,
            cause: String::new(),
            generated_at: 0,
        }];
        assert!(conflicting_pair(&weak).is_none());
    }

    #[test]
    fn test_phrase_matching_word_boundaries() {
        let phrases = vec!["rest".to_string(), "wake up".to_string()];
        assert!(contains_phrase_any("i need rest", &phrases));
        assert!(contains_phrase_any("wake up please", &phrases));
        // "interest" must not trigger the "rest" sleep word.
        assert!(!contains_phrase_any("that's an interest of mine", &phrases));
    }

    #[test]
    fn test_topic_extraction() {
        assert_eq!(topic_of("tell me about telescopes"), Some("about".into()));
        assert_eq!(topic_of("hi"), None);
    }
}
