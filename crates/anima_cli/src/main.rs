mod console;

use anima_affect::{AffectiveSystem, ExpectationModel, MultimodalBridge, SnapshotStore};
use anima_core::{AnimaConfig, MessageQueue, SpeechInput, SpeechOutput};
use anima_expression::{ProactiveEngine, ThoughtContext};
use anima_memory::{
    ConversationStore, GoalBook, KnowledgeGraph, LearnedPreferences, RelationshipTracker,
    TemporalContinuity, VectorMemory,
};
use anima_mind::{
    AutonomousLife, BackgroundTasks, IdentityHandler, LlmProvider, OllamaProvider, Orchestrator,
    PresenceTracker, TimerHandler,
};
use clap::Parser;
use console::{ConsoleInput, ConsoleOutput};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to TOML config file
    #[arg(short, long, default_value = "anima.toml")]
    config: String,

    /// Override the data directory
    #[arg(long)]
    data_dir: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long)]
    log_json: bool,

    /// Log file path (additional to stderr)
    #[arg(long)]
    log_file: Option<String>,

    /// Disable the autonomous life loop for this run
    #[arg(long)]
    no_autonomy: bool,
}

/// Wrap a subsystem init: on failure, log and continue with a stub.
/// The pipeline probes for presence before every use, so a missing
/// subsystem degrades features instead of killing the process.
fn safe_init<T>(name: &str, result: anyhow::Result<T>) -> Option<Arc<T>> {
    match result {
        Ok(value) => Some(Arc::new(value)),
        Err(e) => {
            warn!("subsystem '{}' failed to initialize, continuing without it: {}", name, e);
            None
        }
    }
}

fn init_tracing(args: &Args) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    if let Some(ref log_path) = args.log_file {
        let file_appender = tracing_appender::rolling::daily(
            std::path::Path::new(log_path)
                .parent()
                .unwrap_or(std::path::Path::new(".")),
            std::path::Path::new(log_path)
                .file_name()
                .unwrap_or(std::ffi::OsStr::new("anima.log")),
        );
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        // Keep the guard alive for the program's lifetime.
        std::mem::forget(guard);

        if args.log_json {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .with(fmt::layer().json().with_writer(non_blocking))
                .init();
        } else {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .with(fmt::layer().with_writer(non_blocking))
                .init();
        }
    } else if args.log_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    init_tracing(&args);

    let mut config = AnimaConfig::load_or_default(&args.config);
    if let Some(ref data_dir) = args.data_dir {
        config.identity.data_dir = data_dir.into();
    }
    // A bare relative "workspace" becomes a folder in the user's
    // documents, the agent's own corner of the filesystem.
    if config.identity.workspace_dir == std::path::PathBuf::from("workspace") {
        if let Some(docs) = dirs::document_dir() {
            config.identity.workspace_dir = docs.join(&config.identity.persona);
        }
    }
    if args.no_autonomy {
        config.autonomy.enabled = false;
    }
    std::fs::create_dir_all(&config.identity.data_dir).ok();
    std::fs::create_dir_all(&config.identity.workspace_dir).ok();

    info!(
        "starting {} (data: {}, workspace: {})",
        config.identity.persona,
        config.identity.data_dir.display(),
        config.identity.workspace_dir.display()
    );

    // ── Leaves-first construction, every subsystem optional ─────────

    let queue = Arc::new(MessageQueue::new());
    let presence = Arc::new(PresenceTracker::new());

    let llm: Option<Arc<dyn LlmProvider>> = match OllamaProvider::new(
        &config.llm.base_url,
        &config.llm.model,
    ) {
        Ok(provider) => {
            if provider.test_connection().await {
                info!("LLM reachable at {}", config.llm.base_url);
                Some(Arc::new(provider))
            } else if config.llm.require_llm {
                eprintln!(
                    "fatal: LLM at {} is unreachable and require_llm is set",
                    config.llm.base_url
                );
                std::process::exit(2)
            } else {
                warn!("LLM unreachable; continuing with template fallbacks");
                Some(Arc::new(provider))
            }
        }
        Err(e) => {
            if config.llm.require_llm {
                eprintln!("fatal: LLM client failed to initialize: {}", e);
                std::process::exit(2);
            }
            warn!("LLM client failed to initialize: {}", e);
            None
        }
    };

    let affect = Arc::new(AffectiveSystem::new());
    let bridge = Arc::new(MultimodalBridge::new());
    let expectations = Arc::new(ExpectationModel::new());
    let snapshots = Arc::new(SnapshotStore::new(config.data_path("emotional_state.json")));

    let store = safe_init(
        "conversation_store",
        ConversationStore::new(config.data_path("memory.db")).await,
    );
    let vector = match &store {
        Some(store) => safe_init("vector_memory", VectorMemory::new(store.pool())),
        None => None,
    };
    let graph = Arc::new(KnowledgeGraph::new(config.data_path("knowledge_graph.json")));
    let relationship = Arc::new(RelationshipTracker::new(
        config.data_path("relationship_data.json"),
    ));
    let preferences = Arc::new(LearnedPreferences::new(
        config.data_path("learned_preferences.json"),
    ));
    let goals = Arc::new(GoalBook::new(config.data_path("goals.json")));
    let temporal = Arc::new(TemporalContinuity::new(
        config.data_path("temporal_state.json"),
    ));
    let gate = Arc::new(anima_mind::CommandGate::new(
        config.identity.workspace_dir.clone(),
        config.data_path("command_history.json"),
        &config.safety.paid_api_hosts,
        Duration::from_secs(config.safety.command_timeout_secs),
    ));

    let mut orchestrator = Orchestrator::new(
        config.clone(),
        Arc::clone(&queue),
        Arc::clone(&presence),
    )
    .with_affect(Arc::clone(&affect))
    .with_bridge(Arc::clone(&bridge))
    .with_expectations(Arc::clone(&expectations))
    .with_snapshots(Arc::clone(&snapshots))
    .with_graph(Arc::clone(&graph))
    .with_relationship(Arc::clone(&relationship))
    .with_preferences(Arc::clone(&preferences))
    .with_goals(Arc::clone(&goals))
    .with_temporal(Arc::clone(&temporal))
    .with_gate(Arc::clone(&gate));

    if let Some(llm) = &llm {
        orchestrator = orchestrator.with_llm(Arc::clone(llm));
    }
    if let Some(store) = &store {
        orchestrator = orchestrator.with_store(Arc::clone(store));
    }
    if let Some(vector) = &vector {
        orchestrator = orchestrator.with_vector(Arc::clone(vector));
    }

    // Integration probe order is the contract: timers before identity.
    orchestrator.register_capability(Arc::new(TimerHandler::new(Arc::clone(&queue))));
    orchestrator.register_capability(Arc::new(IdentityHandler::new(
        &config.identity.persona,
        Some(Arc::clone(&temporal)),
    )));

    let orchestrator = Arc::new(orchestrator);

    // Restore yesterday's feelings, decayed for the time away.
    orchestrator.restore_emotional_state().await;

    // ── Background machinery ────────────────────────────────────────

    let (stop_tx, stop_rx) = watch::channel(false);
    let mut join_handles = Vec::new();

    if config.autonomy.enabled {
        let life = Arc::new(AutonomousLife::new(
            Arc::clone(&affect),
            llm.clone(),
            vector.clone(),
            Some(Arc::clone(&graph)),
            Some(Arc::clone(&goals)),
            Some(Arc::clone(&preferences)),
            Arc::clone(&queue),
            Arc::clone(&presence),
            config.identity.workspace_dir.clone(),
        ));
        join_handles.push(life.spawn(
            Duration::from_secs(config.autonomy.cycle_secs),
            Duration::from_secs(config.autonomy.idle_threshold_secs),
            stop_rx.clone(),
        ));
    }

    let mut tasks = BackgroundTasks::new();
    if let Some(store) = &store {
        let heartbeat = Arc::clone(store);
        tasks.add_task("instance_heartbeat", Duration::from_secs(300), move || {
            let store = Arc::clone(&heartbeat);
            async move { store.touch_instance("console").await }
        });
        let cleaner = Arc::clone(store);
        tasks.add_task("old_memory_cleanup", Duration::from_secs(3600), move || {
            let store = Arc::clone(&cleaner);
            async move {
                let deleted = store.clear_old_sessions(24).await?;
                if deleted > 0 {
                    info!("pruned {} old conversation rows", deleted);
                }
                Ok(())
            }
        });
    }
    {
        let orch = Arc::clone(&orchestrator);
        tasks.add_task("emotional_snapshot", Duration::from_secs(600), move || {
            let orch = Arc::clone(&orch);
            async move {
                orch.persist_emotional_state().await;
                Ok(())
            }
        });
    }
    {
        let graph_saver = Arc::clone(&graph);
        tasks.add_task("graph_save", Duration::from_secs(900), move || {
            let graph = Arc::clone(&graph_saver);
            async move { graph.save() }
        });
    }
    join_handles.push(tasks.spawn(stop_rx.clone()));

    // Proactive thoughts on a sliding interval, queued for idle ticks.
    if config.proactive.enabled {
        let engine = ProactiveEngine::new(
            config.data_path("proactive_state.json"),
            Duration::from_secs(config.proactive.min_interval_secs),
            Duration::from_secs(config.proactive.max_interval_secs),
        );
        let affect_p = Arc::clone(&affect);
        let prefs_p = Arc::clone(&preferences);
        let rel_p = Arc::clone(&relationship);
        let queue_p = Arc::clone(&queue);
        let orch_p = Arc::clone(&orchestrator);
        let mut stop_p = stop_rx.clone();
        join_handles.push(tokio::spawn(async move {
            loop {
                let wait = engine.next_interval();
                tokio::select! {
                    _ = tokio::time::sleep(wait) => {}
                    changed = stop_p.changed() => {
                        if changed.is_err() || *stop_p.borrow() {
                            return;
                        }
                    }
                }
                if orch_p.is_sleeping() {
                    continue;
                }
                if let Some(check_in) =
                    engine.check_in(rel_p.depth().as_str(), rel_p.hours_since_last_interaction())
                {
                    queue_p.push(check_in, anima_core::MessagePriority::Medium);
                    continue;
                }
                let ctx = ThoughtContext {
                    dominant_emotion: affect_p.dominant().await.map(|d| d.emotion),
                    top_interests: prefs_p.top_interests(3).into_iter().map(|(t, _)| t).collect(),
                    recent_topic: None,
                };
                if let Some(thought) = engine.generate_thought(&ctx, None) {
                    queue_p.push(thought, anima_core::MessagePriority::Low);
                }
            }
        }));
    }

    // ── The main turn loop ──────────────────────────────────────────

    let input = ConsoleInput::spawn();
    let output = ConsoleOutput {
        persona: config.identity.persona.clone(),
    };

    let greeting = orchestrator.greeting();
    let (emotion, prosody) = orchestrator.speech_params().await;
    output.speak(&greeting, emotion, prosody).await;

    let mut silence_ticks: u32 = 0;
    loop {
        match input.listen(Duration::from_secs(5)).await {
            Some(line) => {
                silence_ticks = 0;
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                match trimmed {
                    "quit" | "exit" => break,
                    "status" => {
                        print_status(&orchestrator, &affect, &temporal, &relationship).await;
                        continue;
                    }
                    _ => {}
                }

                let reply = orchestrator.process_turn(trimmed).await;
                if !reply.is_empty() {
                    let (emotion, prosody) = orchestrator.speech_params().await;
                    output.speak(&reply, emotion, prosody).await;
                }
            }
            None => {
                silence_ticks += 1;
                // After a stretch of quiet, queued thoughts come out.
                if silence_ticks > 2 && !orchestrator.is_sleeping() {
                    for msg in queue.drain(3) {
                        let (emotion, prosody) = orchestrator.speech_params().await;
                        output.speak(&msg.text, emotion, prosody).await;
                    }
                }
            }
        }
    }

    // ── Orderly shutdown ────────────────────────────────────────────

    info!("shutting down");
    let _ = stop_tx.send(true);

    // Drain anything still queued, briefly.
    let drain_deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while tokio::time::Instant::now() < drain_deadline {
        match queue.pop() {
            Some(msg) => {
                let (emotion, prosody) = orchestrator.speech_params().await;
                output.speak(&msg.text, emotion, prosody).await;
            }
            None => break,
        }
    }

    orchestrator.shutdown().await;
    for handle in join_handles {
        let _ = tokio::time::timeout(Duration::from_secs(2), handle).await;
    }

    info!("goodbye");
    Ok(())
}

async fn print_status(
    orchestrator: &Orchestrator,
    affect: &AffectiveSystem,
    temporal: &TemporalContinuity,
    relationship: &RelationshipTracker,
) {
    let mood = affect.mood().await;
    let dominant = affect.dominant().await;
    println!("\n── status ──");
    match dominant {
        Some(d) => println!(
            "feeling: {} ({:.0}%) — {}",
            d.emotion,
            d.intensity * 100.0,
            d.cause
        ),
        None => println!("feeling: settled"),
    }
    println!("mood: {} ({:.0}%)", mood.dominant, mood.intensity * 100.0);
    println!(
        "session #{}, {} total interactions",
        temporal.total_sessions(),
        temporal.total_interactions()
    );
    println!("{}", relationship.summary_for_prompt());
    println!(
        "sleeping: {}, processing: {}",
        orchestrator.is_sleeping(),
        orchestrator.is_processing()
    );
    println!();
}
