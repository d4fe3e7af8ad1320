//! Core affective state
//!
//! The AffectiveSystem owns the set of active emotions and the derived
//! mood. All mutation goes through its API; other subsystems only read
//! snapshots. Decay is applied lazily against the wall clock, so the
//! state is correct whenever it is observed, not only on a timer.

use crate::situations::Situation;
use crate::snapshot::EmotionalSnapshot;
use anima_core::{Emotion, Valence};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Maximum coexisting active emotions. The weakest-oldest is evicted
/// when a new one arrives at capacity.
const MAX_ACTIVE: usize = 10;

/// Emotions below this intensity are discarded at generation time.
const MIN_GENERATED: f32 = 0.1;

/// Emotions below this intensity are removed after decay.
const MIN_ALIVE: f32 = 0.05;

/// Mood is recomputed at most this often unless forced.
const MOOD_REFRESH_SECS: i64 = 30;

/// In-session half-lives in minutes, by valence class. Negative states
/// linger longer than positive ones.
fn half_life_minutes(valence: Valence) -> f32 {
    match valence {
        Valence::Positive => 6.0,
        Valence::Negative => 9.0,
        Valence::Neutral => 7.5,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveEmotion {
    pub emotion: Emotion,
    pub intensity: f32,
    pub cause: String,
    /// Unix timestamp seconds.
    pub generated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mood {
    pub dominant: Emotion,
    pub intensity: f32,
    /// Unix timestamp seconds.
    pub as_of: i64,
}

impl Default for Mood {
    fn default() -> Self {
        Self {
            dominant: Emotion::Peaceful,
            intensity: 0.2,
            as_of: 0,
        }
    }
}

/// Context modifiers applied to a freshly generated emotion.
#[derive(Debug, Clone)]
pub struct EmotionContext {
    /// Current energy level from homeostasis, 0.0-1.0.
    pub energy: f32,
    /// Relationship quality with the principal, 0.0-1.0.
    pub relationship_quality: f32,
}

impl Default for EmotionContext {
    fn default() -> Self {
        Self {
            energy: 0.6,
            relationship_quality: 0.5,
        }
    }
}

#[derive(Debug, Default)]
struct AffectState {
    active: Vec<ActiveEmotion>,
    mood: Mood,
}

pub struct AffectiveSystem {
    state: RwLock<AffectState>,
}

impl AffectiveSystem {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(AffectState::default()),
        }
    }

    /// Generate an emotion with a known label. Intensity is
    /// `base(emotion) * modifier(context)`, clamped; below 0.1 nothing
    /// happens and `None` is returned.
    pub async fn generate_emotion(
        &self,
        emotion: Emotion,
        cause: &str,
        ctx: &EmotionContext,
    ) -> Option<ActiveEmotion> {
        let intensity = emotion.base_intensity();
        self.insert_with_intensity(emotion, intensity, cause, ctx)
            .await
    }

    /// Generate an emotion with an explicit base intensity (used by the
    /// surprise system, the multimodal bridge, and situation tendencies,
    /// which carry their own baselines).
    pub async fn insert_with_intensity(
        &self,
        emotion: Emotion,
        base: f32,
        cause: &str,
        ctx: &EmotionContext,
    ) -> Option<ActiveEmotion> {
        let now = chrono::Utc::now().timestamp();
        let mut state = self.state.write().await;
        decay_in_place(&mut state.active, now);

        let modifier = context_modifier(emotion, ctx, state.mood.dominant);
        let intensity = (base * modifier).clamp(0.0, 1.0);
        if intensity < MIN_GENERATED {
            return None;
        }

        let entry = ActiveEmotion {
            emotion,
            intensity,
            cause: cause.to_string(),
            generated_at: now,
        };

        if let Some(existing) = state.active.iter_mut().find(|a| a.emotion == emotion) {
            // Re-feeling an emotion refreshes it rather than duplicating.
            existing.intensity = existing.intensity.max(intensity);
            existing.cause = entry.cause.clone();
            existing.generated_at = now;
        } else {
            if state.active.len() >= MAX_ACTIVE {
                evict_weakest_oldest(&mut state.active);
            }
            state.active.push(entry.clone());
        }

        refresh_mood(&mut state, now, true);
        tracing::debug!(
            "emotion generated: {} ({:.2}) — {}",
            emotion,
            intensity,
            cause
        );
        Some(entry)
    }

    /// React to a situation via the tendency table. The strongest
    /// tendency becomes the generated emotion.
    pub async fn feel(
        &self,
        situation: Situation,
        cause: &str,
        ctx: &EmotionContext,
    ) -> Option<ActiveEmotion> {
        let (emotion, base) = situation.strongest_tendency();
        self.insert_with_intensity(emotion, base, cause, ctx).await
    }

    /// Current mood, recomputed if stale.
    pub async fn mood(&self) -> Mood {
        let now = chrono::Utc::now().timestamp();
        let mut state = self.state.write().await;
        decay_in_place(&mut state.active, now);
        refresh_mood(&mut state, now, false);
        state.mood.clone()
    }

    /// Highest-intensity active emotion, if any survives decay.
    pub async fn dominant(&self) -> Option<ActiveEmotion> {
        let now = chrono::Utc::now().timestamp();
        let mut state = self.state.write().await;
        decay_in_place(&mut state.active, now);
        state
            .active
            .iter()
            .cloned()
            .max_by(|a, b| a.intensity.total_cmp(&b.intensity))
    }

    pub async fn active_emotions(&self) -> Vec<ActiveEmotion> {
        let now = chrono::Utc::now().timestamp();
        let mut state = self.state.write().await;
        decay_in_place(&mut state.active, now);
        state.active.clone()
    }

    /// Force the dominant reading to a specific emotion (the context
    /// cascade may override the flow of a conversation).
    pub async fn override_dominant(&self, emotion: Emotion, intensity: f32, cause: &str) {
        let ctx = EmotionContext::default();
        self.insert_with_intensity(emotion, intensity.clamp(0.0, 1.0).max(MIN_GENERATED), cause, &ctx)
            .await;
    }

    /// Snapshot for persistence.
    pub async fn snapshot(&self) -> EmotionalSnapshot {
        let now = chrono::Utc::now().timestamp();
        let mut state = self.state.write().await;
        decay_in_place(&mut state.active, now);
        refresh_mood(&mut state, now, true);
        let dominant = state
            .active
            .iter()
            .cloned()
            .max_by(|a, b| a.intensity.total_cmp(&b.intensity));
        EmotionalSnapshot {
            dominant,
            active_emotions: state.active.clone(),
            mood: state.mood.clone(),
            saved_at: now,
        }
    }

    /// Restore a snapshot, applying offline decay for the time spent
    /// shut down. Restores older than 24 h come back as faded echoes
    /// (intensity capped at 0.3). Restored intensities never exceed the
    /// saved ones.
    pub async fn restore(&self, snapshot: EmotionalSnapshot) {
        let now = chrono::Utc::now().timestamp();
        let mut active = snapshot.active_emotions;
        let faded = apply_offline_decay(&mut active, snapshot.saved_at, now);
        active.truncate(MAX_ACTIVE);

        let mut state = self.state.write().await;
        state.active = active;
        refresh_mood(&mut state, now, true);
        tracing::info!(
            "emotional state restored: {} emotions{}",
            state.active.len(),
            if faded { " (faded echoes)" } else { "" }
        );
    }
}

impl Default for AffectiveSystem {
    fn default() -> Self {
        Self::new()
    }
}

fn context_modifier(emotion: Emotion, ctx: &EmotionContext, mood_dominant: Emotion) -> f32 {
    let mut modifier = 1.0;
    if ctx.energy < 0.3 {
        modifier *= 0.7;
    } else if ctx.energy > 0.8 {
        modifier *= 1.2;
    }
    // Mood-congruent emotions reinforce each other.
    if emotion.valence() == mood_dominant.valence() && emotion.valence() != Valence::Neutral {
        modifier *= 1.3;
    }
    if ctx.relationship_quality > 0.7
        && matches!(emotion, Emotion::Affection | Emotion::Gratitude)
    {
        modifier *= 1.2;
    }
    modifier
}

/// Decay emotions for time spent offline and drop the dead ones.
/// Half-life is 4 hours; a snapshot older than 24 hours leaves only
/// faded echoes, capped at 0.3. Returns whether the echo cap applied.
/// Generation times are moved to `now` so in-session decay continues
/// from the restored intensity rather than double-decaying.
pub fn apply_offline_decay(active: &mut Vec<ActiveEmotion>, saved_at: i64, now: i64) -> bool {
    let offline_secs = (now - saved_at).max(0);
    let offline_hours = offline_secs as f32 / 3600.0;
    let factor = 0.5_f32.powf(offline_hours / 4.0);
    let faded = offline_secs > 24 * 3600;

    for a in active.iter_mut() {
        a.intensity *= factor;
        if faded {
            a.intensity = a.intensity.min(0.3);
        }
        a.generated_at = now;
    }
    active.retain(|a| a.intensity >= MIN_ALIVE);
    faded
}

fn decay_in_place(active: &mut Vec<ActiveEmotion>, now: i64) {
    for a in active.iter_mut() {
        let minutes = (now - a.generated_at).max(0) as f32 / 60.0;
        if minutes > 0.0 {
            let hl = half_life_minutes(a.emotion.valence());
            a.intensity *= 0.5_f32.powf(minutes / hl);
        }
    }
    active.retain(|a| a.intensity >= MIN_ALIVE);
}

fn evict_weakest_oldest(active: &mut Vec<ActiveEmotion>) {
    if let Some(idx) = active
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            a.intensity
                .total_cmp(&b.intensity)
                .then(a.generated_at.cmp(&b.generated_at))
        })
        .map(|(i, _)| i)
    {
        active.remove(idx);
    }
}

fn refresh_mood(state: &mut AffectState, now: i64, force: bool) {
    if !force && now - state.mood.as_of < MOOD_REFRESH_SECS {
        return;
    }
    if state.active.is_empty() {
        state.mood = Mood {
            dominant: Emotion::Peaceful,
            intensity: 0.2,
            as_of: now,
        };
        return;
    }
    let dominant = state
        .active
        .iter()
        .max_by(|a, b| a.intensity.total_cmp(&b.intensity))
        .map(|a| a.emotion)
        .unwrap_or_default();
    let total: f32 = state.active.iter().map(|a| a.intensity).sum();
    let weighted: f32 = state.active.iter().map(|a| a.intensity * a.intensity).sum();
    let intensity = if total > 0.0 { weighted / total } else { 0.0 };
    state.mood = Mood {
        dominant,
        intensity: intensity.clamp(0.0, 1.0),
        as_of: now,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_generate_emotion_basic() {
        let affect = AffectiveSystem::new();
        let ctx = EmotionContext::default();
        let e = affect
            .generate_emotion(Emotion::Joy, "test cause", &ctx)
            .await;
        assert!(e.is_some());
        let e = e.unwrap();
        assert_eq!(e.emotion, Emotion::Joy);
        assert!(e.intensity > 0.0 && e.intensity <= 1.0);
    }

    #[tokio::test]
    async fn test_low_energy_mutes_emotions() {
        let affect = AffectiveSystem::new();
        let low = EmotionContext {
            energy: 0.1,
            relationship_quality: 0.5,
        };
        let high = EmotionContext {
            energy: 0.9,
            relationship_quality: 0.5,
        };
        let muted = affect
            .generate_emotion(Emotion::Joy, "muted", &low)
            .await
            .unwrap();
        let affect2 = AffectiveSystem::new();
        let amplified = affect2
            .generate_emotion(Emotion::Joy, "amplified", &high)
            .await
            .unwrap();
        assert!(amplified.intensity > muted.intensity);
    }

    #[tokio::test]
    async fn test_tiny_intensity_discarded() {
        let affect = AffectiveSystem::new();
        let ctx = EmotionContext {
            energy: 0.1,
            relationship_quality: 0.5,
        };
        let result = affect
            .insert_with_intensity(Emotion::Doubt, 0.05, "barely", &ctx)
            .await;
        assert!(result.is_none());
        assert!(affect.active_emotions().await.is_empty());
    }

    #[tokio::test]
    async fn test_capacity_eviction() {
        let affect = AffectiveSystem::new();
        let ctx = EmotionContext::default();
        // Generate 12 distinct emotions; only 10 may remain.
        let emotions = [
            Emotion::Joy,
            Emotion::Sadness,
            Emotion::Anger,
            Emotion::Fear,
            Emotion::Surprise,
            Emotion::Curiosity,
            Emotion::Awe,
            Emotion::Pride,
            Emotion::Gratitude,
            Emotion::Anxiety,
            Emotion::Excitement,
            Emotion::Loneliness,
        ];
        for e in emotions {
            affect.generate_emotion(e, "fill", &ctx).await;
        }
        assert!(affect.active_emotions().await.len() <= MAX_ACTIVE);
    }

    #[tokio::test]
    async fn test_refeeling_merges_not_duplicates() {
        let affect = AffectiveSystem::new();
        let ctx = EmotionContext::default();
        affect.generate_emotion(Emotion::Joy, "one", &ctx).await;
        affect.generate_emotion(Emotion::Joy, "two", &ctx).await;
        let active = affect.active_emotions().await;
        assert_eq!(active.iter().filter(|a| a.emotion == Emotion::Joy).count(), 1);
    }

    #[tokio::test]
    async fn test_dominant_is_highest_intensity() {
        let affect = AffectiveSystem::new();
        let ctx = EmotionContext::default();
        affect
            .insert_with_intensity(Emotion::Contentment, 0.3, "mild", &ctx)
            .await;
        affect
            .insert_with_intensity(Emotion::Excitement, 0.9, "strong", &ctx)
            .await;
        let dom = affect.dominant().await.unwrap();
        assert_eq!(dom.emotion, Emotion::Excitement);
    }

    #[tokio::test]
    async fn test_snapshot_restore_zero_offline_preserves_dominant() {
        let affect = AffectiveSystem::new();
        let ctx = EmotionContext::default();
        affect
            .insert_with_intensity(Emotion::Curiosity, 0.8, "reading", &ctx)
            .await;
        let snap = affect.snapshot().await;

        let restored = AffectiveSystem::new();
        restored.restore(snap.clone()).await;
        let dom = restored.dominant().await.unwrap();
        assert_eq!(dom.emotion, snap.dominant.unwrap().emotion);
    }

    #[tokio::test]
    async fn test_restore_applies_offline_decay() {
        let affect = AffectiveSystem::new();
        let ctx = EmotionContext::default();
        affect
            .insert_with_intensity(Emotion::Joy, 0.9, "before shutdown", &ctx)
            .await;
        let mut snap = affect.snapshot().await;
        let before = snap.active_emotions[0].intensity;
        // Pretend we saved 4 hours ago: one half-life.
        snap.saved_at -= 4 * 3600;

        let restored = AffectiveSystem::new();
        restored.restore(snap).await;
        let active = restored.active_emotions().await;
        assert_eq!(active.len(), 1);
        assert!(active[0].intensity < before);
        assert!((active[0].intensity - before * 0.5).abs() < 0.05);
    }

    #[tokio::test]
    async fn test_restore_after_day_is_faded_echo() {
        let affect = AffectiveSystem::new();
        let ctx = EmotionContext {
            energy: 0.9,
            relationship_quality: 0.9,
        };
        affect
            .insert_with_intensity(Emotion::Excitement, 1.0, "huge news", &ctx)
            .await;
        let mut snap = affect.snapshot().await;
        // 25 hours offline, but pretend no decay to isolate the cap:
        // even then intensity must be <= 0.3.
        snap.saved_at -= 25 * 3600;
        for a in &mut snap.active_emotions {
            a.intensity = 1.0;
        }

        let restored = AffectiveSystem::new();
        restored.restore(snap).await;
        for a in restored.active_emotions().await {
            assert!(a.intensity <= 0.3, "faded echo exceeded cap: {}", a.intensity);
        }
    }

    #[tokio::test]
    async fn test_mood_defaults_when_empty() {
        let affect = AffectiveSystem::new();
        let mood = affect.mood().await;
        assert_eq!(mood.dominant, Emotion::Peaceful);
    }

    #[tokio::test]
    async fn test_feel_situation() {
        let affect = AffectiveSystem::new();
        let ctx = EmotionContext::default();
        let felt = affect
            .feel(Situation::DiscoveredInterestingFact, "found a paper", &ctx)
            .await
            .unwrap();
        assert_eq!(felt.emotion, Emotion::Curiosity);
    }
}
