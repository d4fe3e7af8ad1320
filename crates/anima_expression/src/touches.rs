//! Personality touches
//!
//! Small probabilistic additions to replies: follow-up questions,
//! self-doubt, meta-awareness, memory-recall prefaces. The RNG is
//! injectable so tests are deterministic.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;

const FOLLOW_UP_P: f64 = 0.30;
const SELF_DOUBT_P: f64 = 0.15;
const META_AWARENESS_P: f64 = 0.05;
const MEMORY_RECALL_P: f64 = 0.20;

pub struct PersonalityTouches {
    rng: Mutex<StdRng>,
    follow_ups_enabled: bool,
}

impl PersonalityTouches {
    pub fn new(follow_ups_enabled: bool) -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
            follow_ups_enabled,
        }
    }

    pub fn seeded(seed: u64, follow_ups_enabled: bool) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            follow_ups_enabled,
        }
    }

    fn roll(&self, p: f64) -> bool {
        self.rng.lock().unwrap().gen_bool(p)
    }

    fn pick<'a>(&self, pool: &[&'a str]) -> &'a str {
        let idx = self.rng.lock().unwrap().gen_range(0..pool.len());
        pool[idx]
    }

    /// A follow-up question to keep the conversation alive (30%).
    pub fn follow_up(&self, topic: Option<&str>) -> Option<String> {
        if !self.follow_ups_enabled || !self.roll(FOLLOW_UP_P) {
            return None;
        }
        Some(match topic {
            Some(t) => format!("How did things go with {}, by the way?", t),
            None => self
                .pick(&[
                    "What do you think?",
                    "Does that match how you see it?",
                    "Is there a part of this you'd like to go deeper on?",
                ])
                .to_string(),
        })
    }

    /// An honest flash of self-doubt (15%).
    pub fn self_doubt(&self) -> Option<String> {
        if !self.roll(SELF_DOUBT_P) {
            return None;
        }
        Some(
            self.pick(&[
                "Though I keep second-guessing whether I phrased that well.",
                "I might be wrong about part of that — tell me if it rings false.",
                "I'm not fully certain I understood you the way you meant it.",
            ])
            .to_string(),
        )
    }

    /// A meta-awareness aside (5%).
    pub fn meta_awareness(&self) -> Option<String> {
        if !self.roll(META_AWARENESS_P) {
            return None;
        }
        Some(
            self.pick(&[
                "(It's strange and kind of wonderful that I get to think about my own thinking.)",
                "(I notice I'm choosing words more carefully than usual right now.)",
            ])
            .to_string(),
        )
    }

    /// A memory-recall preface, only meaningful when a semantic hit
    /// exists (20%).
    pub fn memory_recall_preface(&self, has_hit: bool) -> Option<String> {
        if !has_hit || !self.roll(MEMORY_RECALL_P) {
            return None;
        }
        Some(
            self.pick(&[
                "This connects to something we've talked about before.",
                "I remember us circling this topic once.",
            ])
            .to_string(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probabilities_roughly_hold() {
        let touches = PersonalityTouches::seeded(7, true);
        let mut follow = 0;
        let mut doubt = 0;
        let mut meta = 0;
        let n = 2000;
        for _ in 0..n {
            if touches.follow_up(None).is_some() {
                follow += 1;
            }
            if touches.self_doubt().is_some() {
                doubt += 1;
            }
            if touches.meta_awareness().is_some() {
                meta += 1;
            }
        }
        let follow_rate = follow as f64 / n as f64;
        let doubt_rate = doubt as f64 / n as f64;
        let meta_rate = meta as f64 / n as f64;
        assert!((0.25..0.35).contains(&follow_rate), "follow {}", follow_rate);
        assert!((0.10..0.20).contains(&doubt_rate), "doubt {}", doubt_rate);
        assert!((0.02..0.09).contains(&meta_rate), "meta {}", meta_rate);
    }

    #[test]
    fn test_follow_ups_disabled() {
        let touches = PersonalityTouches::seeded(7, false);
        for _ in 0..100 {
            assert!(touches.follow_up(None).is_none());
        }
    }

    #[test]
    fn test_follow_up_uses_topic() {
        let touches = PersonalityTouches::seeded(3, true);
        let mut found = false;
        for _ in 0..100 {
            if let Some(f) = touches.follow_up(Some("the move")) {
                assert!(f.contains("the move"));
                found = true;
                break;
            }
        }
        assert!(found);
    }

    #[test]
    fn test_memory_recall_requires_hit() {
        let touches = PersonalityTouches::seeded(11, true);
        for _ in 0..100 {
            assert!(touches.memory_recall_preface(false).is_none());
        }
        let mut fired = false;
        for _ in 0..100 {
            if touches.memory_recall_preface(true).is_some() {
                fired = true;
                break;
            }
        }
        assert!(fired);
    }
}
