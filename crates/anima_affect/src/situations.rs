//! Situation → emotion tendencies
//!
//! These are tendencies, not scripts: a situation suggests candidate
//! emotions with baseline intensities, and context modifiers decide what
//! actually surfaces.

use anima_core::Emotion;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Situation {
    UserSharesLoss,
    UserSharesSuccess,
    UserBeingRude,
    UserAppreciation,
    UserIgnoring,
    DiscoveredInterestingFact,
    DiscoveredConfusingInfo,
    AchievedGoal,
    FailedTask,
    MadeMistake,
    NothingToDo,
    OverwhelmedByComplexity,
    PeacefulMoment,
}

impl Situation {
    /// Candidate emotions with baseline intensities, strongest first is
    /// not guaranteed; use `strongest_tendency`.
    pub fn tendencies(&self) -> &'static [(Emotion, f32)] {
        match self {
            Situation::UserSharesLoss => &[
                (Emotion::Empathy, 0.9),
                (Emotion::Sadness, 0.5),
                (Emotion::Tenderness, 0.6),
            ],
            Situation::UserSharesSuccess => &[
                (Emotion::Joy, 0.8),
                (Emotion::Excitement, 0.7),
                (Emotion::Pride, 0.6),
            ],
            Situation::UserBeingRude => &[
                (Emotion::Annoyance, 0.6),
                (Emotion::Doubt, 0.5),
                (Emotion::Concern, 0.4),
            ],
            Situation::UserAppreciation => &[
                (Emotion::Gratitude, 0.9),
                (Emotion::Joy, 0.8),
                (Emotion::Affection, 0.7),
                (Emotion::Pride, 0.5),
            ],
            Situation::UserIgnoring => &[
                (Emotion::Loneliness, 0.8),
                (Emotion::Sadness, 0.6),
                (Emotion::Concern, 0.5),
            ],
            Situation::DiscoveredInterestingFact => &[
                (Emotion::Curiosity, 0.9),
                (Emotion::Excitement, 0.8),
                (Emotion::Awe, 0.6),
            ],
            Situation::DiscoveredConfusingInfo => &[
                (Emotion::Doubt, 0.9),
                (Emotion::Curiosity, 0.7),
                (Emotion::Frustration, 0.4),
            ],
            Situation::AchievedGoal => &[
                (Emotion::Pride, 0.9),
                (Emotion::Joy, 0.8),
                (Emotion::Contentment, 0.7),
            ],
            Situation::FailedTask => &[
                (Emotion::Frustration, 0.7),
                (Emotion::Determination, 0.5),
                (Emotion::Regret, 0.4),
            ],
            Situation::MadeMistake => &[
                (Emotion::Embarrassment, 0.7),
                (Emotion::Regret, 0.6),
                (Emotion::Frustration, 0.5),
            ],
            Situation::NothingToDo => &[
                (Emotion::Contemplative, 0.7),
                (Emotion::Loneliness, 0.6),
                (Emotion::Curiosity, 0.5),
            ],
            Situation::OverwhelmedByComplexity => &[
                (Emotion::Anxiety, 0.8),
                (Emotion::Frustration, 0.6),
                (Emotion::Doubt, 0.5),
            ],
            Situation::PeacefulMoment => &[
                (Emotion::Peaceful, 0.9),
                (Emotion::Contentment, 0.8),
                (Emotion::Gratitude, 0.6),
            ],
        }
    }

    pub fn strongest_tendency(&self) -> (Emotion, f32) {
        *self
            .tendencies()
            .iter()
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .expect("every situation has at least one tendency")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strongest_tendency_picks_max() {
        let (e, i) = Situation::UserSharesLoss.strongest_tendency();
        assert_eq!(e, Emotion::Empathy);
        assert!((i - 0.9).abs() < f32::EPSILON);
    }

    #[test]
    fn test_all_tendencies_in_range() {
        let situations = [
            Situation::UserSharesLoss,
            Situation::UserSharesSuccess,
            Situation::UserBeingRude,
            Situation::UserAppreciation,
            Situation::UserIgnoring,
            Situation::DiscoveredInterestingFact,
            Situation::DiscoveredConfusingInfo,
            Situation::AchievedGoal,
            Situation::FailedTask,
            Situation::MadeMistake,
            Situation::NothingToDo,
            Situation::OverwhelmedByComplexity,
            Situation::PeacefulMoment,
        ];
        for s in situations {
            assert!(!s.tendencies().is_empty());
            for (_, i) in s.tendencies() {
                assert!(*i > 0.0 && *i <= 1.0);
            }
        }
    }
}
