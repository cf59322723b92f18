//! Two-pass reduction of a detection batch to at most one door state.

use crate::interface::{RawDetection, Verdict};
use crate::prelude::{ClassifierConfig, TieBreak};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Polarity {
    Open,
    Closed,
}

impl From<Polarity> for Verdict {
    fn from(polarity: Polarity) -> Self {
        match polarity {
            Polarity::Open => Verdict::Open,
            Polarity::Closed => Verdict::Closed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DetectionClassifier {
    open_keywords: Vec<String>,
    closed_keywords: Vec<String>,
    door_keyword: String,
    door_confidence: f32,
    tie_break: TieBreak,
}

impl Default for DetectionClassifier {
    fn default() -> Self {
        Self::new(&ClassifierConfig::default())
    }
}

impl DetectionClassifier {
    pub fn new(config: &ClassifierConfig) -> Self {
        let lower = |words: &[String]| -> Vec<String> {
            words.iter().map(|w| w.to_lowercase()).collect()
        };
        Self {
            open_keywords: lower(&config.open_keywords),
            closed_keywords: lower(&config.closed_keywords),
            door_keyword: config.door_keyword.to_lowercase(),
            door_confidence: config.door_confidence,
            tie_break: config.tie_break,
        }
    }

    pub fn tie_break(&self) -> TieBreak {
        self.tie_break
    }

    pub fn classify(&self, detections: &[RawDetection]) -> Verdict {
        let polar: Vec<(Polarity, f32)> = detections
            .iter()
            .filter_map(|det| {
                self.polarity_of(&det.label.to_lowercase())
                    .map(|polarity| (polarity, det.confidence))
            })
            .collect();

        if let Some(polarity) = self.settle(&polar) {
            return polarity.into();
        }

        let confident_door = detections.iter().any(|det| {
            det.confidence > self.door_confidence
                && det.label.to_lowercase().contains(&self.door_keyword)
        });
        if confident_door {
            Verdict::Open
        } else {
            Verdict::NoChange
        }
    }

    fn polarity_of(&self, label: &str) -> Option<Polarity> {
        let matches = |words: &[String]| words.iter().any(|w| !w.is_empty() && label.contains(w));
        if matches(&self.open_keywords) {
            Some(Polarity::Open)
        } else if matches(&self.closed_keywords) {
            Some(Polarity::Closed)
        } else {
            None
        }
    }

    fn settle(&self, polar: &[(Polarity, f32)]) -> Option<Polarity> {
        match self.tie_break {
            TieBreak::OpenPriority => {
                if polar.iter().any(|(p, _)| *p == Polarity::Open) {
                    Some(Polarity::Open)
                } else if polar.iter().any(|(p, _)| *p == Polarity::Closed) {
                    Some(Polarity::Closed)
                } else {
                    None
                }
            }
            TieBreak::FirstMatch => polar.first().map(|(p, _)| *p),
            TieBreak::HighestConfidence => polar
                .iter()
                .fold(None::<(Polarity, f32)>, |best, &(p, c)| match best {
                    Some((_, best_c)) if c <= best_c => best,
                    _ => Some((p, c)),
                })
                .map(|(p, _)| p),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dets(items: &[(&str, f32)]) -> Vec<RawDetection> {
        items
            .iter()
            .map(|(label, confidence)| RawDetection::new(*label, *confidence))
            .collect()
    }

    fn with_tie_break(tie_break: TieBreak) -> DetectionClassifier {
        DetectionClassifier::new(&ClassifierConfig {
            tie_break,
            ..Default::default()
        })
    }

    #[test]
    fn open_label_wins_regardless_of_order() {
        let classifier = DetectionClassifier::default();
        let batches = [
            dets(&[("Door_OPEN", 0.2)]),
            dets(&[("cat", 0.9), ("opened", 0.1)]),
            dets(&[("closed", 0.99), ("person", 0.5), ("open", 0.3)]),
            dets(&[("open", 0.3), ("shut", 0.99)]),
        ];
        for batch in &batches {
            assert_eq!(classifier.classify(batch), Verdict::Open, "{:?}", batch);
        }
    }

    #[test]
    fn closed_or_shut_without_open_is_closed() {
        let classifier = DetectionClassifier::default();
        assert_eq!(classifier.classify(&dets(&[("Closed", 0.1)])), Verdict::Closed);
        assert_eq!(
            classifier.classify(&dets(&[("person", 0.9), ("door-shut", 0.4)])),
            Verdict::Closed
        );
        assert_eq!(
            classifier.classify(&dets(&[("door", 0.95), ("closed", 0.2)])),
            Verdict::Closed
        );
    }

    #[test]
    fn empty_or_unrelated_is_no_change() {
        let classifier = DetectionClassifier::default();
        assert_eq!(classifier.classify(&[]), Verdict::NoChange);
        assert_eq!(classifier.classify(&dets(&[("cat", 0.9)])), Verdict::NoChange);
    }

    #[test]
    fn confident_door_falls_back_to_open() {
        let classifier = DetectionClassifier::default();
        assert_eq!(classifier.classify(&dets(&[("door", 0.75)])), Verdict::Open);
        assert_eq!(classifier.classify(&dets(&[("door", 0.5)])), Verdict::NoChange);
        assert_eq!(classifier.classify(&dets(&[("door", 0.7)])), Verdict::NoChange);
        assert_eq!(
            classifier.classify(&dets(&[("front DOOR", 0.71)])),
            Verdict::Open
        );
    }

    #[test]
    fn first_match_follows_iteration_order() {
        let classifier = with_tie_break(TieBreak::FirstMatch);
        assert_eq!(
            classifier.classify(&dets(&[("closed", 0.1), ("open", 0.9)])),
            Verdict::Closed
        );
        assert_eq!(
            classifier.classify(&dets(&[("cat", 0.9), ("open", 0.1), ("closed", 0.9)])),
            Verdict::Open
        );
    }

    #[test]
    fn highest_confidence_settles_conflicts() {
        let classifier = with_tie_break(TieBreak::HighestConfidence);
        assert_eq!(
            classifier.classify(&dets(&[("open", 0.4), ("closed", 0.8)])),
            Verdict::Closed
        );
        assert_eq!(
            classifier.classify(&dets(&[("shut", 0.6), ("opened", 0.6)])),
            Verdict::Closed
        );
        assert_eq!(
            classifier.classify(&dets(&[("door", 0.99), ("open", 0.1)])),
            Verdict::Open
        );
    }

    #[test]
    fn custom_keywords_are_case_insensitive() {
        let classifier = DetectionClassifier::new(&ClassifierConfig {
            open_keywords: vec!["AJAR".into()],
            closed_keywords: vec!["Latched".into()],
            door_keyword: "Gate".into(),
            ..Default::default()
        });
        assert_eq!(classifier.classify(&dets(&[("ajar", 0.1)])), Verdict::Open);
        assert_eq!(classifier.classify(&dets(&[("LATCHED", 0.1)])), Verdict::Closed);
        assert_eq!(classifier.classify(&dets(&[("open", 0.9)])), Verdict::NoChange);
        assert_eq!(classifier.classify(&dets(&[("gate", 0.9)])), Verdict::Open);
    }
}
