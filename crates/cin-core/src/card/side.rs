//! Front/back classification of a card from its text.

use tracing::debug;

use super::rules::dates::find_date;
use super::rules::patterns::{back_anchors, front_anchors, is_mrz_line};
use crate::models::record::CardSide;
use crate::normalize::NormalizedText;

/// Confidence of a decision made without any anchor.
const HEURISTIC_CONFIDENCE: f32 = 0.3;

/// Anchor count at which the count factor saturates.
const SATURATION: f32 = 3.0;

/// Outcome of side classification.
#[derive(Debug, Clone, PartialEq)]
pub struct SideDecision {
    pub side: CardSide,
    /// Confidence (0.0 - 1.0).
    pub confidence: f32,
    pub front_anchors: usize,
    pub back_anchors: usize,
}

impl SideDecision {
    fn unknown() -> Self {
        Self {
            side: CardSide::Unknown,
            confidence: 0.0,
            front_anchors: 0,
            back_anchors: 0,
        }
    }
}

/// Classifies normalized text as the front or back of a card.
///
/// Each line counts towards at most one side; back anchors are checked
/// first so "Nom du père" is never taken for the front "Nom" label. When
/// both sides have anchors the one whose first anchor comes earlier in
/// reading order wins.
#[derive(Debug, Clone, Default)]
pub struct SideClassifier;

impl SideClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, text: &NormalizedText) -> SideDecision {
        let mut front = 0usize;
        let mut back = 0usize;
        let mut first_front: Option<(usize, usize)> = None;
        let mut first_back: Option<(usize, usize)> = None;

        for line in text.lines() {
            if is_mrz_line(&line.text) {
                back += 1;
                first_back.get_or_insert((line.index, 0));
                continue;
            }

            let back_hits: Vec<usize> = back_anchors()
                .iter()
                .filter_map(|r| r.find(&line.text).map(|m| m.start()))
                .collect();
            if let Some(offset) = back_hits.iter().min() {
                back += back_hits.len();
                first_back.get_or_insert((line.index, *offset));
                continue;
            }

            let front_hits: Vec<usize> = front_anchors()
                .iter()
                .filter_map(|r| r.find(&line.text).map(|m| m.start()))
                .collect();
            if let Some(offset) = front_hits.iter().min() {
                front += front_hits.len();
                first_front.get_or_insert((line.index, *offset));
            }
        }

        let decision = match (first_front, first_back) {
            (None, None) => self.without_anchors(text),
            (Some(_), None) => decided(CardSide::Front, front, back),
            (None, Some(_)) => decided(CardSide::Back, back, front),
            (Some(f), Some(b)) if f <= b => decided(CardSide::Front, front, back),
            (Some(_), Some(_)) => decided(CardSide::Back, back, front),
        };

        debug!(
            "Side {} ({:.2}): {} front / {} back anchors",
            decision.side, decision.confidence, front, back
        );

        SideDecision {
            front_anchors: front,
            back_anchors: back,
            ..decision
        }
    }

    /// Field patterns stand in for anchors: a date suggests the front, an
    /// MRZ the back.
    fn without_anchors(&self, text: &NormalizedText) -> SideDecision {
        let has_date = text.lines().iter().any(|l| find_date(&l.text).is_some());
        let has_mrz = text.lines().iter().any(|l| is_mrz_line(&l.text));

        let side = match (has_date, has_mrz) {
            (true, false) => CardSide::Front,
            (false, true) => CardSide::Back,
            _ => return SideDecision::unknown(),
        };
        SideDecision {
            side,
            confidence: HEURISTIC_CONFIDENCE,
            ..SideDecision::unknown()
        }
    }
}

/// Share of anchors won, scaled by how many anchors the winner has.
fn decided(side: CardSide, winner: usize, loser: usize) -> SideDecision {
    let share = winner as f32 / (winner + loser) as f32;
    let factor = 0.5 + 0.5 * (winner as f32 / SATURATION).min(1.0);
    SideDecision {
        side,
        confidence: (share * factor).clamp(0.0, 1.0),
        ..SideDecision::unknown()
    }
}
