use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

use crate::state::room::ParticipantRef;

/// Soft-state record of an abrupt disconnect pending grace-period resolution.
///
/// At most one live marker exists per participant; writes go through an
/// upsert keyed on the (id, kind) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisconnectMarker {
    /// Stable identifier of the marker row.
    pub id: Uuid,
    /// Participant whose socket closed unexpectedly.
    pub who: ParticipantRef,
    /// Room the participant was attending.
    pub room_id: Uuid,
    /// Instant the socket closed.
    pub disconnected_at: SystemTime,
}

/// One participant's submission for one round. Immutable once written except
/// for the rank assigned when the round completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundResult {
    /// Stable identifier of the result row.
    pub id: Uuid,
    /// Submitting participant.
    pub who: ParticipantRef,
    /// Quiz that was played.
    pub quiz_id: Uuid,
    /// Room the round ran in; `None` for solo rounds.
    pub room_id: Option<Uuid>,
    /// Round counter value at submission time; `None` for solo rounds.
    pub round: Option<u32>,
    /// Question positions in the order they were served.
    pub answer_order: Vec<u32>,
    /// Milliseconds spent per answer.
    pub answer_time: Vec<u32>,
    /// Correctness flag per answer.
    pub answer_correct: Vec<bool>,
    /// Derived learning-ability age.
    pub age_learn: f64,
    /// Derived cognitive-ability age.
    pub age_cognitive: f64,
    /// Derived activity-ability age.
    pub age_activity: f64,
    /// Final rank within the round, written once on completion.
    pub rank: Option<u32>,
    /// Submission timestamp.
    pub recorded_at: SystemTime,
}

impl RoundResult {
    /// Number of correct answers.
    pub fn correct_count(&self) -> usize {
        self.answer_correct.iter().filter(|c| **c).count()
    }

    /// Number of attempted answers.
    pub fn attempt_count(&self) -> usize {
        self.answer_correct.len()
    }
}

/// Cumulative head-to-head record between two participants.
///
/// The from/to orientation is arbitrary, assigned at first creation.
/// Consumers must go through [`PairwiseRecord::tally_for`] instead of
/// reading `win` directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairwiseRecord {
    /// Stable identifier of the record row.
    pub id: Uuid,
    /// One side of the pair (whoever created the record first).
    pub from: ParticipantRef,
    /// The other side of the pair.
    pub to: ParticipantRef,
    /// Wins credited to the `from` side.
    pub win: u32,
    /// Total rounds played against each other.
    pub all: u32,
    /// Room of the last round folded into this record.
    pub last_room_id: Uuid,
    /// Round counter of the last round folded into this record.
    pub last_round: u32,
}

/// Win/total tally normalized to one viewer's perspective.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct VsTally {
    /// Wins of the viewer against the counterpart.
    pub win: u32,
    /// Total rounds played between the two.
    pub all: u32,
}

impl PairwiseRecord {
    /// Whether this record covers the unordered pair (a, b).
    pub fn pairs(&self, a: ParticipantRef, b: ParticipantRef) -> bool {
        (self.from == a && self.to == b) || (self.from == b && self.to == a)
    }

    /// Whether the given round was already folded into this record.
    pub fn stamped_with(&self, room_id: Uuid, round: u32) -> bool {
        self.last_room_id == room_id && self.last_round == round
    }

    /// Tally relative to `viewer`. A viewer that is neither side sees zeros.
    pub fn tally_for(&self, viewer: ParticipantRef) -> VsTally {
        if self.from == viewer {
            VsTally {
                win: self.win,
                all: self.all,
            }
        } else if self.to == viewer {
            VsTally {
                win: self.all - self.win,
                all: self.all,
            }
        } else {
            VsTally::default()
        }
    }
}

/// Per-question counter increments folded into a quiz's aggregate stats.
///
/// Ages are accumulated as sums next to a submission count so every field is
/// a commutative increment; averages are derived at read time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuizStatDelta {
    /// (question position, attempts, correct answers) triples; positions with
    /// no attempts are omitted.
    pub questions: Vec<QuestionDelta>,
    /// Learning-age contribution of this submission.
    pub age_learn: f64,
    /// Cognitive-age contribution of this submission.
    pub age_cognitive: f64,
    /// Activity-age contribution of this submission.
    pub age_activity: f64,
}

/// Increment for one question position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuestionDelta {
    /// Zero-based question position.
    pub pos: u32,
    /// Times the question was served.
    pub tries: u32,
    /// Times it was answered correctly.
    pub correct: u32,
}

/// A submitted error report against one question of a quiz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizReport {
    /// Stable identifier of the report row.
    pub id: Uuid,
    /// Reporting participant.
    pub who: ParticipantRef,
    /// Quiz being reported.
    pub quiz_id: Uuid,
    /// Room context, when reported from a room round.
    pub room_id: Option<Uuid>,
    /// Round context, when reported from a room round.
    pub round: Option<u32>,
    /// One-based question position.
    pub pos: u32,
    /// Free-form report content.
    pub content: String,
    /// Submission timestamp.
    pub created_at: SystemTime,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::room::ParticipantKind;

    fn participant(n: u128) -> ParticipantRef {
        ParticipantRef {
            id: Uuid::from_u128(n),
            kind: ParticipantKind::Student,
        }
    }

    fn record(win: u32, all: u32) -> PairwiseRecord {
        PairwiseRecord {
            id: Uuid::from_u128(1),
            from: participant(10),
            to: participant(20),
            win,
            all,
            last_room_id: Uuid::from_u128(99),
            last_round: 3,
        }
    }

    #[test]
    fn tally_is_normalized_to_the_viewer() {
        let r = record(4, 7);
        assert_eq!(r.tally_for(participant(10)), VsTally { win: 4, all: 7 });
        assert_eq!(r.tally_for(participant(20)), VsTally { win: 3, all: 7 });
        assert_eq!(r.tally_for(participant(30)), VsTally::default());
    }

    #[test]
    fn pairs_ignores_orientation() {
        let r = record(0, 0);
        assert!(r.pairs(participant(10), participant(20)));
        assert!(r.pairs(participant(20), participant(10)));
        assert!(!r.pairs(participant(10), participant(30)));
    }

    #[test]
    fn stamp_matches_room_and_round_together() {
        let r = record(1, 1);
        assert!(r.stamped_with(Uuid::from_u128(99), 3));
        assert!(!r.stamped_with(Uuid::from_u128(99), 2));
        assert!(!r.stamped_with(Uuid::from_u128(98), 3));
    }
}
