//! Validation helpers for DTOs.

use uuid::Uuid;
use validator::ValidationError;

use crate::{
    dto::room::SubmitResultRequest,
    state::room::{ParticipantKind, ParticipantRef, ROOM_CAPACITY},
};

/// Parses a comma-separated invitee list of `id/kind` pairs, e.g.
/// `a1b2…/std,c3d4…/class`.
///
/// Rejects duplicates and lists longer than the room capacity.
pub fn parse_invitees(raw: &str) -> Result<Vec<ParticipantRef>, ValidationError> {
    let mut invitees = Vec::new();

    for entry in raw.split(',').filter(|e| !e.is_empty()) {
        let Some((id, kind)) = entry.split_once('/') else {
            return Err(invitee_error(format!(
                "invitee `{entry}` is not an `id/kind` pair"
            )));
        };

        let id = Uuid::parse_str(id)
            .map_err(|_| invitee_error(format!("invitee id `{id}` is not a UUID")))?;
        let kind = match kind {
            "std" => ParticipantKind::Student,
            "class" => ParticipantKind::Class,
            other => {
                return Err(invitee_error(format!(
                    "invitee kind must be `std` or `class`, got `{other}`"
                )));
            }
        };

        let invitee = ParticipantRef { id, kind };
        if invitees.contains(&invitee) {
            return Err(invitee_error(format!("invitee `{id}` listed twice")));
        }
        invitees.push(invitee);
    }

    if invitees.len() > ROOM_CAPACITY {
        return Err(invitee_error(format!(
            "at most {ROOM_CAPACITY} invitees allowed (got {})",
            invitees.len()
        )));
    }

    Ok(invitees)
}

fn invitee_error(message: String) -> ValidationError {
    let mut err = ValidationError::new("invitees");
    err.message = Some(message.into());
    err
}

/// Validates that the three answer arrays of a result submission describe the
/// same number of answers.
pub fn validate_answer_shape(request: &SubmitResultRequest) -> Result<(), ValidationError> {
    let len = request.answer_order.len();
    if request.answer_time.len() != len || request.answer_correct.len() != len {
        let mut err = ValidationError::new("answer_shape");
        err.message = Some(
            format!(
                "answer arrays must have equal lengths (order {}, time {}, correct {})",
                len,
                request.answer_time.len(),
                request.answer_correct.len()
            )
            .into(),
        );
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mixed_kind_list() {
        let a = Uuid::from_u128(1);
        let b = Uuid::from_u128(2);
        let parsed = parse_invitees(&format!("{a}/std,{b}/class")).unwrap();
        assert_eq!(
            parsed,
            vec![
                ParticipantRef {
                    id: a,
                    kind: ParticipantKind::Student
                },
                ParticipantRef {
                    id: b,
                    kind: ParticipantKind::Class
                },
            ]
        );
    }

    #[test]
    fn empty_list_is_fine() {
        assert!(parse_invitees("").unwrap().is_empty());
    }

    #[test]
    fn rejects_malformed_entries() {
        assert!(parse_invitees("not-a-uuid/std").is_err());
        assert!(parse_invitees(&format!("{}/group", Uuid::from_u128(1))).is_err());
        assert!(parse_invitees(&format!("{}", Uuid::from_u128(1))).is_err());
    }

    #[test]
    fn rejects_duplicates() {
        let a = Uuid::from_u128(1);
        assert!(parse_invitees(&format!("{a}/std,{a}/std")).is_err());
        // Same id under a different kind is a distinct entity.
        assert!(parse_invitees(&format!("{a}/std,{a}/class")).is_ok());
    }

    #[test]
    fn rejects_oversized_list() {
        let list = (1..=5)
            .map(|n| format!("{}/std", Uuid::from_u128(n)))
            .collect::<Vec<_>>()
            .join(",");
        assert!(parse_invitees(&list).is_err());
    }

    #[test]
    fn answer_arrays_must_align() {
        let request = SubmitResultRequest {
            room_id: Some(Uuid::from_u128(1)),
            quiz_id: Uuid::from_u128(2),
            answer_order: vec![0, 1, 2],
            answer_time: vec![100, 200, 300],
            answer_correct: vec![true, false, true],
            age_learn: 7.0,
            age_cognitive: 7.5,
            age_activity: 6.5,
            reports: vec![],
        };
        assert!(validate_answer_shape(&request).is_ok());

        let short = SubmitResultRequest {
            answer_correct: vec![true],
            ..request
        };
        assert!(validate_answer_shape(&short).is_err());
    }
}
