use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::{
    error::AppError,
    state::room::{ParticipantKind, ParticipantRef, Profile},
};

const ID_HEADER: &str = "x-participant-id";
const KIND_HEADER: &str = "x-participant-kind";
const NAME_HEADER: &str = "x-participant-name";
const ORG_HEADER: &str = "x-participant-org";
const IMG_HEADER: &str = "x-participant-img";
const COUNTRY_HEADER: &str = "x-participant-country";

/// Caller identity resolved by the upstream auth gateway and forwarded as
/// request headers.
#[derive(Debug, Clone)]
pub struct Identity {
    pub who: ParticipantRef,
    pub profile: Profile,
}

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = required_header(parts, ID_HEADER)?;
        let id = Uuid::parse_str(&id)
            .map_err(|_| AppError::BadRequest(format!("`{ID_HEADER}` is not a UUID")))?;

        let kind = match required_header(parts, KIND_HEADER)?.as_str() {
            "std" => ParticipantKind::Student,
            "class" => ParticipantKind::Class,
            other => {
                return Err(AppError::BadRequest(format!(
                    "`{KIND_HEADER}` must be `std` or `class`, got `{other}`"
                )));
            }
        };

        let name = required_header(parts, NAME_HEADER)?;

        Ok(Identity {
            who: ParticipantRef { id, kind },
            profile: Profile {
                name,
                org_name: optional_header(parts, ORG_HEADER),
                img_url: optional_header(parts, IMG_HEADER),
                country: optional_header(parts, COUNTRY_HEADER),
            },
        })
    }
}

fn required_header(parts: &Parts, name: &'static str) -> Result<String, AppError> {
    optional_header(parts, name)
        .ok_or_else(|| AppError::BadRequest(format!("missing `{name}` header")))
}

fn optional_header(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}
