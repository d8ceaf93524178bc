/// Request identity extractors
///
/// The gateway verifies credentials and forwards the account id in the
/// `x-user-id` header; this service never sees tokens.
use actix_web::{dev::Payload, FromRequest, HttpRequest};
use std::future::{ready, Ready};
use uuid::Uuid;

use crate::error::AppError;

pub const USER_ID_HEADER: &str = "x-user-id";

/// Authenticated caller; rejects the request with 401 when absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserId(pub Uuid);

/// Caller on read routes that also serve anonymous viewers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionalUserId(pub Option<Uuid>);

fn header_user_id(req: &HttpRequest) -> Result<Option<Uuid>, AppError> {
    let Some(header_value) = req.headers().get(USER_ID_HEADER) else {
        return Ok(None);
    };

    let value = header_value
        .to_str()
        .map_err(|_| AppError::Unauthorized("Invalid x-user-id header".into()))?;

    Uuid::parse_str(value.trim())
        .map(Some)
        .map_err(|_| AppError::Unauthorized("Invalid x-user-id header value".into()))
}

impl FromRequest for UserId {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(header_user_id(req).and_then(|id| {
            id.map(UserId)
                .ok_or_else(|| AppError::Unauthorized("Missing x-user-id header".into()))
        }))
    }
}

impl FromRequest for OptionalUserId {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(header_user_id(req).map(OptionalUserId))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn test_header_user_id() {
        let id = Uuid::new_v4();
        let req = TestRequest::default()
            .insert_header((USER_ID_HEADER, id.to_string()))
            .to_http_request();
        assert_eq!(header_user_id(&req).unwrap(), Some(id));

        let missing = TestRequest::default().to_http_request();
        assert_eq!(header_user_id(&missing).unwrap(), None);

        let garbage = TestRequest::default()
            .insert_header((USER_ID_HEADER, "not-a-uuid"))
            .to_http_request();
        assert!(matches!(
            header_user_id(&garbage),
            Err(AppError::Unauthorized(_))
        ));
    }
}
