use std::str::FromStr;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Extension;
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::Authorization;
use axum_extra::TypedHeader;
use log::{debug, error, warn};
use tap::TapFallible;
use uuid::Uuid;

use types::domain::User;

use crate::routes::Api;

#[derive(Debug)]
pub enum AuthRejection {
    MissingToken,
    MalformedToken,
    UnknownToken,
    Unavailable,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let (status, reason) = match self {
            AuthRejection::MissingToken => (StatusCode::UNAUTHORIZED, "Missing bearer token"),
            AuthRejection::MalformedToken => (StatusCode::UNAUTHORIZED, "Malformed bearer token"),
            AuthRejection::UnknownToken => (StatusCode::UNAUTHORIZED, "Unknown session token"),
            AuthRejection::Unavailable => (StatusCode::INTERNAL_SERVER_ERROR, ""),
        };
        (status, reason).into_response()
    }
}

#[derive(Debug, Clone)]
pub struct Authenticated(pub User);

impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(req: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(req, state)
                .await
                .tap_err(|e| debug!("No Authorization header: {}", e))
                .map_err(|_| AuthRejection::MissingToken)?;
        let token = Uuid::from_str(bearer.token())
            .tap_err(|e| warn!("Failed to parse session token: {}", e))
            .map_err(|_| AuthRejection::MalformedToken)?;

        let Extension(api) = Extension::<Api>::from_request_parts(req, state)
            .await
            .tap_err(|e| error!("Api extension missing: {}", e))
            .map_err(|_| AuthRejection::Unavailable)?;

        match api.get_user_by_session_token(token).await {
            Ok(Some(auth_user)) => Ok(Authenticated(auth_user.to_user())),
            Ok(None) => {
                warn!("Unknown session token");
                Err(AuthRejection::UnknownToken)
            }
            Err(e) => {
                error!("Session lookup failed: {:?}", e);
                Err(AuthRejection::Unavailable)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(AuthRejection::MissingToken, StatusCode::UNAUTHORIZED)]
    #[case(AuthRejection::MalformedToken, StatusCode::UNAUTHORIZED)]
    #[case(AuthRejection::UnknownToken, StatusCode::UNAUTHORIZED)]
    #[case(AuthRejection::Unavailable, StatusCode::INTERNAL_SERVER_ERROR)]
    fn test_rejection_status(#[case] rejection: AuthRejection, #[case] status: StatusCode) {
        assert_eq!(rejection.into_response().status(), status);
    }

    #[tokio::test]
    async fn test_rejection_body_names_the_problem() {
        let response = AuthRejection::UnknownToken.into_response();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"Unknown session token");
    }
}
