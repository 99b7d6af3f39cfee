/// Request extractors
///
/// [`ValidatedJson`] parses a JSON body and runs its `validator` rules before the
/// handler sees it. Malformed JSON is a 400 and rule failures are a 422, both in
/// the standard error envelope.

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};
use serde::{de::DeserializeOwned, Deserialize, Deserializer};
use validator::{Validate, ValidationError};

use crate::error::ApiError;

/// JSON body that passed validation
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection: JsonRejection| ApiError::BadRequest(rejection.body_text()))?;

        value.validate()?;
        Ok(Self(value))
    }
}

/// Rejects values containing uppercase characters
pub fn lowercase(value: &str) -> Result<(), ValidationError> {
    if value.chars().any(char::is_uppercase) {
        let mut err = ValidationError::new("lowercase");
        err.message = Some("Username must be in lower case".into());
        return Err(err);
    }
    Ok(())
}

/// Rejects strings that are empty once trimmed
pub fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("This field is required".into());
        return Err(err);
    }
    Ok(())
}

/// Keeps an explicit `null` apart from an absent field
///
/// Use with `#[serde(default, deserialize_with = "nullable")]` on an
/// `Option<Option<T>>`: absent gives `None`, `null` gives `Some(None)`.
pub fn nullable<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http, http::StatusCode, response::IntoResponse};

    #[derive(Debug, Deserialize, Validate)]
    struct Sample {
        #[validate(length(min = 3, message = "Too short"))]
        name: String,
    }

    fn request(body: &'static str) -> Request {
        http::Request::builder()
            .method("POST")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_valid_body() {
        let ValidatedJson(sample) =
            ValidatedJson::<Sample>::from_request(request(r#"{"name":"abc"}"#), &())
                .await
                .unwrap();
        assert_eq!(sample.name, "abc");
    }

    #[tokio::test]
    async fn test_rule_failure_is_422() {
        let err = ValidatedJson::<Sample>::from_request(request(r#"{"name":"ab"}"#), &())
            .await
            .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_malformed_body_is_400() {
        let err = ValidatedJson::<Sample>::from_request(request("{"), &())
            .await
            .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[derive(Debug, Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "nullable")]
        note: Option<Option<String>>,
    }

    #[test]
    fn test_nullable_field() {
        let absent: Patch = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.note, None);

        let cleared: Patch = serde_json::from_str(r#"{"note":null}"#).unwrap();
        assert_eq!(cleared.note, Some(None));

        let set: Patch = serde_json::from_str(r#"{"note":"hi"}"#).unwrap();
        assert_eq!(set.note, Some(Some("hi".to_string())));
    }

    #[test]
    fn test_custom_rules() {
        assert!(lowercase("alice").is_ok());
        assert!(lowercase("Alice").is_err());
        assert!(not_blank(" x ").is_ok());
        assert!(not_blank("  ").is_err());
    }
}
