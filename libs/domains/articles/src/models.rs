use crate::error::{ArticleError, ArticleResult};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Stored article
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub body: String,
}

impl Article {
    pub fn new(id: i32, payload: ArticlePayload) -> Self {
        Self {
            id,
            title: payload.title,
            description: payload.description,
            body: payload.body,
        }
    }
}

/// Article content as carried by `AddArticle` events
///
/// Missing fields decode as empty strings and are rejected by [`ArticlePayload::check`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ArticlePayload {
    #[validate(length(min = 1, message = "article payload title is empty"))]
    pub title: String,
    #[validate(length(min = 1, message = "article payload description is empty"))]
    pub description: String,
    #[validate(length(min = 1, message = "article payload body is empty"))]
    pub body: String,
}

impl ArticlePayload {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            body: body.into(),
        }
    }

    /// Decode a JSON message body.
    ///
    /// Only a JSON object is accepted; arrays and scalars are decode errors.
    pub fn decode(data: &[u8]) -> ArticleResult<Self> {
        let value: serde_json::Value =
            serde_json::from_slice(data).map_err(|e| ArticleError::Decode(e.to_string()))?;
        if !value.is_object() {
            return Err(ArticleError::Decode(
                "article payload must be a JSON object".to_string(),
            ));
        }
        serde_json::from_value(value).map_err(|e| ArticleError::Decode(e.to_string()))
    }

    /// Validate, reporting the first empty field in declaration order.
    pub fn check(&self) -> ArticleResult<()> {
        self.validate().map_err(|errors| {
            let fields = errors.field_errors();
            let message = ["title", "description", "body"]
                .iter()
                .filter_map(|field| fields.get(*field))
                .filter_map(|errs| errs.first())
                .find_map(|err| err.message.as_ref().map(|m| m.to_string()))
                .unwrap_or_else(|| errors.to_string());
            ArticleError::Validation(message)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_article_serializes_flat() {
        let article = Article::new(7, ArticlePayload::new("t", "d", "b"));
        let json = serde_json::to_value(&article).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"id": 7, "title": "t", "description": "d", "body": "b"})
        );
    }

    #[test]
    fn test_decode_valid_payload() {
        let payload =
            ArticlePayload::decode(br#"{"title":"t","description":"d","body":"b"}"#).unwrap();
        assert_eq!(payload, ArticlePayload::new("t", "d", "b"));
        assert!(payload.check().is_ok());
    }

    #[test]
    fn test_decode_malformed_json() {
        let err = ArticlePayload::decode(b"not json").unwrap_err();
        assert!(matches!(err, ArticleError::Decode(_)));
    }

    #[test]
    fn test_decode_rejects_non_objects() {
        let bodies: [&[u8]; 4] = [br#"["t","d","b"]"#, b"\"title\"", b"42", b"null"];
        for body in bodies {
            let err = ArticlePayload::decode(body).unwrap_err();
            assert!(matches!(err, ArticleError::Decode(_)), "accepted {body:?}");
        }
    }

    #[test]
    fn test_missing_fields_fail_validation() {
        let payload = ArticlePayload::decode(br#"{"title":"t"}"#).unwrap();
        match payload.check() {
            Err(ArticleError::Validation(message)) => {
                assert_eq!(message, "article payload description is empty")
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_validation_reports_first_empty_field() {
        let cases = [
            (ArticlePayload::new("", "", ""), "article payload title is empty"),
            (ArticlePayload::new("t", "", ""), "article payload description is empty"),
            (ArticlePayload::new("t", "d", ""), "article payload body is empty"),
        ];

        for (payload, expected) in cases {
            let err = payload.check().unwrap_err();
            assert_eq!(err.to_string(), format!("Invalid input: {expected}"));
        }
    }
}
