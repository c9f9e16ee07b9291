//! Mapping from SDK failures to the crate error taxonomy.
//!
//! Remote calls convert their `SdkError`s here, at the seam, so that
//! `bf_error::classify` can stay a pure function over plain status codes,
//! service codes and bodies.

use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use bf_error::{BfError, StorageError};

/// Service error codes that signal a credential/token exchange problem
/// rather than a request problem.
const TOKEN_CODES: &[&str] = &["ExpiredToken", "InvalidToken", "TokenRefreshRequired"];

/// Converts an SDK failure into a [`BfError`], preserving the HTTP
/// status, service error code and raw body when the store answered at
/// all.
pub(crate) fn storage_error<E>(err: SdkError<E>) -> BfError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let storage = match &err {
        SdkError::ServiceError(ctx) => {
            let raw = ctx.raw();
            let status = raw.status().as_u16();
            let code = ctx.err().code().map(String::from);
            let message = ctx
                .err()
                .message()
                .map(String::from)
                .unwrap_or_else(|| ctx.err().to_string());
            let body = raw
                .body()
                .bytes()
                .map(|b| String::from_utf8_lossy(b).into_owned());

            if code.as_deref().is_some_and(|c| TOKEN_CODES.contains(&c)) {
                StorageError::Token {
                    status,
                    description: message,
                }
            } else {
                StorageError::Api {
                    status: Some(status),
                    code,
                    message,
                    body,
                }
            }
        }
        SdkError::TimeoutError(_) => StorageError::Timeout(err.to_string()),
        SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            StorageError::Connection(err.to_string())
        }
        _ => StorageError::Connection(err.to_string()),
    };

    BfError::Storage(storage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_s3::error::ErrorMetadata;
    use aws_sdk_s3::operation::get_object::GetObjectError;
    use aws_smithy_runtime_api::client::orchestrator::HttpResponse;
    use aws_smithy_runtime_api::http::StatusCode;
    use aws_smithy_types::body::SdkBody;
    use bf_error::is_transient;

    fn service_error(
        status: u16,
        code: Option<&str>,
        message: &str,
        body: &str,
    ) -> SdkError<GetObjectError> {
        let mut meta = ErrorMetadata::builder().message(message);
        if let Some(code) = code {
            meta = meta.code(code);
        }
        let response = HttpResponse::new(
            StatusCode::try_from(status).unwrap(),
            SdkBody::from(body.to_string()),
        );
        SdkError::service_error(GetObjectError::generic(meta.build()), response)
    }

    #[test]
    fn test_service_error_carries_status_and_code() {
        let mapped = storage_error(service_error(
            404,
            Some("NoSuchKey"),
            "key not found",
            "{\"Code\":\"NoSuchKey\"}",
        ));

        match &mapped {
            BfError::Storage(StorageError::Api {
                status,
                code,
                message,
                ..
            }) => {
                assert_eq!(*status, Some(404));
                assert_eq!(code.as_deref(), Some("NoSuchKey"));
                assert!(message.contains("key not found"));
            }
            other => panic!("expected Api error, got {other:?}"),
        }
        assert!(!is_transient(&mapped));
    }

    #[test]
    fn test_unparsed_error_body_stays_retryable() {
        // No structured code, but the store answered with a body: the
        // classifier treats this 4xx as transient
        let mapped = storage_error(service_error(
            400,
            None,
            "malformed response",
            "<html>bad gateway</html>",
        ));

        assert!(matches!(
            &mapped,
            BfError::Storage(StorageError::Api { code: None, .. })
        ));
        assert!(is_transient(&mapped));
    }

    #[test]
    fn test_token_codes_map_to_token_errors() {
        let mapped = storage_error(service_error(
            400,
            Some("ExpiredToken"),
            "The provided token has expired.",
            "",
        ));
        match &mapped {
            BfError::Storage(StorageError::Token {
                status,
                description,
            }) => {
                assert_eq!(*status, 400);
                assert!(description.contains("expired"));
            }
            other => panic!("expected Token error, got {other:?}"),
        }
        assert!(!is_transient(&mapped));

        // The token carve-out: an invalid-JWT description retries
        let mapped = storage_error(service_error(
            400,
            Some("InvalidToken"),
            "Invalid JWT: No valid verifier found for issuer.",
            "",
        ));
        assert!(is_transient(&mapped));
    }

    #[test]
    fn test_timeout_maps_transient() {
        let err: SdkError<GetObjectError> =
            SdkError::timeout_error(Box::new(std::io::Error::other("operation timed out")));
        let mapped = storage_error(err);

        assert!(matches!(
            mapped,
            BfError::Storage(StorageError::Timeout(_))
        ));
        assert!(is_transient(&mapped));
    }
}
