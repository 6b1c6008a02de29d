use crate::{api::ApiError, model::ResourceKind};

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors returned by managers, synthesizers and the stack deployer.
///
/// Callers classify an error with [`Error::is_retry`], [`Error::is_not_found`],
/// [`Error::is_conflict`] and [`Error::is_fatal`] rather than by inspecting its message. A retry
/// that aggregates other failures keeps the failure it was caused by, so a conflict stays
/// classifiable after it has been folded into a retry.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A named resource does not exist remotely.
    #[error("not found: {0}")]
    NotFound(String),

    /// A resource already exists in a mutually-exclusive state, or exists but is owned by
    /// someone else.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The remote system rejected a request because it referenced something malformed or
    /// missing.
    #[error("invalid request: {0}")]
    Invalid(String),

    /// The remote resource is in a transitional state; the whole pass may be retried later.
    #[error("retry later: {reason}")]
    Retry {
        reason: String,
        #[source]
        source: Option<Box<Error>>,
    },

    #[error("invalid rule id {0:?}: expected rule-<priority>")]
    InvalidRuleId(String),

    #[error("unsupported resource kind {0:?}")]
    UnsupportedKind(String),

    #[error("stack resource {id} is a {found}, not a {expected}")]
    KindMismatch {
        id: String,
        expected: ResourceKind,
        found: ResourceKind,
    },

    #[error("stack already contains a resource with id {0}")]
    DuplicateResource(String),

    #[error("kubernetes lookup failed: {0}")]
    Kubernetes(#[source] anyhow::Error),

    #[error("failed to publish DNS endpoint: {0}")]
    Dns(#[source] anyhow::Error),

    #[error(transparent)]
    Api(anyhow::Error),
}

impl Error {
    pub fn retry(reason: impl Into<String>) -> Self {
        Self::Retry {
            reason: reason.into(),
            source: None,
        }
    }

    /// A retry caused by `source`.
    pub fn retry_caused_by(reason: impl Into<String>, source: Error) -> Self {
        Self::Retry {
            reason: reason.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn conflict(what: impl Into<String>) -> Self {
        Self::Conflict(what.into())
    }

    pub fn is_retry(&self) -> bool {
        matches!(self, Self::Retry { .. })
    }

    /// True if this error, or the failure a retry was caused by, is a [`Error::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self.root_cause(), Self::NotFound(_))
    }

    /// True if this error, or the failure a retry was caused by, is a [`Error::Conflict`].
    pub fn is_conflict(&self) -> bool {
        matches!(self.root_cause(), Self::Conflict(_))
    }

    /// Follows the chain of retries down to the failure that caused them.
    pub fn root_cause(&self) -> &Self {
        match self {
            Self::Retry {
                source: Some(source),
                ..
            } => source.root_cause(),
            error => error,
        }
    }

    /// Errors that retrying cannot resolve: the desired state must change first.
    pub fn is_terminal(&self) -> bool {
        self.is_fatal() || matches!(self, Self::Invalid(_))
    }

    /// Errors that indicate a bug in the desired-state builder. These must not be retried
    /// blindly.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InvalidRuleId(_)
                | Self::UnsupportedKind(_)
                | Self::KindMismatch { .. }
                | Self::DuplicateResource(_)
        )
    }
}

impl From<ApiError> for Error {
    fn from(error: ApiError) -> Self {
        match error {
            ApiError::NotFound(msg) => Self::NotFound(msg),
            ApiError::Conflict(msg) => Self::Conflict(msg),
            ApiError::Validation(msg) => Self::Invalid(msg),
            ApiError::Throttled(msg) => Self::retry(msg),
            ApiError::Other(error) => Self::Api(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_errors_map_onto_taxonomy() {
        assert!(Error::from(ApiError::NotFound("svc".into())).is_not_found());
        assert!(Error::from(ApiError::Conflict("svc".into())).is_conflict());
        assert!(matches!(
            Error::from(ApiError::Validation("bad arn".into())),
            Error::Invalid(_)
        ));
        assert!(Error::from(ApiError::Throttled("slow down".into())).is_retry());
        assert!(matches!(
            Error::from(ApiError::Other(anyhow::anyhow!("boom"))),
            Error::Api(_)
        ));
    }

    #[test]
    fn builder_errors_are_fatal() {
        assert!(Error::InvalidRuleId("rule-x".into()).is_fatal());
        assert!(Error::UnsupportedKind("AWS::Foo".into()).is_fatal());
        assert!(!Error::retry("in progress").is_fatal());
        assert!(!Error::not_found("sn").is_fatal());
    }

    #[test]
    fn invalid_requests_are_terminal() {
        assert!(Error::Invalid("no such bucket".into()).is_terminal());
        assert!(Error::InvalidRuleId("rule-x".into()).is_terminal());
        assert!(!Error::conflict("exists").is_terminal());
        assert!(!Error::retry("in progress").is_terminal());
    }

    #[test]
    fn retries_keep_their_cause() {
        let error = Error::retry_caused_by(
            "1 service(s) failed",
            Error::retry_caused_by("waiting", Error::conflict("association owned elsewhere")),
        );
        assert!(error.is_retry());
        assert!(error.is_conflict());
        assert!(!error.is_not_found());
        assert!(matches!(error.root_cause(), Error::Conflict(_)));
        assert_eq!(
            std::error::Error::source(&error).map(ToString::to_string),
            Some("retry later: waiting".to_string())
        );

        let plain = Error::retry("in progress");
        assert!(!plain.is_conflict());
        assert!(matches!(plain.root_cause(), Error::Retry { .. }));
    }
}
