#![allow(clippy::used_underscore_binding)]

use crate::DynSvc;
use derive_more::{Display, Error};
use serde_json::Value;
use std::sync::Arc;

/// A result from attempting to resolve part of a service.
pub type InjectResult<T> = Result<T, InjectError>;

/// The result of a call to [`Container::get`](crate::Container::get).
pub type ServiceResult = Result<DynSvc, ServiceError>;

/// An error that has occurred while resolving a service.
///
/// Errors are cheap to clone so that every caller awaiting the same cached
/// resolution observes the same failure.
#[derive(Clone, Debug, Display, Error)]
#[non_exhaustive]
pub enum InjectError {
    /// The requested service has no definition in the configuration.
    #[display(fmt = "missing service definition")]
    MissingDefinition,

    /// The requested service is already being resolved further up the
    /// dependency chain.
    #[display(fmt = "circular dependency detected: {}", "fmt_chain(chain)")]
    CycleDetected {
        /// The dependency chain, ending with the service that closed the
        /// cycle.
        chain: Vec<String>,
    },

    /// No registered module loader can load the service.
    #[display(fmt = "no module loader")]
    NoModuleLoader,

    /// No registered initialiser can initialise the service.
    #[display(fmt = "no initialiser")]
    NoInitialiser,

    /// No registered arg resolver accepts the argument definition.
    #[display(fmt = "no arg resolver for {}", "fmt_definition(arg_definition)")]
    NoArgResolver {
        /// The argument that could not be resolved.
        arg_definition: Value,
    },

    /// No registered extra handler accepts the extra definition.
    #[display(
        fmt = "no extra handler for {}",
        "fmt_definition(extra_definition)"
    )]
    NoExtraHandler {
        /// The extra that could not be handled.
        extra_definition: Value,
    },

    /// The loaded module is not something the initialiser can use.
    #[display(fmt = "loaded module is not a {}", expected)]
    InvalidModule {
        /// The type the initialiser expected.
        expected: &'static str,
    },

    /// A resolved service does not have the requested type.
    #[display(fmt = "service is not a {}", expected)]
    InvalidType {
        /// The type that was requested.
        expected: &'static str,
    },

    /// A resolved argument does not have the type a factory expected.
    #[display(fmt = "argument {} is missing or is not a {}", index, expected)]
    InvalidArgument {
        /// The position of the argument.
        index: usize,

        /// The type the factory expected.
        expected: &'static str,
    },

    /// A module loader could not find the requested module.
    #[display(fmt = "missing module '{}'", path)]
    MissingModule {
        /// The path of the module.
        path: String,
    },

    /// A value does not have the requested property.
    #[display(fmt = "no property '{}'", property)]
    MissingProperty {
        /// The property that was requested.
        property: String,
    },

    /// An extension failed with a plain message.
    #[display(fmt = "{}", _0)]
    Message(#[error(ignore)] String),

    /// An extension or factory failed with its own error type.
    #[display(fmt = "{}", _0)]
    Failed(Arc<dyn std::error::Error + Send + Sync>),

    /// Resolution of a specific argument failed.
    #[display(fmt = "{}", _0)]
    Arg(ArgError),

    /// Resolution of a specific service failed.
    #[display(fmt = "{}", _0)]
    Service(ServiceError),
}

impl InjectError {
    /// Creates an error from a plain message.
    pub fn msg(message: impl Into<String>) -> Self {
        InjectError::Message(message.into())
    }

    /// Creates an error from any other error type.
    pub fn failed(
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        InjectError::Failed(Arc::new(error))
    }

    /// Gets the innermost error, skipping any argument or service context.
    #[must_use]
    pub fn root_cause(&self) -> &InjectError {
        match self {
            InjectError::Arg(error) => error.inner().root_cause(),
            InjectError::Service(error) => error.inner().root_cause(),
            error => error,
        }
    }
}

impl From<ServiceError> for InjectError {
    fn from(error: ServiceError) -> Self {
        InjectError::Service(error)
    }
}

impl From<ArgError> for InjectError {
    fn from(error: ArgError) -> Self {
        InjectError::Arg(error)
    }
}

/// A failure tied to one argument definition.
#[derive(Clone, Debug, Display, Error)]
#[display(fmt = "arg '{}', {}", "fmt_definition(arg_definition)", source)]
pub struct ArgError {
    arg_definition: Value,
    source: Box<InjectError>,
}

impl ArgError {
    /// Adds argument context to an error. Errors which already carry
    /// argument or service context are returned unchanged.
    pub fn wrap(arg_definition: &Value, error: InjectError) -> InjectError {
        match error {
            error @ (InjectError::Arg(_) | InjectError::Service(_)) => error,
            error => InjectError::Arg(ArgError {
                arg_definition: arg_definition.clone(),
                source: Box::new(error),
            }),
        }
    }

    /// The argument that failed to resolve.
    #[must_use]
    pub fn arg_definition(&self) -> &Value {
        &self.arg_definition
    }

    /// The wrapped error.
    #[must_use]
    pub fn inner(&self) -> &InjectError {
        &self.source
    }
}

/// A failure tied to one service id. This is the error every
/// [`Container::get`](crate::Container::get) call fails with.
#[derive(Clone, Debug, Display, Error)]
#[display(fmt = "error with service '{}': {}", service_id, source)]
pub struct ServiceError {
    service_id: String,
    source: Box<InjectError>,
}

impl ServiceError {
    /// Adds service context to an error. An error which already carries
    /// service context is returned as is, so the innermost service that
    /// failed is the one that gets reported.
    #[must_use]
    pub fn wrap(service_id: &str, error: InjectError) -> Self {
        match error {
            InjectError::Service(error) => error,
            error => ServiceError {
                service_id: service_id.to_owned(),
                source: Box::new(error),
            },
        }
    }

    /// The service that failed.
    #[must_use]
    pub fn service_id(&self) -> &str {
        &self.service_id
    }

    /// The wrapped error.
    #[must_use]
    pub fn inner(&self) -> &InjectError {
        &self.source
    }

    /// Gets the innermost error, skipping any argument or service context.
    #[must_use]
    pub fn root_cause(&self) -> &InjectError {
        self.source.root_cause()
    }
}

fn fmt_chain(chain: &[String]) -> String {
    chain.join(", ")
}

pub(crate) fn fmt_definition(definition: &Value) -> String {
    match definition {
        Value::String(definition) => definition.clone(),
        definition => definition.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::error::Error as _;

    #[test]
    fn service_error_names_service_and_cause() {
        let error = ServiceError::wrap("foo", InjectError::msg("bar"));
        let message = error.to_string();
        assert!(message.contains("foo"));
        assert!(message.contains("bar"));
    }

    #[test]
    fn service_error_is_not_rewrapped() {
        let original = ServiceError::wrap("foo", InjectError::msg("bar"));
        let error = ServiceError::wrap("123", original.into());
        assert_eq!("foo", error.service_id());
        assert!(!error.to_string().contains("123"));
    }

    #[test]
    fn arg_error_names_definition_and_cause() {
        let error = ArgError::wrap(&json!("foo"), InjectError::msg("bar"));
        let message = error.to_string();
        assert!(message.contains("foo"));
        assert!(message.contains("bar"));
        assert!(matches!(error, InjectError::Arg(_)));
    }

    #[test]
    fn arg_error_keeps_existing_arg_error() {
        let original = ArgError::wrap(&json!("foo"), InjectError::msg("bar"));
        match ArgError::wrap(&json!("123"), original) {
            InjectError::Arg(error) => {
                assert_eq!(&json!("foo"), error.arg_definition());
            }
            error => panic!("unexpected error: {}", error),
        }
    }

    #[test]
    fn arg_error_keeps_existing_service_error() {
        let original: InjectError =
            ServiceError::wrap("foo", InjectError::msg("bar")).into();
        match ArgError::wrap(&json!("123"), original) {
            InjectError::Service(error) => assert_eq!("foo", error.service_id()),
            error => panic!("unexpected error: {}", error),
        }
    }

    #[test]
    fn source_chain_reaches_original_error() {
        let inner = ArgError::wrap(&json!("%port"), InjectError::msg("nope"));
        let error = ServiceError::wrap("server", inner);

        let source = error.source().expect("service error has a source");
        assert!(source.to_string().contains("%port"));
        assert!(matches!(error.root_cause(), InjectError::Message(m) if m == "nope"));
    }
}
