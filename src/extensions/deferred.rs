use crate::{
    extension, svc, ArgResolver, ExtensionApi, InjectError, InjectResult,
    LintFuture, ResolveFuture, Service, Svc,
};
use futures::{
    future::{self, Shared},
    FutureExt,
};
use serde_json::Value;
use std::{any::type_name, cell::RefCell};

const PREFIX: &str = "defer:";

/// A handle to an arg that has not been resolved yet.
///
/// `defer:@other` resolves to a [`Deferred`] instead of to `@other`. The
/// inner arg starts resolving once the service that asked for it has been
/// cached and its args are awaited, outside of that service's dependency
/// chain. Nothing waits for it until [`Deferred::resolve`] is called. This
/// lets two services refer to each other, as long as at least one of them
/// waits until after its own initialisation to resolve the other.
pub struct Deferred {
    api: ExtensionApi,
    arg_definition: Value,
    resolved: RefCell<Option<Shared<ResolveFuture>>>,
}

impl Deferred {
    /// The inner arg definition.
    #[must_use]
    pub fn arg_definition(&self) -> &Value {
        &self.arg_definition
    }

    /// Checks whether resolution of the inner arg has started.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.resolved.borrow().is_some()
    }

    /// Resolves the inner arg. Every call shares the same resolution.
    pub fn resolve(&self) -> ResolveFuture {
        self.start().boxed_local()
    }

    fn start(&self) -> Shared<ResolveFuture> {
        let existing = self.resolved.borrow().clone();
        match existing {
            Some(resolved) => resolved,
            None => {
                let resolved =
                    self.api.resolve_arg(&self.arg_definition).shared();
                *self.resolved.borrow_mut() = Some(resolved.clone());
                resolved
            }
        }
    }

    /// Resolves the inner arg as a concrete type.
    pub async fn resolve_as<T: Service>(&self) -> InjectResult<Svc<T>> {
        let resolved = self.resolve().await?;
        resolved.downcast().map_err(|_| InjectError::InvalidType {
            expected: type_name::<T>(),
        })
    }
}

/// Resolves `defer:<arg>` to a [`Deferred`] handle for `<arg>`.
pub struct DeferredArgResolver;

impl ArgResolver for DeferredArgResolver {
    fn can_resolve_arg(&self, arg_definition: &Value) -> bool {
        arg_definition
            .as_str()
            .map_or(false, |arg| arg.starts_with(PREFIX))
    }

    fn resolve_arg(
        &self,
        arg_definition: &Value,
        api: &ExtensionApi,
    ) -> ResolveFuture {
        let inner = arg_definition
            .as_str()
            .and_then(|arg| arg.strip_prefix(PREFIX))
            .unwrap_or_default();

        let deferred = Deferred {
            api: api.detached(),
            arg_definition: Value::from(inner),
            resolved: RefCell::new(None),
        };

        // By the time this is polled the requesting service is cached, so
        // the inner arg can depend on it.
        async move {
            let _ = deferred.start();
            Ok::<_, InjectError>(svc(deferred))
        }
        .boxed_local()
    }

    fn lint_arg(
        &self,
        arg_definition: &Value,
        api: &ExtensionApi,
    ) -> LintFuture {
        let inner = arg_definition
            .as_str()
            .and_then(|arg| arg.strip_prefix(PREFIX))
            .map(Value::from)
            .unwrap_or_default();

        match api.get_arg_resolver(&inner) {
            Ok(resolver) => resolver.lint_arg(&inner, api),
            Err(error) => future::ready(vec![error.to_string()]).boxed_local(),
        }
    }
}

extension!(DeferredArgResolver: arg_resolver);
