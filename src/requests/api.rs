use crate::{
    ArgError, ArgResolver, Container, InjectError, InjectResult,
    ResolveFuture, ServiceDefinition,
};
use futures::{future, FutureExt, TryFutureExt};
use serde_json::Value;
use std::rc::Rc;

/// The view of the container handed to extensions while one service is
/// being resolved.
///
/// Each call to [`Container::get`] builds its own `ExtensionApi`. Its
/// [`container`](ExtensionApi::container) is a copy of the calling
/// container whose dependency chain has been extended by the service being
/// resolved, so any `get` an extension makes through it takes part in cycle
/// detection.
#[derive(Clone)]
pub struct ExtensionApi {
    container: Container,
    unsafe_container: Container,
    service_id: String,
    service_definition: Rc<ServiceDefinition>,
}

impl ExtensionApi {
    /// Creates the API for resolving a service from a container.
    #[must_use]
    pub fn new(
        container: &Container,
        service_id: &str,
        service_definition: Rc<ServiceDefinition>,
    ) -> Self {
        ExtensionApi {
            container: container.with_request(service_id),
            unsafe_container: container.clone(),
            service_id: service_id.to_owned(),
            service_definition,
        }
    }

    /// The container to resolve dependencies from. Its chain ends with the
    /// current service.
    #[must_use]
    pub fn container(&self) -> &Container {
        &self.container
    }

    /// The container `get` was called on, with the caller's chain. Requests
    /// made through it are not attributed to the current service.
    #[must_use]
    pub fn unsafe_container(&self) -> &Container {
        &self.unsafe_container
    }

    /// The id of the service being resolved.
    #[must_use]
    pub fn service_id(&self) -> &str {
        &self.service_id
    }

    /// The definition of the service being resolved.
    #[must_use]
    pub fn service_definition(&self) -> &ServiceDefinition {
        &self.service_definition
    }

    /// Gets a copy of this API whose container has an empty dependency
    /// chain. Resolutions made through it later, once the current resolution
    /// has moved on, can depend on the current service. This is how deferred
    /// arguments break cycles.
    #[must_use]
    pub fn detached(&self) -> Self {
        ExtensionApi {
            container: self.container.root(),
            ..self.clone()
        }
    }

    /// Finds the first registered arg resolver which understands the
    /// argument definition.
    pub fn get_arg_resolver(
        &self,
        arg_definition: &Value,
    ) -> InjectResult<Rc<dyn ArgResolver>> {
        self.container
            .arg_resolvers()
            .iter()
            .find(|resolver| resolver.can_resolve_arg(arg_definition))
            .cloned()
            .ok_or_else(|| InjectError::NoArgResolver {
                arg_definition: arg_definition.clone(),
            })
    }

    /// Resolves one argument definition. Any failure, including a missing
    /// resolver, is reported as an [`ArgError`] for this argument unless it
    /// already carries argument or service context.
    pub fn resolve_arg(&self, arg_definition: &Value) -> ResolveFuture {
        let resolver = match self.get_arg_resolver(arg_definition) {
            Ok(resolver) => resolver,
            Err(error) => {
                return future::err(ArgError::wrap(arg_definition, error))
                    .boxed_local()
            }
        };

        let definition = arg_definition.clone();
        resolver
            .resolve_arg(arg_definition, self)
            .map_err(move |error| ArgError::wrap(&definition, error))
            .boxed_local()
    }

    /// Resolves several argument definitions. The futures are returned in
    /// the same order as the definitions and are not joined.
    pub fn resolve_args<'a>(
        &self,
        arg_definitions: impl IntoIterator<Item = &'a Value>,
    ) -> Vec<ResolveFuture> {
        arg_definitions
            .into_iter()
            .map(|arg_definition| self.resolve_arg(arg_definition))
            .collect()
    }
}
