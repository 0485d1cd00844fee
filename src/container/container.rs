use crate::{
    ArgResolver, CachePolicy, Config, ContainerBuilder, DependencyChain,
    DynSvc, Extension, ExtensionApi, ExtraHandler, InjectError, InjectResult,
    Initialised, Initialiser, InstanceCreated, ModuleLoader, ResolveFuture,
    SelectedExtra, Service, ServiceDefinition, ServiceError, ServiceResult,
    Svc,
};
use futures::{
    future::{self, LocalBoxFuture, Shared},
    FutureExt, TryFutureExt,
};
use indexmap::IndexMap;
use serde_json::Value;
use std::{
    any::type_name,
    cell::{Cell, RefCell},
    collections::HashMap,
    rc::{Rc, Weak},
};
use tracing::{debug, trace};

/// The future returned by [`Container::get`].
pub type ServiceFuture = LocalBoxFuture<'static, ServiceResult>;

type SharedService = Shared<ServiceFuture>;

struct CacheEntry {
    token: u64,
    result: SharedService,
}

pub(crate) struct ContainerState {
    module_loaders: Vec<Rc<dyn ModuleLoader>>,
    arg_resolvers: Vec<Rc<dyn ArgResolver>>,
    initialisers: Vec<Rc<dyn Initialiser>>,
    extra_handlers: Vec<Rc<dyn ExtraHandler>>,
    definitions: IndexMap<String, Rc<ServiceDefinition>>,
    config: Config,
    cache: RefCell<HashMap<String, CacheEntry>>,
    next_token: Cell<u64>,
}

impl ContainerState {
    fn evict_entry(&self, service_id: &str, token: u64) {
        let mut cache = self.cache.borrow_mut();
        if cache.get(service_id).map(|entry| entry.token) == Some(token) {
            cache.remove(service_id);
            debug!(service_id, "evicted uncached service");
        }
    }
}

/// A dependency injection container driven by a [`Config`]. Services are
/// resolved on demand, by id, using the registered extensions to load their
/// modules, resolve their arguments and initialise them.
///
/// Cloning a container does not clone its cache or its extensions. Both
/// copies share them, which is what lets extensions request other services
/// while resolving one.
///
/// ```
/// use config_injector::{
///     Config, Container, IntoFactory, ModuleRegistryLoader, Svc,
/// };
/// use futures::executor::block_on;
///
/// struct Greeter(String);
///
/// fn make_greeter(name: Svc<serde_json::Value>) -> Greeter {
///     Greeter(format!("hello {}", name.as_str().unwrap_or("nobody")))
/// }
///
/// let modules = ModuleRegistryLoader::new()
///     .with_module("greeter", make_greeter.into_factory("greeter"));
///
/// let config: Config = r#"{
///     "services": {
///         "greeter": { "module": "greeter", "args": ["%name"] }
///     },
///     "params": { "name": "world" }
/// }"#
/// .parse()
/// .unwrap();
///
/// let mut builder = Container::builder();
/// builder.add_standard_extensions(modules);
/// let container = builder.build(config);
///
/// let greeter: Svc<Greeter> =
///     block_on(container.get_as("greeter")).unwrap();
/// assert_eq!("hello world", greeter.0);
/// ```
#[derive(Clone)]
pub struct Container {
    state: Rc<ContainerState>,
    chain: DependencyChain,
}

impl Container {
    /// Creates a builder for this container. This is the preferred way of
    /// creating a container.
    #[must_use]
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::default()
    }

    /// Creates a new container directly from its extensions. Each extension
    /// is registered under every capability it provides, keeping the order
    /// of the list. Prefer [`Container::builder()`] instead.
    #[must_use]
    pub fn new(extensions: Vec<Rc<dyn Extension>>, config: Config) -> Self {
        let mut module_loaders = Vec::new();
        let mut arg_resolvers = Vec::new();
        let mut initialisers = Vec::new();
        let mut extra_handlers = Vec::new();

        for extension in extensions {
            module_loaders.extend(extension.clone().module_loader());
            arg_resolvers.extend(extension.clone().arg_resolver());
            initialisers.extend(extension.clone().initialiser());
            extra_handlers.extend(extension.extra_handler());
        }

        let definitions = config
            .services
            .iter()
            .map(|(id, definition)| (id.clone(), Rc::new(definition.clone())))
            .collect();

        debug!(
            module_loaders = module_loaders.len(),
            arg_resolvers = arg_resolvers.len(),
            initialisers = initialisers.len(),
            extra_handlers = extra_handlers.len(),
            services = config.services.len(),
            "created container"
        );

        Container {
            state: Rc::new(ContainerState {
                module_loaders,
                arg_resolvers,
                initialisers,
                extra_handlers,
                definitions,
                config,
                cache: RefCell::new(HashMap::new()),
                next_token: Cell::new(0),
            }),
            chain: DependencyChain::new(),
        }
    }

    /// The configuration this container resolves services from.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.state.config
    }

    /// The services being resolved on this view's resolution path.
    #[must_use]
    pub fn chain(&self) -> &DependencyChain {
        &self.chain
    }

    /// Gets a view of this container with an empty dependency chain. It
    /// shares the cache and extensions with this view.
    #[must_use]
    pub fn root(&self) -> Container {
        Container {
            state: self.state.clone(),
            chain: DependencyChain::new(),
        }
    }

    pub(crate) fn with_request(&self, service_id: &str) -> Container {
        Container {
            state: self.state.clone(),
            chain: self.chain.with_request(service_id),
        }
    }

    pub(crate) fn definitions(
        &self,
    ) -> &IndexMap<String, Rc<ServiceDefinition>> {
        &self.state.definitions
    }

    pub(crate) fn arg_resolvers(&self) -> &[Rc<dyn ArgResolver>] {
        &self.state.arg_resolvers
    }

    /// Checks whether a resolution of the service is cached, whether or not
    /// it has settled.
    #[must_use]
    pub fn is_cached(&self, service_id: &str) -> bool {
        self.state.cache.borrow().contains_key(service_id)
    }

    /// Removes the cached resolution of a service, so the next request
    /// resolves it again. Callers already awaiting the old resolution are not
    /// affected. Returns whether anything was removed.
    pub fn evict(&self, service_id: &str) -> bool {
        self.state.cache.borrow_mut().remove(service_id).is_some()
    }

    /// Requests a service by id.
    ///
    /// Everything up to starting the resolution happens before this returns:
    /// the definition is looked up, the extensions are chosen, the module and
    /// arguments start loading (so services the arguments depend on are
    /// requested too), the pending resolution is cached and every extra's
    /// get-complete hook has run. The returned future then completes with
    /// the instance, shared by every request for the same service.
    ///
    /// Failures are reported as a [`ServiceError`] naming the service, unless
    /// the failure already names a service, in which case it is returned as
    /// is.
    pub fn get(&self, service_id: &str) -> ServiceFuture {
        match self.try_get(service_id) {
            Ok(result) => result,
            Err(error) => {
                let error = ServiceError::wrap(service_id, error);
                debug!(service_id, %error, "service request failed");
                future::err(error).boxed_local()
            }
        }
    }

    /// Requests a service by id and downcasts it to a concrete type.
    pub fn get_as<T: Service>(
        &self,
        service_id: &str,
    ) -> LocalBoxFuture<'static, Result<Svc<T>, ServiceError>> {
        let id = service_id.to_owned();
        self.get(service_id)
            .map(move |result| {
                result?.downcast::<T>().map_err(|_| {
                    ServiceError::wrap(
                        &id,
                        InjectError::InvalidType {
                            expected: type_name::<T>(),
                        },
                    )
                })
            })
            .boxed_local()
    }

    fn try_get(&self, service_id: &str) -> InjectResult<ServiceFuture> {
        let definition = self
            .state
            .definitions
            .get(service_id)
            .cloned()
            .ok_or(InjectError::MissingDefinition)?;

        let api = ExtensionApi::new(self, service_id, definition);
        let extras = self.select_extras(&api)?;

        if let Some(cached) = self.cached(service_id) {
            fire_get_complete(&extras, &api);
            return Ok(cached);
        }

        if self.chain.contains(service_id) {
            let mut chain = self.chain.service_path().to_vec();
            chain.push(service_id.to_owned());
            return Err(InjectError::CycleDetected { chain });
        }

        // Get-complete hooks also run when no loader or initialiser matches.
        let result = self.start(service_id, &api, &extras);
        fire_get_complete(&extras, &api);
        result
    }

    /// Gets the cached resolution of a service. A pending resolution is not
    /// returned to a view already resolving that service, since it would be
    /// waiting for itself.
    fn cached(&self, service_id: &str) -> Option<ServiceFuture> {
        let cache = self.state.cache.borrow();
        let entry = cache.get(service_id)?;
        if entry.result.peek().is_none() && self.chain.contains(service_id) {
            return None;
        }

        trace!(service_id, "service cache hit");
        Some(entry.result.clone().boxed_local())
    }

    fn start(
        &self,
        service_id: &str,
        api: &ExtensionApi,
        extras: &Rc<[SelectedExtra]>,
    ) -> InjectResult<ServiceFuture> {
        let loader = self.select_module_loader(api)?;
        let initialiser = self.select_initialiser(api)?;
        let policy = extras
            .iter()
            .map(|extra| extra.handler.cache_policy(&extra.definition, api))
            .max()
            .unwrap_or_default();

        debug!(
            service_id,
            chain = %self.chain,
            ?policy,
            "resolving service"
        );

        let module = loader.load_module(api);
        let args = api.resolve_args(&api.service_definition().args);
        let pipeline =
            resolve_instance(module, args, initialiser, extras.clone(), api.clone());

        let id = service_id.to_owned();
        let pipeline =
            pipeline.map_err(move |error| ServiceError::wrap(&id, error));

        let token = self.state.next_token.get();
        self.state.next_token.set(token + 1);

        let pipeline: ServiceFuture = match policy {
            CachePolicy::Cache => pipeline.boxed_local(),
            CachePolicy::NoCache => {
                let state: Weak<ContainerState> = Rc::downgrade(&self.state);
                let id = service_id.to_owned();
                pipeline
                    .inspect(move |_| {
                        if let Some(state) = state.upgrade() {
                            state.evict_entry(&id, token);
                        }
                    })
                    .boxed_local()
            }
        };

        let result = pipeline.shared();
        self.state.cache.borrow_mut().insert(
            service_id.to_owned(),
            CacheEntry {
                token,
                result: result.clone(),
            },
        );

        Ok(result.boxed_local())
    }

    pub(crate) fn find_module_loader(
        &self,
        api: &ExtensionApi,
    ) -> Option<Rc<dyn ModuleLoader>> {
        self.state
            .module_loaders
            .iter()
            .find(|loader| loader.can_load_module(api))
            .cloned()
    }

    pub(crate) fn find_initialiser(
        &self,
        api: &ExtensionApi,
    ) -> Option<Rc<dyn Initialiser>> {
        self.state
            .initialisers
            .iter()
            .find(|initialiser| initialiser.can_initialise(api))
            .cloned()
    }

    pub(crate) fn find_extra_handler(
        &self,
        extra_definition: &Value,
        api: &ExtensionApi,
    ) -> Option<Rc<dyn ExtraHandler>> {
        self.state
            .extra_handlers
            .iter()
            .find(|handler| handler.can_handle_extra(extra_definition, api))
            .cloned()
    }

    fn select_module_loader(
        &self,
        api: &ExtensionApi,
    ) -> InjectResult<Rc<dyn ModuleLoader>> {
        self.find_module_loader(api)
            .ok_or(InjectError::NoModuleLoader)
    }

    fn select_initialiser(
        &self,
        api: &ExtensionApi,
    ) -> InjectResult<Rc<dyn Initialiser>> {
        self.find_initialiser(api).ok_or(InjectError::NoInitialiser)
    }

    fn select_extras(
        &self,
        api: &ExtensionApi,
    ) -> InjectResult<Rc<[SelectedExtra]>> {
        api.service_definition()
            .extras
            .iter()
            .map(|definition| {
                let handler =
                    self.find_extra_handler(definition, api).ok_or_else(|| {
                        InjectError::NoExtraHandler {
                            extra_definition: definition.clone(),
                        }
                    })?;

                Ok(SelectedExtra {
                    handler,
                    definition: definition.clone(),
                })
            })
            .collect()
    }
}

/// Waits for the module and arguments, then runs the hooks and initialiser
/// around them.
async fn resolve_instance(
    module: ResolveFuture,
    args: Vec<ResolveFuture>,
    initialiser: Rc<dyn Initialiser>,
    extras: Rc<[SelectedExtra]>,
    api: ExtensionApi,
) -> InjectResult<DynSvc> {
    let (module, args) =
        future::try_join(module, future::try_join_all(args)).await?;

    trace!(service_id = api.service_id(), "running before-initialised hooks");
    future::try_join_all(extras.iter().map(|extra| {
        extra
            .handler
            .before_service_initialised(&extra.definition, &api)
    }))
    .await?;

    let instance_created = InstanceCreated::new(extras.clone(), api.clone());
    let instance = match initialiser.initialise(&instance_created, module, args)?
    {
        Initialised::Ready(instance) => instance,
        Initialised::Pending(instance) => instance.await?,
    };

    trace!(service_id = api.service_id(), "running after-initialised hooks");
    future::try_join_all(extras.iter().map(|extra| {
        extra
            .handler
            .on_service_initialised(&instance, &extra.definition, &api)
    }))
    .await?;

    debug!(service_id = api.service_id(), "resolved service");
    Ok(instance)
}

fn fire_get_complete(extras: &[SelectedExtra], api: &ExtensionApi) {
    for extra in extras {
        extra.handler.on_get_complete(&extra.definition, api);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{extension, svc};
    use futures::executor::block_on;
    use serde_json::json;

    struct Everything;

    impl ModuleLoader for Everything {
        fn can_load_module(&self, _api: &ExtensionApi) -> bool {
            true
        }

        fn load_module(&self, api: &ExtensionApi) -> ResolveFuture {
            future::ok(svc(api.service_id().to_owned())).boxed_local()
        }
    }

    impl Initialiser for Everything {
        fn can_initialise(&self, _api: &ExtensionApi) -> bool {
            true
        }

        fn initialise(
            &self,
            _instance_created: &InstanceCreated,
            module: DynSvc,
            _args: Vec<DynSvc>,
        ) -> InjectResult<Initialised> {
            Ok(module.into())
        }
    }

    extension!(Everything: module_loader, initialiser);

    /// Loads every service by waiting for the service itself.
    struct AwaitsItself;

    impl ModuleLoader for AwaitsItself {
        fn can_load_module(&self, _api: &ExtensionApi) -> bool {
            true
        }

        fn load_module(&self, api: &ExtensionApi) -> ResolveFuture {
            let container = api.container().clone();
            let service_id = api.service_id().to_owned();
            async move { Ok(container.get(&service_id).await?) }.boxed_local()
        }
    }

    extension!(AwaitsItself: module_loader);

    fn container(config: Config) -> Container {
        let mut builder = Container::builder();
        builder.extend(Everything);
        builder.build(config)
    }

    #[test]
    fn get_as_downcasts() {
        let container =
            container(Config::new().with_service("foo", ServiceDefinition::new()));

        let foo: Svc<String> = block_on(container.get_as("foo")).unwrap();
        assert_eq!("foo", *foo);
    }

    #[test]
    fn get_as_reports_wrong_type() {
        let container =
            container(Config::new().with_service("foo", ServiceDefinition::new()));

        let error = block_on(container.get_as::<u32>("foo"))
            .err()
            .expect("service is not a u32");
        assert_eq!("foo", error.service_id());
        assert!(matches!(error.inner(), InjectError::InvalidType { .. }));
    }

    #[test]
    fn resolution_is_cached_until_evicted() {
        let container =
            container(Config::new().with_service("foo", ServiceDefinition::new()));

        assert!(!container.is_cached("foo"));
        let first = block_on(container.get("foo")).unwrap();
        assert!(container.is_cached("foo"));
        let second = block_on(container.get("foo")).unwrap();
        assert!(Svc::ptr_eq(&first, &second));

        assert!(container.evict("foo"));
        assert!(!container.evict("foo"));
        let third = block_on(container.get("foo")).unwrap();
        assert!(!Svc::ptr_eq(&first, &third));
    }

    #[test]
    fn settled_services_are_returned_to_any_view() {
        let container =
            container(Config::new().with_service("foo", ServiceDefinition::new()));

        let first = block_on(container.get("foo")).unwrap();
        let view = container.with_request("bar").with_request("foo");
        let second = block_on(view.get("foo")).unwrap();
        assert!(Svc::ptr_eq(&first, &second));
    }

    #[test]
    fn pending_services_do_not_wait_for_themselves() {
        let mut builder = Container::builder();
        builder.extend(AwaitsItself);
        builder.extend(Everything);
        let container = builder
            .build(Config::new().with_service("foo", ServiceDefinition::new()));

        let error = block_on(container.get("foo")).err().unwrap();
        assert!(matches!(
            error.root_cause(),
            InjectError::CycleDetected { chain } if chain == &["foo", "foo"]
        ));
    }

    #[test]
    fn failures_are_not_cached_before_resolution_starts() {
        let container = container(Config::new().with_service(
            "foo",
            ServiceDefinition::new().with_extra("unknown"),
        ));

        assert!(block_on(container.get("foo")).is_err());
        assert!(!container.is_cached("foo"));
    }

    #[test]
    fn root_view_has_no_chain() {
        let container = container(Config::new());
        let view = container.with_request("a").with_request("b");

        assert_eq!(2, view.chain().len());
        assert!(view.root().chain().is_empty());
    }

    #[test]
    fn config_is_shared_by_views() {
        let container = container(
            Config::new().with_params(json!({ "name": "value" })),
        );
        let view = container.with_request("a");

        assert_eq!(
            Some(&Value::from("value")),
            view.config().param("name")
        );
    }
}
