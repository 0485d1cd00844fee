use crate::{DynSvc, ExtensionApi, InjectResult};
use futures::{
    future::{self, LocalBoxFuture},
    FutureExt,
};
use serde_json::Value;
use std::{cell::Cell, rc::Rc};

/// A future resolving to a loaded module, a resolved argument or an
/// instance.
pub type ResolveFuture = LocalBoxFuture<'static, InjectResult<DynSvc>>;

/// A future returned from an extra handler hook.
pub type HookFuture = LocalBoxFuture<'static, InjectResult<()>>;

/// A future resolving to lint diagnostics. Lint futures never fail; an empty
/// list means nothing is wrong.
pub type LintFuture = LocalBoxFuture<'static, Vec<String>>;

/// A hook future that has already succeeded.
#[must_use]
pub fn hook_done() -> HookFuture {
    future::ok(()).boxed_local()
}

/// A lint future with no diagnostics.
#[must_use]
pub fn no_lint() -> LintFuture {
    future::ready(Vec::new()).boxed_local()
}

/// A pluggable strategy registered with a [`Container`](crate::Container).
///
/// An extension can implement any number of capabilities. Each capability
/// accessor returns the extension as that capability, or `None` if it does
/// not provide it. The container queries every accessor exactly once when it
/// is created and keeps the registration order within each capability.
///
/// The [`extension!`](crate::extension!) macro implements this trait for a
/// type given the capabilities it provides.
pub trait Extension {
    /// Gets this extension as a module loader.
    fn module_loader(self: Rc<Self>) -> Option<Rc<dyn ModuleLoader>> {
        None
    }

    /// Gets this extension as an arg resolver.
    fn arg_resolver(self: Rc<Self>) -> Option<Rc<dyn ArgResolver>> {
        None
    }

    /// Gets this extension as an initialiser.
    fn initialiser(self: Rc<Self>) -> Option<Rc<dyn Initialiser>> {
        None
    }

    /// Gets this extension as an extra handler.
    fn extra_handler(self: Rc<Self>) -> Option<Rc<dyn ExtraHandler>> {
        None
    }
}

/// Implements [`Extension`] for a type by listing the capabilities it
/// provides.
///
/// ```
/// use config_injector::{
///     extension, svc, ExtensionApi, ModuleLoader, ResolveFuture,
/// };
/// use futures::{future, FutureExt};
///
/// struct Answer;
///
/// impl ModuleLoader for Answer {
///     fn can_load_module(&self, api: &ExtensionApi) -> bool {
///         api.service_id() == "answer"
///     }
///
///     fn load_module(&self, _api: &ExtensionApi) -> ResolveFuture {
///         future::ok(svc(42_u32)).boxed_local()
///     }
/// }
///
/// extension!(Answer: module_loader);
/// ```
#[macro_export]
macro_rules! extension {
    ($extension:ty: $($capability:ident),+ $(,)?) => {
        impl $crate::Extension for $extension {
            $($crate::extension!(@capability $capability);)+
        }
    };
    (@capability module_loader) => {
        fn module_loader(
            self: ::std::rc::Rc<Self>,
        ) -> ::std::option::Option<::std::rc::Rc<dyn $crate::ModuleLoader>> {
            ::std::option::Option::Some(self)
        }
    };
    (@capability arg_resolver) => {
        fn arg_resolver(
            self: ::std::rc::Rc<Self>,
        ) -> ::std::option::Option<::std::rc::Rc<dyn $crate::ArgResolver>> {
            ::std::option::Option::Some(self)
        }
    };
    (@capability initialiser) => {
        fn initialiser(
            self: ::std::rc::Rc<Self>,
        ) -> ::std::option::Option<::std::rc::Rc<dyn $crate::Initialiser>> {
            ::std::option::Option::Some(self)
        }
    };
    (@capability extra_handler) => {
        fn extra_handler(
            self: ::std::rc::Rc<Self>,
        ) -> ::std::option::Option<::std::rc::Rc<dyn $crate::ExtraHandler>> {
            ::std::option::Option::Some(self)
        }
    };
}

/// Loads the module a service is built from.
pub trait ModuleLoader {
    /// Checks whether this loader can load the service.
    fn can_load_module(&self, api: &ExtensionApi) -> bool;

    /// Loads the module for the service.
    fn load_module(&self, api: &ExtensionApi) -> ResolveFuture;

    /// Checks the service's configuration without loading anything.
    fn lint_loader(&self, _api: &ExtensionApi) -> LintFuture {
        no_lint()
    }
}

/// Resolves one argument definition into a value.
pub trait ArgResolver {
    /// Checks whether this resolver understands the argument definition.
    fn can_resolve_arg(&self, arg_definition: &Value) -> bool;

    /// Resolves the argument. Any nested
    /// [`Container::get`](crate::Container::get) calls should be made
    /// through [`ExtensionApi::container`] so that cycles are detected.
    fn resolve_arg(
        &self,
        arg_definition: &Value,
        api: &ExtensionApi,
    ) -> ResolveFuture;

    /// Checks the argument definition without resolving it.
    fn lint_arg(
        &self,
        _arg_definition: &Value,
        _api: &ExtensionApi,
    ) -> LintFuture {
        no_lint()
    }
}

/// The outcome of [`Initialiser::initialise`].
pub enum Initialised {
    /// The instance was created synchronously.
    Ready(DynSvc),

    /// The instance will be available once the future completes.
    Pending(ResolveFuture),
}

impl From<DynSvc> for Initialised {
    fn from(instance: DynSvc) -> Self {
        Initialised::Ready(instance)
    }
}

/// Turns a loaded module and resolved arguments into a service instance.
pub trait Initialiser {
    /// Checks whether this initialiser should initialise the service.
    fn can_initialise(&self, api: &ExtensionApi) -> bool;

    /// Creates the instance.
    ///
    /// As soon as the instance exists, the initialiser should pass it to
    /// [`InstanceCreated::notify`] so extras can observe it before any
    /// remaining initialisation happens.
    fn initialise(
        &self,
        instance_created: &InstanceCreated,
        module: DynSvc,
        args: Vec<DynSvc>,
    ) -> InjectResult<Initialised>;
}

/// How the container caches a service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum CachePolicy {
    /// The service is resolved once and reused for every request.
    #[default]
    Cache,

    /// The service is resolved again for every request made after the
    /// previous resolution settled. Requests made while a resolution is in
    /// flight still share it.
    NoCache,
}

/// Handles an extra attached to a service definition. Every hook except
/// [`ExtraHandler::can_handle_extra`] is optional.
pub trait ExtraHandler {
    /// Checks whether this handler understands the extra definition.
    fn can_handle_extra(
        &self,
        extra_definition: &Value,
        api: &ExtensionApi,
    ) -> bool;

    /// The cache policy this extra requires for its service.
    fn cache_policy(
        &self,
        _extra_definition: &Value,
        _api: &ExtensionApi,
    ) -> CachePolicy {
        CachePolicy::Cache
    }

    /// Called once the module and arguments are resolved, before the
    /// initialiser runs. A failure aborts the resolution.
    fn before_service_initialised(
        &self,
        _extra_definition: &Value,
        _api: &ExtensionApi,
    ) -> HookFuture {
        hook_done()
    }

    /// Called synchronously when the initialiser reports the new instance.
    fn on_service_instance_created(
        &self,
        _instance: &DynSvc,
        _extra_definition: &Value,
        _api: &ExtensionApi,
    ) {
    }

    /// Called after the initialiser finished. A failure aborts the
    /// resolution.
    fn on_service_initialised(
        &self,
        _instance: &DynSvc,
        _extra_definition: &Value,
        _api: &ExtensionApi,
    ) -> HookFuture {
        hook_done()
    }

    /// Called synchronously at the end of every `get` call for the service,
    /// whether or not it was cached.
    fn on_get_complete(&self, _extra_definition: &Value, _api: &ExtensionApi) {
    }

    /// Checks the extra definition without running it.
    fn lint_extra(
        &self,
        _extra_definition: &Value,
        _api: &ExtensionApi,
    ) -> LintFuture {
        no_lint()
    }
}

/// An extra handler chosen for one entry of a definition's `extras`.
#[derive(Clone)]
pub(crate) struct SelectedExtra {
    pub(crate) handler: Rc<dyn ExtraHandler>,
    pub(crate) definition: Value,
}

/// The callback an initialiser uses to report a new instance. The first
/// call runs every extra's instance-created hook, in `extras` order, before
/// returning. Later calls are ignored.
pub struct InstanceCreated {
    extras: Rc<[SelectedExtra]>,
    api: ExtensionApi,
    notified: Cell<bool>,
}

impl InstanceCreated {
    pub(crate) fn new(extras: Rc<[SelectedExtra]>, api: ExtensionApi) -> Self {
        InstanceCreated {
            extras,
            api,
            notified: Cell::new(false),
        }
    }

    /// Reports the new instance.
    pub fn notify(&self, instance: &DynSvc) {
        if self.notified.replace(true) {
            return;
        }

        for extra in self.extras.iter() {
            extra.handler.on_service_instance_created(
                instance,
                &extra.definition,
                &self.api,
            );
        }
    }

    /// Checks whether an instance has been reported.
    #[must_use]
    pub fn is_notified(&self) -> bool {
        self.notified.get()
    }
}
