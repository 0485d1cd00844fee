//! The built-in extensions.

mod alias;
mod args;
mod deferred;
mod event_bus;
mod factory_service;
mod initialisers;
mod module_registry;
mod no_cache;
mod pub_sub;
mod structured;
mod subscriptions;

pub use alias::*;
pub use args::*;
pub use deferred::*;
pub use event_bus::*;
pub use factory_service::*;
pub use initialisers::*;
pub use module_registry::*;
pub use no_cache::*;
pub use pub_sub::*;
pub use structured::*;
pub use subscriptions::*;

use crate::Extension;
use std::rc::Rc;

fn shared<E: Extension + 'static>(extension: E) -> Rc<dyn Extension> {
    Rc::new(extension)
}

/// Creates every built-in extension, loading modules from the given
/// registry.
///
/// Extensions are tried in registration order, so the order here matters:
/// definitions with an `alias`, `structuredArg` or `factoryService` key are
/// claimed before the registry is consulted for their `module`, and
/// [`FactoryInitialiser`] is registered last as the fallback for services
/// with no `init`.
///
/// Publishing and subscribing need an event bus service, so they are added
/// separately (see
/// [`ContainerBuilder::add_pub_sub_extensions`](crate::ContainerBuilder::add_pub_sub_extensions)).
#[must_use]
pub fn standard_extensions(
    modules: ModuleRegistryLoader,
) -> Vec<Rc<dyn Extension>> {
    vec![
        shared(AliasExtension),
        shared(StructuredArgExtension),
        shared(FactoryServiceLoader),
        shared(DefaultExportDecorator::new(modules)),
        shared(CommonArgResolver),
        shared(ServiceArgResolver),
        shared(ParamArgResolver),
        shared(DeferredArgResolver),
        shared(NoCacheExtension),
        shared(ConstructorInitialiser),
        shared(ReturnInitialiser),
        shared(PartialInitialiser),
        shared(default_initialiser(FactoryInitialiser)),
    ]
}
