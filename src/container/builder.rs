use crate::{
    standard_extensions, Config, Container, EventBus, Extension,
    ModuleRegistryLoader, PubSubExtension, SubscriptionManager,
};
use std::rc::Rc;

/// A builder for a [`Container`]. Extensions are registered in the order
/// they are added, which is the order the container tries them in.
#[derive(Default)]
pub struct ContainerBuilder {
    extensions: Vec<Rc<dyn Extension>>,
}

impl ContainerBuilder {
    /// Adds an extension to the container.
    pub fn extend<E: Extension + 'static>(&mut self, extension: E) {
        self.add_extension(Rc::new(extension));
    }

    /// Adds an extension that is already shared, for example so a test can
    /// keep a handle to it.
    pub fn add_extension(&mut self, extension: Rc<dyn Extension>) {
        self.extensions.push(extension);
    }

    /// Adds the built-in extensions, loading modules from the given
    /// registry. See [`standard_extensions`] for what they are.
    pub fn add_standard_extensions(&mut self, modules: ModuleRegistryLoader) {
        self.extensions.extend(standard_extensions(modules));
    }

    /// Adds publishing and subscribing through the event bus service with the
    /// given id, which must resolve to a `B`. Returns the manager every
    /// subscription is added to.
    pub fn add_pub_sub_extensions<B: EventBus + 'static>(
        &mut self,
        event_bus_service_id: impl Into<String>,
    ) -> SubscriptionManager {
        let subscriptions = SubscriptionManager::new();
        self.extend(subscriptions.clone());
        self.extend(PubSubExtension::<B>::new(event_bus_service_id));
        subscriptions
    }

    /// The number of extensions added so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    /// Checks whether no extensions have been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    /// Builds the container.
    #[must_use]
    pub fn build(self, config: Config) -> Container {
        Container::new(self.extensions, config)
    }
}
