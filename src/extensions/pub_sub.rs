use crate::{
    hook_done, svc, ArgResolver, Config, Container, DynSvc, EventBus,
    EventHandler, Extension, ExtensionApi, ExtraHandler, HookFuture,
    InjectError, InjectResult, LintFuture, ResolveFuture, ServiceError,
    Subscription, SubscriptionManager,
};
use futures::{
    future::{self, LocalBoxFuture},
    FutureExt, TryFutureExt,
};
use serde_json::Value;
use std::{
    any::type_name,
    cell::{Cell, RefCell},
    marker::PhantomData,
    rc::Rc,
};
use tracing::{debug, warn};

const PREFIX: &str = "publish:";

/// The events an extra subscribes to, with the method handling each one.
/// `{ "subscribe": "foo" }` subscribes the instance itself to `foo`, and
/// `{ "subscribe": { "foo": "onFoo" } }` subscribes its `onFoo` property.
fn subscribed_events(extra_definition: &Value) -> Vec<(&str, Option<&str>)> {
    match extra_definition.get("subscribe") {
        Some(Value::String(event_name)) => vec![(event_name.as_str(), None)],
        Some(Value::Object(events)) => events
            .iter()
            .map(|(event_name, method)| (event_name.as_str(), method.as_str()))
            .collect(),
        _ => Vec::new(),
    }
}

fn subscribes_to(extra_definition: &Value, event_name: &str) -> bool {
    subscribed_events(extra_definition)
        .iter()
        .any(|(subscribed, _)| *subscribed == event_name)
}

/// The services with an extra subscribing to the event.
fn subscribers(config: &Config, event_name: &str) -> Vec<String> {
    config
        .services
        .iter()
        .filter(|(_, definition)| {
            definition
                .extras
                .iter()
                .any(|extra| subscribes_to(extra, event_name))
        })
        .map(|(service_id, _)| service_id.clone())
        .collect()
}

/// Publishes one event. This is what `publish:<event>` resolves to.
pub struct Publisher {
    event_name: String,
    subscribers: Vec<String>,
    container: Container,
    bus: Rc<dyn EventBus>,
}

impl Publisher {
    /// The event this publishes.
    #[must_use]
    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    /// The services subscribing to the event.
    #[must_use]
    pub fn subscribers(&self) -> &[String] {
        &self.subscribers
    }

    /// Resolves every service subscribing to the event, so none of them
    /// miss it, then triggers the event.
    pub fn publish(
        &self,
        payload: DynSvc,
    ) -> LocalBoxFuture<'static, Result<(), ServiceError>> {
        let subscribers: Vec<_> = self
            .subscribers
            .iter()
            .map(|service_id| self.container.get(service_id))
            .collect();
        let event_name = self.event_name.clone();
        let bus = self.bus.clone();

        async move {
            future::try_join_all(subscribers).await?;
            debug!(%event_name, "publishing event");
            bus.trigger(&event_name, &payload);
            Ok::<_, ServiceError>(())
        }
        .boxed_local()
    }
}

/// A subscription on an event bus. Starting it twice has no effect.
struct BusSubscription {
    bus: Rc<dyn EventBus>,
    event_name: String,
    token: Cell<Option<u64>>,
}

impl Subscription for BusSubscription {
    fn start(&self, handler: EventHandler) {
        if self.token.get().is_none() {
            self.token.set(Some(self.bus.on(&self.event_name, handler)));
        }
    }

    fn stop(&self) {
        if let Some(token) = self.token.take() {
            self.bus.off(token);
        }
    }
}

#[derive(Clone)]
struct Wiring {
    bus: Rc<dyn EventBus>,
    subscriptions: SubscriptionManager,
}

/// Publishing and subscribing to events through an event bus service.
///
/// - `publish:<event>` resolves to a [`Publisher`] for the event.
/// - The extra `{ "subscribe": "<event>" }` subscribes the instance, which
///   must be a [`Factory`](crate::Factory), to the event.
/// - The extra `{ "subscribe": { "<event>": "<method>" } }` subscribes a
///   property of the instance to each event (see
///   [`SubscriptionManager`]).
///
/// The event bus is the service `event_bus_service_id`, which must resolve
/// to a `B`. Subscriptions are added to the container's
/// [`SubscriptionManager`], which must also be registered.
pub struct PubSubExtension<B> {
    event_bus_service_id: String,
    wiring: Rc<RefCell<Option<Wiring>>>,
    bus: PhantomData<B>,
}

impl<B: EventBus + 'static> PubSubExtension<B> {
    /// Creates the extension, using the given service as the event bus.
    pub fn new(event_bus_service_id: impl Into<String>) -> Self {
        PubSubExtension {
            event_bus_service_id: event_bus_service_id.into(),
            wiring: Rc::default(),
            bus: PhantomData,
        }
    }

    /// The id of the event bus service.
    #[must_use]
    pub fn event_bus_service_id(&self) -> &str {
        &self.event_bus_service_id
    }

    fn as_bus(service: DynSvc) -> InjectResult<Rc<dyn EventBus>> {
        match service.downcast::<B>() {
            Ok(bus) => Ok(bus as Rc<dyn EventBus>),
            Err(_) => Err(InjectError::InvalidType {
                expected: type_name::<B>(),
            }),
        }
    }

    fn create_subscriptions(
        &self,
        instance: &DynSvc,
        events: &[(&str, Option<&str>)],
    ) -> InjectResult<()> {
        let wiring = self
            .wiring
            .borrow()
            .clone()
            .ok_or_else(|| InjectError::msg("the event bus is not resolved"))?;

        for &(event_name, method) in events {
            wiring.subscriptions.add(
                instance.clone(),
                method,
                BusSubscription {
                    bus: wiring.bus.clone(),
                    event_name: event_name.to_owned(),
                    token: Cell::new(None),
                },
            );
            wiring.subscriptions.start(instance, method);
        }

        Ok(())
    }
}

impl<B: EventBus + 'static> ArgResolver for PubSubExtension<B> {
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
        let event_name = arg_definition
            .as_str()
            .and_then(|arg| arg.strip_prefix(PREFIX))
            .unwrap_or_default()
            .to_owned();
        let subscribers = subscribers(api.container().config(), &event_name);
        let container = api.container().root();
        let bus = api.container().get(&self.event_bus_service_id);

        async move {
            let bus = Self::as_bus(bus.await?)?;
            Ok::<_, InjectError>(svc(Publisher {
                event_name,
                subscribers,
                container,
                bus,
            }))
        }
        .boxed_local()
    }

    fn lint_arg(
        &self,
        arg_definition: &Value,
        api: &ExtensionApi,
    ) -> LintFuture {
        let event_name = arg_definition
            .as_str()
            .and_then(|arg| arg.strip_prefix(PREFIX))
            .unwrap_or_default();
        let messages =
            if subscribers(api.container().config(), event_name).is_empty() {
                vec![format!(
                    "Missing matching subscription for {} publisher",
                    event_name
                )]
            } else {
                Vec::new()
            };

        future::ready(messages).boxed_local()
    }
}

impl<B: EventBus + 'static> ExtraHandler for PubSubExtension<B> {
    fn can_handle_extra(
        &self,
        extra_definition: &Value,
        _api: &ExtensionApi,
    ) -> bool {
        matches!(
            extra_definition.get("subscribe"),
            Some(Value::String(_) | Value::Object(_))
        )
    }

    fn before_service_initialised(
        &self,
        _extra_definition: &Value,
        api: &ExtensionApi,
    ) -> HookFuture {
        let subscriptions =
            api.resolve_arg(&Value::from("subscriptionManager"));
        let bus = api
            .container()
            .get(&self.event_bus_service_id)
            .map_err(InjectError::from);
        let wiring = self.wiring.clone();

        async move {
            let (subscriptions, bus) =
                future::try_join(subscriptions, bus).await?;
            let subscriptions = subscriptions
                .downcast::<SubscriptionManager>()
                .map_err(|_| InjectError::InvalidType {
                    expected: type_name::<SubscriptionManager>(),
                })?;

            *wiring.borrow_mut() = Some(Wiring {
                bus: Self::as_bus(bus)?,
                subscriptions: (*subscriptions).clone(),
            });
            Ok::<_, InjectError>(())
        }
        .boxed_local()
    }

    fn on_service_instance_created(
        &self,
        instance: &DynSvc,
        extra_definition: &Value,
        api: &ExtensionApi,
    ) {
        // Method subscriptions start as soon as the instance exists.
        if !extra_definition["subscribe"].is_object() {
            return;
        }

        let events = subscribed_events(extra_definition);
        if let Err(error) = self.create_subscriptions(instance, &events) {
            warn!(
                service_id = api.service_id(),
                %error,
                "could not subscribe service"
            );
        }
    }

    fn on_service_initialised(
        &self,
        instance: &DynSvc,
        extra_definition: &Value,
        _api: &ExtensionApi,
    ) -> HookFuture {
        if !extra_definition["subscribe"].is_string() {
            return hook_done();
        }

        let events = subscribed_events(extra_definition);
        future::ready(self.create_subscriptions(instance, &events))
            .boxed_local()
    }
}

impl<B: EventBus + 'static> Extension for PubSubExtension<B> {
    fn arg_resolver(self: Rc<Self>) -> Option<Rc<dyn ArgResolver>> {
        Some(self)
    }

    fn extra_handler(self: Rc<Self>) -> Option<Rc<dyn ExtraHandler>> {
        Some(self)
    }
}
