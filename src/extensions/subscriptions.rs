use crate::{
    extension, get_property, svc, ArgResolver, DynSvc, EventHandler,
    ExtensionApi, Factory, InjectError, InjectResult, ResolveFuture, Svc,
};
use futures::{future, FutureExt};
use serde_json::Value;
use std::{any::type_name, cell::RefCell, rc::Rc};
use tracing::{trace, warn};

/// Something delivering events to a handler, which can be switched on and
/// off.
pub trait Subscription {
    /// Starts calling the handler for each event.
    fn start(&self, handler: EventHandler);

    /// Stops calling the handler.
    fn stop(&self);
}

struct Managed {
    handler: DynSvc,
    method: Option<String>,
    subscription: Box<dyn Subscription>,
}

impl Managed {
    fn matches(&self, handler: &DynSvc, method: Option<&str>) -> bool {
        Svc::ptr_eq(&self.handler, handler)
            && (method.is_none() || self.method.as_deref() == method)
    }
}

/// Keeps track of the event subscriptions of services, so they can be
/// stopped, restarted and disposed of later.
///
/// A handler is a service. Events are delivered to the [`Factory`] found at
/// the handler's `method` property (see [`get_property`]), or to the handler
/// itself when it is a subscription without a method. The payload is passed
/// as the factory's only arg.
///
/// The manager is also an arg resolver: `subscriptionManager` resolves to a
/// handle sharing its subscriptions.
#[derive(Clone, Default)]
pub struct SubscriptionManager {
    managed: Rc<RefCell<Vec<Rc<Managed>>>>,
}

impl SubscriptionManager {
    /// Creates a manager with no subscriptions.
    #[must_use]
    pub fn new() -> Self {
        SubscriptionManager::default()
    }

    /// Adds a subscription for a handler. It is not started.
    pub fn add(
        &self,
        handler: DynSvc,
        method: Option<&str>,
        subscription: impl Subscription + 'static,
    ) {
        self.managed.borrow_mut().push(Rc::new(Managed {
            handler,
            method: method.map(str::to_owned),
            subscription: Box::new(subscription),
        }));
    }

    /// Starts the handler's subscriptions, or only the one for `method`.
    pub fn start(&self, handler: &DynSvc, method: Option<&str>) {
        for managed in self.matching(handler, method) {
            trace!(method = ?managed.method, "starting subscription");
            let dispatch =
                dispatcher(managed.handler.clone(), managed.method.clone());
            managed.subscription.start(dispatch);
        }
    }

    /// Stops the handler's subscriptions, or only the one for `method`.
    pub fn stop(&self, handler: &DynSvc, method: Option<&str>) {
        for managed in self.matching(handler, method) {
            managed.subscription.stop();
        }
    }

    /// Stops the handler's subscriptions, or only the one for `method`, and
    /// forgets them. Starting them again does nothing.
    pub fn dispose(&self, handler: &DynSvc, method: Option<&str>) {
        self.stop(handler, method);
        self.managed
            .borrow_mut()
            .retain(|managed| !managed.matches(handler, method));
    }

    /// The number of subscriptions being managed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.managed.borrow().len()
    }

    /// Checks whether no subscriptions are being managed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.managed.borrow().is_empty()
    }

    fn matching(&self, handler: &DynSvc, method: Option<&str>) -> Vec<Rc<Managed>> {
        self.managed
            .borrow()
            .iter()
            .filter(|managed| managed.matches(handler, method))
            .cloned()
            .collect()
    }
}

impl ArgResolver for SubscriptionManager {
    fn can_resolve_arg(&self, arg_definition: &Value) -> bool {
        arg_definition == "subscriptionManager"
    }

    fn resolve_arg(
        &self,
        _arg_definition: &Value,
        _api: &ExtensionApi,
    ) -> ResolveFuture {
        future::ok(svc(self.clone())).boxed_local()
    }
}

extension!(SubscriptionManager: arg_resolver);

fn dispatcher(handler: DynSvc, method: Option<String>) -> EventHandler {
    Rc::new(move |payload: &DynSvc| {
        if let Err(error) = deliver(&handler, method.as_deref(), payload) {
            warn!(?method, %error, "event handler failed");
        }
    })
}

fn deliver(
    handler: &DynSvc,
    method: Option<&str>,
    payload: &DynSvc,
) -> InjectResult<()> {
    let target = match method {
        Some(method) => get_property(handler, method).ok_or_else(|| {
            InjectError::MissingProperty {
                property: method.to_owned(),
            }
        })?,
        None => handler.clone(),
    };

    let factory = target.downcast::<Factory>().map_err(|_| {
        InjectError::InvalidType {
            expected: type_name::<Factory>(),
        }
    })?;
    factory.invoke(&[payload.clone()])?;
    Ok(())
}
