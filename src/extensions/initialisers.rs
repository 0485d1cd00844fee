use crate::{
    extension, svc, DynSvc, Extension, ExtensionApi, Factory, InjectError,
    InjectResult, Initialised, Initialiser, InstanceCreated, Svc,
};
use std::rc::Rc;
use tracing::warn;

fn as_factory(module: DynSvc) -> InjectResult<Svc<Factory>> {
    module.downcast::<Factory>().map_err(|_| InjectError::InvalidModule {
        expected: "Factory",
    })
}

fn init_is(api: &ExtensionApi, init: &str) -> bool {
    api.service_definition().init() == Some(init)
}

/// Handles `init: "constructor"` by invoking the module, which must be a
/// [`Factory`], with the service's args.
///
/// A warning is logged when the number of args does not match the
/// factory's arity.
pub struct ConstructorInitialiser;

impl Initialiser for ConstructorInitialiser {
    fn can_initialise(&self, api: &ExtensionApi) -> bool {
        init_is(api, "constructor")
    }

    fn initialise(
        &self,
        instance_created: &InstanceCreated,
        module: DynSvc,
        args: Vec<DynSvc>,
    ) -> InjectResult<Initialised> {
        let factory = as_factory(module)?;
        if let Some(arity) = factory.arity().filter(|&arity| arity != args.len())
        {
            warn!(
                module = factory.name(),
                args = args.len(),
                arity,
                "module initialised with the wrong number of args"
            );
        }

        let instance = factory.invoke(&args)?;
        instance_created.notify(&instance);
        Ok(instance.into())
    }
}

extension!(ConstructorInitialiser: initialiser);

/// Handles `init: "factory"` by invoking the module, which must be a
/// [`Factory`], with the service's args.
pub struct FactoryInitialiser;

impl Initialiser for FactoryInitialiser {
    fn can_initialise(&self, api: &ExtensionApi) -> bool {
        init_is(api, "factory")
    }

    fn initialise(
        &self,
        instance_created: &InstanceCreated,
        module: DynSvc,
        args: Vec<DynSvc>,
    ) -> InjectResult<Initialised> {
        let instance = as_factory(module)?.invoke(&args)?;
        instance_created.notify(&instance);
        Ok(instance.into())
    }
}

extension!(FactoryInitialiser: initialiser);

/// Handles `init: "return"` by using the module itself as the instance. The
/// service's args are ignored.
pub struct ReturnInitialiser;

impl Initialiser for ReturnInitialiser {
    fn can_initialise(&self, api: &ExtensionApi) -> bool {
        init_is(api, "return")
    }

    fn initialise(
        &self,
        instance_created: &InstanceCreated,
        module: DynSvc,
        _args: Vec<DynSvc>,
    ) -> InjectResult<Initialised> {
        instance_created.notify(&module);
        Ok(module.into())
    }
}

extension!(ReturnInitialiser: initialiser);

/// Handles `init: "partial"` by binding the service's args to the front of
/// the module, which must be a [`Factory`]. The instance is the new
/// [`Factory`].
pub struct PartialInitialiser;

impl Initialiser for PartialInitialiser {
    fn can_initialise(&self, api: &ExtensionApi) -> bool {
        init_is(api, "partial")
    }

    fn initialise(
        &self,
        instance_created: &InstanceCreated,
        module: DynSvc,
        args: Vec<DynSvc>,
    ) -> InjectResult<Initialised> {
        let instance = svc(as_factory(module)?.partial(args));
        instance_created.notify(&instance);
        Ok(instance.into())
    }
}

extension!(PartialInitialiser: initialiser);

/// Makes an initialiser also handle services which have no `init`.
pub struct DefaultInitialiser<I> {
    inner: I,
}

/// Makes an initialiser the fallback for services which have no `init`.
/// Only one initialiser should be registered this way.
pub fn default_initialiser<I: Initialiser>(inner: I) -> DefaultInitialiser<I> {
    DefaultInitialiser { inner }
}

impl<I: Initialiser> Initialiser for DefaultInitialiser<I> {
    fn can_initialise(&self, api: &ExtensionApi) -> bool {
        api.service_definition().init().is_none()
            || self.inner.can_initialise(api)
    }

    fn initialise(
        &self,
        instance_created: &InstanceCreated,
        module: DynSvc,
        args: Vec<DynSvc>,
    ) -> InjectResult<Initialised> {
        self.inner.initialise(instance_created, module, args)
    }
}

impl<I: Initialiser + 'static> Extension for DefaultInitialiser<I> {
    fn initialiser(self: Rc<Self>) -> Option<Rc<dyn Initialiser>> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Config, Container, IntoFactory, ServiceDefinition};
    use serde_json::Value;

    fn api(init: Option<&str>) -> ExtensionApi {
        let container = Container::builder().build(Config::new());
        let mut definition = ServiceDefinition::new();
        if let Some(init) = init {
            definition = definition.with_property("init", init);
        }
        ExtensionApi::new(&container, "svc", Rc::new(definition))
    }

    fn created() -> InstanceCreated {
        InstanceCreated::new(Rc::from(Vec::new()), api(None))
    }

    fn ready(initialised: InjectResult<Initialised>) -> DynSvc {
        match initialised {
            Ok(Initialised::Ready(instance)) => instance,
            Ok(Initialised::Pending(_)) => panic!("expected a ready instance"),
            Err(error) => panic!("initialisation failed: {}", error),
        }
    }

    fn double(value: Svc<i32>) -> i32 {
        *value * 2
    }

    #[test]
    fn initialisers_match_their_init() {
        assert!(ConstructorInitialiser.can_initialise(&api(Some("constructor"))));
        assert!(FactoryInitialiser.can_initialise(&api(Some("factory"))));
        assert!(ReturnInitialiser.can_initialise(&api(Some("return"))));
        assert!(PartialInitialiser.can_initialise(&api(Some("partial"))));
        assert!(!FactoryInitialiser.can_initialise(&api(Some("return"))));
        assert!(!FactoryInitialiser.can_initialise(&api(None)));
    }

    #[test]
    fn default_initialiser_handles_missing_init() {
        let initialiser = default_initialiser(FactoryInitialiser);
        assert!(initialiser.can_initialise(&api(None)));
        assert!(initialiser.can_initialise(&api(Some("factory"))));
        assert!(!initialiser.can_initialise(&api(Some("constructor"))));
    }

    #[test]
    fn factory_is_invoked_and_notified() {
        let created = created();
        let module = svc(double.into_factory("double"));
        let instance =
            ready(FactoryInitialiser.initialise(&created, module, vec![svc(21)]));

        assert_eq!(Some(&42), instance.downcast_ref::<i32>());
        assert!(created.is_notified());
    }

    #[test]
    fn constructor_tolerates_arity_mismatch() {
        let created = created();
        let module = svc(
            Factory::new("count", |args| Ok(svc(args.len()))).with_arity(1),
        );
        let instance = ready(ConstructorInitialiser.initialise(
            &created,
            module,
            vec![svc(1), svc(2)],
        ));

        assert_eq!(Some(&2), instance.downcast_ref::<usize>());
    }

    #[test]
    fn non_factory_modules_are_rejected() {
        let result =
            FactoryInitialiser.initialise(&created(), svc(Value::Null), vec![]);
        assert!(matches!(
            result,
            Err(InjectError::InvalidModule { expected: "Factory" })
        ));
    }

    #[test]
    fn return_ignores_args() {
        let created = created();
        let module = svc("module");
        let instance = ready(ReturnInitialiser.initialise(
            &created,
            module.clone(),
            vec![svc(1)],
        ));

        assert!(Svc::ptr_eq(&module, &instance));
        assert!(created.is_notified());
    }

    #[test]
    fn partial_returns_bound_factory() {
        let created = created();
        let module = svc(double.into_factory("double"));
        let instance =
            ready(PartialInitialiser.initialise(&created, module, vec![svc(4)]));

        let partial: Svc<Factory> = instance.downcast().unwrap();
        assert_eq!(Some(0), partial.arity());
        let result = partial.invoke(&[]).unwrap();
        assert_eq!(Some(&8), result.downcast_ref::<i32>());
    }
}
