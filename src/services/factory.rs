use crate::{svc, DynSvc, InjectError, InjectResult, Service, Svc};
use std::{
    any::type_name,
    fmt::{Debug, Formatter},
    rc::Rc,
};

type FactoryFn = dyn Fn(&[DynSvc]) -> InjectResult<DynSvc>;

/// A callable module. Initialisers such as `init: "constructor"` and
/// `init: "factory"` expect the loaded module to be a [`Factory`], and invoke
/// it with the service's resolved arguments.
///
/// Plain functions taking service pointers can be turned into factories with
/// [`IntoFactory`]:
///
/// ```
/// use config_injector::{svc, Factory, IntoFactory, Svc};
///
/// fn greet(name: Svc<String>) -> String {
///     format!("hello {}", name)
/// }
///
/// let factory: Factory = greet.into_factory("greet");
/// assert_eq!(Some(1), factory.arity());
///
/// let greeting = factory.invoke(&[svc("world".to_owned())]).unwrap();
/// let greeting: Svc<String> = greeting.downcast().unwrap();
/// assert_eq!("hello world", *greeting);
/// ```
#[derive(Clone)]
pub struct Factory {
    name: String,
    arity: Option<usize>,
    func: Rc<FactoryFn>,
}

impl Factory {
    /// Creates a factory from a function over the raw arguments. Factories
    /// created this way have no declared arity.
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&[DynSvc]) -> InjectResult<DynSvc> + 'static,
    {
        Factory {
            name: name.into(),
            arity: None,
            func: Rc::new(func),
        }
    }

    /// Declares how many arguments this factory expects.
    #[must_use]
    pub fn with_arity(mut self, arity: usize) -> Self {
        self.arity = Some(arity);
        self
    }

    /// A factory which ignores its arguments and returns `()`.
    #[must_use]
    pub fn noop() -> Self {
        Factory::new("noop", |_| Ok(svc(())))
    }

    /// The name used to refer to this factory in diagnostics.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The number of arguments this factory expects, if it is known.
    #[must_use]
    pub fn arity(&self) -> Option<usize> {
        self.arity
    }

    /// Invokes the factory.
    pub fn invoke(&self, args: &[DynSvc]) -> InjectResult<DynSvc> {
        (self.func)(args)
    }

    /// Creates a new factory with the given leading arguments already
    /// applied. The new factory keeps this factory's name.
    #[must_use]
    pub fn partial(&self, bound: Vec<DynSvc>) -> Self {
        let inner = self.func.clone();
        let arity = self.arity.map(|arity| arity.saturating_sub(bound.len()));
        let func = move |args: &[DynSvc]| {
            let all: Vec<DynSvc> = bound.iter().chain(args).cloned().collect();
            inner(&all)
        };

        Factory {
            name: self.name.clone(),
            arity,
            func: Rc::new(func),
        }
    }
}

impl Debug for Factory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Factory")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish_non_exhaustive()
    }
}

/// Gets one of a factory's arguments as a concrete type.
pub fn arg<T: Service>(args: &[DynSvc], index: usize) -> InjectResult<Svc<T>> {
    args.get(index)
        .cloned()
        .and_then(|arg| arg.downcast::<T>().ok())
        .ok_or(InjectError::InvalidArgument {
            index,
            expected: type_name::<T>(),
        })
}

/// Conversion of a function into a [`Factory`]. All functions of arity 8 or
/// less taking [`Svc`]s and returning a service implement this trait.
///
/// # Type parameters
/// * `D` - Arguments of the function as a tuple.
pub trait IntoFactory<D>: 'static {
    /// Creates a factory with the given name.
    fn into_factory(self, name: &str) -> Factory;
}

macro_rules! impl_into_factory {
    () => {
        impl_into_factory!(@impl ());
    };
    ($first:ident $(, $rest:ident)*) => {
        impl_into_factory!(@impl ($first $(, $rest)*));
        impl_into_factory!($($rest),*);
    };
    (@impl ($($type_name:ident),*)) => {
        impl<F, R $(, $type_name)*> IntoFactory<($($type_name,)*)> for F
        where
            F: 'static + Fn($(Svc<$type_name>),*) -> R,
            R: Service,
            $($type_name: Service,)*
        {
            #[allow(unused_variables, unused_mut)]
            fn into_factory(self, name: &str) -> Factory {
                let names: &[&str] = &[$(stringify!($type_name)),*];
                let arity = names.len();

                Factory::new(name, move |args: &[DynSvc]| {
                    let mut index = 0;
                    let result = self($({
                        index += 1;
                        arg::<$type_name>(args, index - 1)?
                    }),*);
                    Ok(svc(result))
                })
                .with_arity(arity)
            }
        }
    };
}

impl_into_factory!(T1, T2, T3, T4, T5, T6, T7, T8);

#[cfg(test)]
mod tests {
    use super::*;

    fn add(a: Svc<i32>, b: Svc<i32>) -> i32 {
        *a + *b
    }

    #[test]
    fn functions_become_factories() {
        let factory = add.into_factory("add");
        assert_eq!("add", factory.name());
        assert_eq!(Some(2), factory.arity());

        let sum = factory.invoke(&[svc(1_i32), svc(2_i32)]).unwrap();
        assert_eq!(Some(&3), sum.downcast_ref::<i32>());
    }

    #[test]
    fn wrong_argument_type_is_reported() {
        let factory = add.into_factory("add");
        match factory.invoke(&[svc(1_i32), svc("two")]) {
            Err(InjectError::InvalidArgument { index: 1, .. }) => {}
            Err(error) => panic!("unexpected error: {}", error),
            Ok(_) => panic!("factory accepted a bad argument"),
        }
    }

    #[test]
    fn missing_argument_is_reported() {
        let factory = add.into_factory("add");
        assert!(matches!(
            factory.invoke(&[svc(1_i32)]),
            Err(InjectError::InvalidArgument { index: 1, .. })
        ));
    }

    #[test]
    fn partial_binds_leading_arguments() {
        let factory = add.into_factory("add").partial(vec![svc(40_i32)]);
        assert_eq!("add", factory.name());
        assert_eq!(Some(1), factory.arity());

        let sum = factory.invoke(&[svc(2_i32)]).unwrap();
        assert_eq!(Some(&42), sum.downcast_ref::<i32>());
    }

    #[test]
    fn zero_arity_functions_are_factories() {
        let factory = (|| "value").into_factory("value");
        assert_eq!(Some(0), factory.arity());
        assert!(factory.invoke(&[]).unwrap().is::<&str>());
    }

    #[test]
    fn noop_ignores_arguments() {
        let result = Factory::noop().invoke(&[svc(1_u8)]).unwrap();
        assert!(result.is::<()>());
    }
}
