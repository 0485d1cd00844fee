use std::{any::Any, rc::Rc};

/// A reference-counted pointer holding a service. Resolution happens on a
/// single thread, so this is always an [`Rc<T>`].
pub type Svc<T> = Rc<T>;

/// A service pointer holding an instance of `dyn Any`. Loaded modules,
/// resolved arguments and constructed instances are all passed around the
/// container as [`DynSvc`]s.
pub type DynSvc = Svc<dyn Any>;

/// Implemented automatically on types that are capable of being a service.
pub trait Service: Any {}
impl<T: ?Sized + Any> Service for T {}

/// Wraps a value in a type-erased service pointer.
///
/// ```
/// use config_injector::{svc, Svc};
///
/// let value = svc(12_i32);
/// let value: Svc<i32> = value.downcast().unwrap();
/// assert_eq!(12, *value);
/// ```
pub fn svc<T: Service>(value: T) -> DynSvc {
    Svc::new(value)
}
