//! Configuration driven dependency injection.
//!
//! A [`Container`] resolves services by id from a [`Config`]. Each service
//! definition says which module the service is built from, which args are
//! passed to it and which extras apply to it, but not how any of that is
//! done. That is left to the extensions registered with the container:
//!
//! - [`ModuleLoader`]s load the module a service is built from.
//! - [`ArgResolver`]s turn each arg definition into a value.
//! - [`Initialiser`]s turn the module and args into an instance.
//! - [`ExtraHandler`]s hook into the resolution of a service.
//!
//! For each service the container picks the first registered extension that
//! accepts it, so the order extensions are registered in matters.
//!
//! # Resolution
//!
//! Services are resolved asynchronously and at most once. Requesting a
//! service that is already being resolved waits for that resolution rather
//! than starting another one, and the result is cached for later requests
//! unless an extra asks otherwise (see [`CachePolicy`]). Resolution happens
//! on a single thread, so services are held in [`Svc<T>`] (an `Rc<T>`) and
//! the futures returned by the container are not `Send`. Any executor can
//! drive them.
//!
//! Services can depend on each other through their args. Circular
//! dependencies are detected and reported instead of waiting forever. A
//! service that needs to refer back to one of its dependents can use a
//! `defer:` arg to resolve it later (see [`Deferred`]).
//!
//! # Errors
//!
//! Every failure is reported as a [`ServiceError`] naming the service it
//! happened in. Failures tied to a particular arg are also wrapped in an
//! [`ArgError`] naming the arg. The innermost service and arg are the ones
//! reported, and the original error is kept as the error's source.
//!
//! # Logging
//!
//! The container logs through [`tracing`]. No subscriber is installed.
//!
//! # Example
//!
//! ```
//! use config_injector::{
//!     Config, Container, IntoFactory, ModuleRegistryLoader, Svc,
//! };
//! use futures::executor::block_on;
//! use serde_json::Value;
//!
//! struct Database {
//!     url: String,
//! }
//!
//! struct UserService {
//!     database: Svc<Database>,
//! }
//!
//! fn connect(url: Svc<Value>) -> Database {
//!     Database {
//!         url: url.as_str().unwrap_or_default().to_owned(),
//!     }
//! }
//!
//! fn users(database: Svc<Database>) -> UserService {
//!     UserService { database }
//! }
//!
//! // The modules services can be built from.
//! let modules = ModuleRegistryLoader::new()
//!     .with_module("database", connect.into_factory("database"))
//!     .with_module("users", users.into_factory("users"));
//!
//! // Which services exist, and how they are wired together.
//! let config: Config = r#"{
//!     "services": {
//!         "database": { "module": "database", "args": ["%database.url"] },
//!         "users": { "module": "users", "args": ["@database"] }
//!     },
//!     "params": {
//!         "database": { "url": "postgres://localhost" }
//!     }
//! }"#
//! .parse()
//! .unwrap();
//!
//! let mut builder = Container::builder();
//! builder.add_standard_extensions(modules);
//! let container = builder.build(config);
//!
//! // Nothing is wired incorrectly.
//! assert!(block_on(container.lint()).is_empty());
//!
//! let users: Svc<UserService> = block_on(container.get_as("users")).unwrap();
//! let database: Svc<Database> =
//!     block_on(container.get_as("database")).unwrap();
//! assert!(Svc::ptr_eq(&users.database, &database));
//! assert_eq!("postgres://localhost", database.url);
//! ```

#![forbid(unsafe_code)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::needless_pass_by_value
)]

mod capabilities;
mod config;
mod container;
mod error;
mod extensions;
mod requests;
mod services;

pub use capabilities::*;
pub use config::*;
pub use container::*;
pub use error::*;
pub use extensions::*;
pub use requests::*;
pub use services::*;
