use crate::{
    extension, get_path, svc, DynSvc, Extension, ExtensionApi, InjectError,
    LintFuture, ModuleExports, ModuleLoader, ResolveFuture, Service,
};
use futures::{future, FutureExt, TryFutureExt};
use indexmap::IndexMap;
use std::rc::Rc;

/// Loads modules from a registry of named modules.
///
/// `{ "module": "http" }` loads the module registered as `http`, and
/// `{ "module": "http.Server" }` loads its `Server` property (see
/// [`get_property`](crate::get_property)).
#[derive(Clone, Default)]
pub struct ModuleRegistryLoader {
    modules: IndexMap<String, DynSvc>,
}

impl ModuleRegistryLoader {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        ModuleRegistryLoader::default()
    }

    /// Registers a module.
    #[must_use]
    pub fn with_module<T: Service>(
        self,
        path: impl Into<String>,
        module: T,
    ) -> Self {
        self.with_module_svc(path, svc(module))
    }

    /// Registers a module that is already a service pointer.
    #[must_use]
    pub fn with_module_svc(
        mut self,
        path: impl Into<String>,
        module: DynSvc,
    ) -> Self {
        self.modules.insert(path.into(), module);
        self
    }

    /// Registers a module made of named exports.
    #[must_use]
    pub fn with_exports(
        self,
        path: impl Into<String>,
        exports: ModuleExports,
    ) -> Self {
        self.with_module(path, exports)
    }

    /// Gets a registered module.
    #[must_use]
    pub fn module(&self, path: &str) -> Option<&DynSvc> {
        self.modules.get(path)
    }
}

fn module_path(api: &ExtensionApi) -> Option<(&str, &str)> {
    let path = api.service_definition().str_property("module")?;
    Some(path.split_once('.').unwrap_or((path, "")))
}

impl ModuleLoader for ModuleRegistryLoader {
    fn can_load_module(&self, api: &ExtensionApi) -> bool {
        module_path(api).is_some()
    }

    fn load_module(&self, api: &ExtensionApi) -> ResolveFuture {
        let result = module_path(api)
            .ok_or_else(|| InjectError::MissingProperty {
                property: "module".to_owned(),
            })
            .and_then(|(path, export)| {
                let module = self.module(path).ok_or_else(|| {
                    InjectError::MissingModule {
                        path: path.to_owned(),
                    }
                })?;

                get_path(module, export).ok_or_else(|| {
                    InjectError::MissingProperty {
                        property: export.to_owned(),
                    }
                })
            });

        future::ready(result).boxed_local()
    }

    fn lint_loader(&self, api: &ExtensionApi) -> LintFuture {
        let messages = match module_path(api) {
            Some((path, _)) if self.module(path).is_none() => {
                vec![format!("Missing module '{}'", path)]
            }
            _ => Vec::new(),
        };

        future::ready(messages).boxed_local()
    }
}

extension!(ModuleRegistryLoader: module_loader);

/// Unwraps the `default` export of modules loaded by another loader.
/// Modules without a `default` export are passed through unchanged.
pub struct DefaultExportDecorator<L> {
    decorated: L,
}

impl<L: ModuleLoader> DefaultExportDecorator<L> {
    /// Decorates a module loader.
    pub fn new(decorated: L) -> Self {
        DefaultExportDecorator { decorated }
    }

    /// The decorated loader.
    pub fn decorated(&self) -> &L {
        &self.decorated
    }
}

impl<L: ModuleLoader> ModuleLoader for DefaultExportDecorator<L> {
    fn can_load_module(&self, api: &ExtensionApi) -> bool {
        self.decorated.can_load_module(api)
    }

    fn load_module(&self, api: &ExtensionApi) -> ResolveFuture {
        self.decorated
            .load_module(api)
            .map_ok(|module| {
                let default = module
                    .downcast_ref::<ModuleExports>()
                    .and_then(ModuleExports::default_export)
                    .cloned();
                default.unwrap_or(module)
            })
            .boxed_local()
    }

    fn lint_loader(&self, api: &ExtensionApi) -> LintFuture {
        self.decorated.lint_loader(api)
    }
}

impl<L: ModuleLoader + 'static> Extension for DefaultExportDecorator<L> {
    fn module_loader(self: Rc<Self>) -> Option<Rc<dyn ModuleLoader>> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Config, Container, ServiceDefinition};
    use futures::executor::block_on;

    fn api(container: &Container, module: &str) -> ExtensionApi {
        ExtensionApi::new(
            container,
            "svc",
            Rc::new(ServiceDefinition::new().with_property("module", module)),
        )
    }

    fn registry() -> ModuleRegistryLoader {
        ModuleRegistryLoader::new()
            .with_module("answer", 42_u32)
            .with_exports(
                "es6",
                ModuleExports::new()
                    .with_export("default", "default export")
                    .with_export("named", "named export"),
            )
    }

    #[test]
    fn modules_and_exports_are_loaded() {
        let container = Container::builder().build(Config::new());
        let loader = registry();

        let answer = block_on(loader.load_module(&api(&container, "answer")));
        assert_eq!(Some(&42), answer.unwrap().downcast_ref::<u32>());

        let named = block_on(loader.load_module(&api(&container, "es6.named")));
        assert_eq!(
            Some(&"named export"),
            named.unwrap().downcast_ref::<&str>()
        );
    }

    #[test]
    fn missing_modules_fail_and_lint() {
        let container = Container::builder().build(Config::new());
        let loader = registry();
        let api = api(&container, "nope.thing");

        assert!(matches!(
            block_on(loader.load_module(&api)),
            Err(InjectError::MissingModule { path }) if path == "nope"
        ));
        assert_eq!(
            vec!["Missing module 'nope'".to_owned()],
            block_on(loader.lint_loader(&api))
        );
    }

    #[test]
    fn missing_export_fails() {
        let container = Container::builder().build(Config::new());
        let result =
            block_on(registry().load_module(&api(&container, "es6.other")));

        assert!(matches!(
            result,
            Err(InjectError::MissingProperty { property }) if property == "other"
        ));
    }

    #[test]
    fn default_export_is_unwrapped() {
        let container = Container::builder().build(Config::new());
        let loader = DefaultExportDecorator::new(registry());

        let es6 = block_on(loader.load_module(&api(&container, "es6"))).unwrap();
        assert_eq!(Some(&"default export"), es6.downcast_ref::<&str>());

        let answer =
            block_on(loader.load_module(&api(&container, "answer"))).unwrap();
        assert_eq!(Some(&42), answer.downcast_ref::<u32>());
    }

    #[test]
    fn decorator_forwards_lint() {
        let container = Container::builder().build(Config::new());
        let loader = DefaultExportDecorator::new(registry());

        let messages = block_on(loader.lint_loader(&api(&container, "nope")));
        assert_eq!(1, messages.len());
    }
}
