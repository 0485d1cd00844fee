use crate::{
    extension, DynSvc, ExtensionApi, InjectError, InjectResult, Initialised,
    Initialiser, InstanceCreated, ModuleLoader, ResolveFuture,
};
use futures::{future, FutureExt};

/// Defines a service as another name for an argument.
///
/// `{ "alias": "@logger" }` resolves to whatever the arg `@logger` resolves
/// to. Instance-created hooks are not run for aliases, since the instance
/// belongs to whatever the alias points at.
pub struct AliasExtension;

impl ModuleLoader for AliasExtension {
    fn can_load_module(&self, api: &ExtensionApi) -> bool {
        api.service_definition().has_property("alias")
    }

    fn load_module(&self, api: &ExtensionApi) -> ResolveFuture {
        match api.service_definition().property("alias") {
            Some(alias) => api.resolve_arg(alias),
            None => future::err(InjectError::MissingProperty {
                property: "alias".to_owned(),
            })
            .boxed_local(),
        }
    }
}

impl Initialiser for AliasExtension {
    fn can_initialise(&self, api: &ExtensionApi) -> bool {
        api.service_definition().has_property("alias")
    }

    fn initialise(
        &self,
        _instance_created: &InstanceCreated,
        module: DynSvc,
        _args: Vec<DynSvc>,
    ) -> InjectResult<Initialised> {
        Ok(module.into())
    }
}

extension!(AliasExtension: module_loader, initialiser);
