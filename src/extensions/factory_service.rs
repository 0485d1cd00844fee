use crate::{
    extension, get_path, ExtensionApi, InjectError, LintFuture,
    ModuleLoader, ResolveFuture,
};
use futures::{future, FutureExt};

fn factory_service(api: &ExtensionApi) -> Option<(&str, Option<&str>)> {
    let reference = api.service_definition().str_property("factoryService")?;
    Some(match reference.split_once('.') {
        Some((service_id, property)) => (service_id, Some(property)),
        None => (reference, None),
    })
}

/// Uses another service, or one of its properties, as the module of a
/// service.
///
/// `{ "factoryService": "db" }` loads the `db` service, and
/// `{ "factoryService": "db.connect" }` loads its `connect` property. Longer
/// paths such as `db.replicas.connect` are followed one property at a time
/// (see [`get_path`]).
pub struct FactoryServiceLoader;

impl ModuleLoader for FactoryServiceLoader {
    fn can_load_module(&self, api: &ExtensionApi) -> bool {
        factory_service(api).is_some()
    }

    fn load_module(&self, api: &ExtensionApi) -> ResolveFuture {
        let (service_id, property) = match factory_service(api) {
            Some(reference) => reference,
            None => {
                return future::err(InjectError::MissingProperty {
                    property: "factoryService".to_owned(),
                })
                .boxed_local()
            }
        };

        let property = property.map(str::to_owned);
        let service = api.container().get(service_id);

        async move {
            let service = service.await?;
            match property {
                None => Ok(service),
                Some(property) => get_path(&service, &property)
                    .ok_or(InjectError::MissingProperty { property }),
            }
        }
        .boxed_local()
    }

    fn lint_loader(&self, api: &ExtensionApi) -> LintFuture {
        let messages = match factory_service(api) {
            Some((service_id, _))
                if !api.container().config().services.contains_key(service_id) =>
            {
                vec![format!(
                    "Missing definition for factory service '{}'",
                    service_id
                )]
            }
            _ => Vec::new(),
        };

        future::ready(messages).boxed_local()
    }
}

extension!(FactoryServiceLoader: module_loader);
