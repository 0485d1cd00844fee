use crate::{
    extension, get_path, svc, ArgResolver, ExtensionApi, Factory, InjectError,
    LintFuture, ResolveFuture,
};
use futures::{future, FutureExt};
use serde_json::Value;

fn with_prefix<'a>(arg_definition: &'a Value, prefix: &str) -> Option<&'a str> {
    arg_definition.as_str()?.strip_prefix(prefix)
}

/// Resolves a few common args:
///
/// - `container`: the [`Container`](crate::Container) resolving the service
/// - `emptyString`: an empty string [`Value`]
/// - `true` and `false`: boolean [`Value`]s
/// - `noop`: [`Factory::noop`]
pub struct CommonArgResolver;

impl ArgResolver for CommonArgResolver {
    fn can_resolve_arg(&self, arg_definition: &Value) -> bool {
        matches!(
            arg_definition.as_str(),
            Some("container" | "emptyString" | "true" | "false" | "noop")
        )
    }

    fn resolve_arg(
        &self,
        arg_definition: &Value,
        api: &ExtensionApi,
    ) -> ResolveFuture {
        let resolved = match arg_definition.as_str() {
            Some("container") => Ok(svc(api.container().clone())),
            Some("emptyString") => Ok(svc(Value::from(""))),
            Some("true") => Ok(svc(Value::Bool(true))),
            Some("false") => Ok(svc(Value::Bool(false))),
            Some("noop") => Ok(svc(Factory::noop())),
            _ => Err(InjectError::NoArgResolver {
                arg_definition: arg_definition.clone(),
            }),
        };

        future::ready(resolved).boxed_local()
    }
}

extension!(CommonArgResolver: arg_resolver);

/// Resolves `@service` to another service, and `@service.path` to a
/// property of another service (see [`get_path`]).
pub struct ServiceArgResolver;

impl ArgResolver for ServiceArgResolver {
    fn can_resolve_arg(&self, arg_definition: &Value) -> bool {
        with_prefix(arg_definition, "@").is_some()
    }

    fn resolve_arg(
        &self,
        arg_definition: &Value,
        api: &ExtensionApi,
    ) -> ResolveFuture {
        let reference = with_prefix(arg_definition, "@").unwrap_or_default();
        let (service_id, path) =
            reference.split_once('.').unwrap_or((reference, ""));
        let path = path.to_owned();
        let service = api.container().get(service_id);

        async move {
            let service = service.await?;
            get_path(&service, &path)
                .ok_or(InjectError::MissingProperty { property: path })
        }
        .boxed_local()
    }

    fn lint_arg(
        &self,
        arg_definition: &Value,
        api: &ExtensionApi,
    ) -> LintFuture {
        let reference = with_prefix(arg_definition, "@").unwrap_or_default();
        let service_id = reference.split('.').next().unwrap_or_default();
        let services = &api.container().config().services;
        let messages = if services.contains_key(service_id) {
            Vec::new()
        } else {
            vec![format!("Missing definition for service '{}'", service_id)]
        };

        future::ready(messages).boxed_local()
    }
}

extension!(ServiceArgResolver: arg_resolver);

/// Resolves `%path.to.param` to a [`Value`] from the configuration's params.
/// Missing params resolve to [`Value::Null`].
pub struct ParamArgResolver;

impl ArgResolver for ParamArgResolver {
    fn can_resolve_arg(&self, arg_definition: &Value) -> bool {
        with_prefix(arg_definition, "%").is_some()
    }

    fn resolve_arg(
        &self,
        arg_definition: &Value,
        api: &ExtensionApi,
    ) -> ResolveFuture {
        let path = with_prefix(arg_definition, "%").unwrap_or_default();
        let param = api
            .container()
            .config()
            .param(path)
            .cloned()
            .unwrap_or_default();

        future::ok(svc(param)).boxed_local()
    }

    fn lint_arg(
        &self,
        arg_definition: &Value,
        api: &ExtensionApi,
    ) -> LintFuture {
        let path = with_prefix(arg_definition, "%").unwrap_or_default();
        let messages = match api.container().config().param(path) {
            Some(_) => Vec::new(),
            None => vec![format!("Missing param '{}'", path)],
        };

        future::ready(messages).boxed_local()
    }
}

extension!(ParamArgResolver: arg_resolver);
