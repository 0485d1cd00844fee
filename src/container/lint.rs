use crate::{Container, ExtensionApi, InjectError, LintFuture};
use futures::{
    future::{self, join_all},
    FutureExt,
};
use tracing::debug;

impl Container {
    /// Checks every configured service without resolving anything.
    ///
    /// Each service must have a module loader, an initialiser, a resolver
    /// for each argument and a handler for each extra. Any diagnostics those
    /// extensions report from their lint hooks are collected too. Every
    /// message names the service it is about; a correctly wired
    /// configuration produces no messages.
    #[must_use]
    pub fn lint(&self) -> LintFuture {
        let lints: Vec<LintFuture> = self
            .definitions()
            .iter()
            .flat_map(|(service_id, definition)| {
                let api = ExtensionApi::new(self, service_id, definition.clone());
                self.lint_service(&api)
            })
            .collect();

        async move {
            let messages: Vec<String> = join_all(lints)
                .await
                .into_iter()
                .flatten()
                .filter(|message| !message.is_empty())
                .collect();

            debug!(problems = messages.len(), "linted services");
            messages
        }
        .boxed_local()
    }

    fn lint_service(&self, api: &ExtensionApi) -> Vec<LintFuture> {
        let service = format!("Service '{}'", api.service_id());
        let mut lints = Vec::new();

        lints.push(match self.find_module_loader(api) {
            Some(loader) => prefixed(service.clone(), loader.lint_loader(api)),
            None => found(&service, &InjectError::NoModuleLoader),
        });

        if self.find_initialiser(api).is_none() {
            lints.push(found(&service, &InjectError::NoInitialiser));
        }

        for (index, arg_definition) in
            api.service_definition().args.iter().enumerate()
        {
            let prefix = format!("{} arg [{}]", service, index);
            lints.push(match api.get_arg_resolver(arg_definition) {
                Ok(resolver) => {
                    prefixed(prefix, resolver.lint_arg(arg_definition, api))
                }
                Err(error) => found(&prefix, &error),
            });
        }

        for (index, extra_definition) in
            api.service_definition().extras.iter().enumerate()
        {
            let prefix = format!("{} extra [{}]", service, index);
            lints.push(match self.find_extra_handler(extra_definition, api) {
                Some(handler) => {
                    prefixed(prefix, handler.lint_extra(extra_definition, api))
                }
                None => found(
                    &prefix,
                    &InjectError::NoExtraHandler {
                        extra_definition: extra_definition.clone(),
                    },
                ),
            });
        }

        lints
    }
}

fn found(prefix: &str, error: &InjectError) -> LintFuture {
    future::ready(vec![format!("{}: {}", prefix, error)]).boxed_local()
}

fn prefixed(prefix: String, lint: LintFuture) -> LintFuture {
    lint.map(move |messages| {
        messages
            .into_iter()
            .filter(|message| !message.is_empty())
            .map(|message| format!("{}: {}", prefix, message))
            .collect()
    })
    .boxed_local()
}

#[cfg(test)]
mod tests {
    use crate::{
        extension, no_lint, svc, ArgResolver, Config, Container, DynSvc,
        ExtensionApi, ExtraHandler, InjectResult, Initialised, Initialiser,
        InstanceCreated, LintFuture, ModuleLoader, ResolveFuture,
        ServiceDefinition,
    };
    use futures::{executor::block_on, future, FutureExt};
    use serde_json::Value;

    /// Loads services with a `module` key and complains about an empty one.
    struct Loader;

    impl ModuleLoader for Loader {
        fn can_load_module(&self, api: &ExtensionApi) -> bool {
            api.service_definition().property("module").is_some()
        }

        fn load_module(&self, _api: &ExtensionApi) -> ResolveFuture {
            panic!("lint must not load modules")
        }

        fn lint_loader(&self, api: &ExtensionApi) -> LintFuture {
            let messages = match api.service_definition().str_property("module")
            {
                Some(_) => Vec::new(),
                None => vec!["empty module".to_owned(), String::new()],
            };
            future::ready(messages).boxed_local()
        }
    }

    impl Initialiser for Loader {
        fn can_initialise(&self, _api: &ExtensionApi) -> bool {
            true
        }

        fn initialise(
            &self,
            _instance_created: &InstanceCreated,
            _module: DynSvc,
            _args: Vec<DynSvc>,
        ) -> InjectResult<Initialised> {
            panic!("lint must not initialise services")
        }
    }

    impl ArgResolver for Loader {
        fn can_resolve_arg(&self, arg_definition: &Value) -> bool {
            arg_definition.is_string()
        }

        fn resolve_arg(
            &self,
            _arg_definition: &Value,
            _api: &ExtensionApi,
        ) -> ResolveFuture {
            future::ok(svc(())).boxed_local()
        }

        fn lint_arg(
            &self,
            arg_definition: &Value,
            _api: &ExtensionApi,
        ) -> LintFuture {
            if arg_definition == "bad" {
                future::ready(vec!["bad arg".to_owned()]).boxed_local()
            } else {
                no_lint()
            }
        }
    }

    impl ExtraHandler for Loader {
        fn can_handle_extra(
            &self,
            extra_definition: &Value,
            _api: &ExtensionApi,
        ) -> bool {
            extra_definition == "known"
        }
    }

    extension!(Loader: module_loader, initialiser, arg_resolver, extra_handler);

    fn lint(config: Config) -> Vec<String> {
        let mut builder = Container::builder();
        builder.extend(Loader);
        block_on(builder.build(config).lint())
    }

    #[test]
    fn valid_services_have_no_problems() {
        let problems = lint(
            Config::new().with_service(
                "valid",
                ServiceDefinition::new()
                    .with_property("module", "valid")
                    .with_arg("ok")
                    .with_extra("known"),
            ),
        );

        assert!(problems.is_empty(), "{:?}", problems);
    }

    #[test]
    fn missing_loader_is_reported() {
        let problems = lint(
            Config::new()
                .with_service(
                    "valid",
                    ServiceDefinition::new().with_property("module", "valid"),
                )
                .with_service("invalid", ServiceDefinition::new()),
        );

        assert_eq!(1, problems.len());
        assert!(problems[0].contains("invalid"));
        assert!(problems[0].contains("no module loader"));
    }

    #[test]
    fn loader_diagnostics_are_prefixed_and_compacted() {
        let problems = lint(Config::new().with_service(
            "empty",
            ServiceDefinition::new().with_property("module", ""),
        ));

        assert_eq!(vec!["Service 'empty': empty module".to_owned()], problems);
    }

    #[test]
    fn args_and_extras_are_indexed() {
        let problems = lint(
            Config::new().with_service(
                "svc",
                ServiceDefinition::new()
                    .with_property("module", "svc")
                    .with_arg("ok")
                    .with_arg("bad")
                    .with_arg(12)
                    .with_extra("known")
                    .with_extra("unknown"),
            ),
        );

        assert_eq!(
            vec![
                "Service 'svc' arg [1]: bad arg".to_owned(),
                "Service 'svc' arg [2]: no arg resolver for 12".to_owned(),
                "Service 'svc' extra [1]: no extra handler for unknown"
                    .to_owned(),
            ],
            problems
        );
    }
}
