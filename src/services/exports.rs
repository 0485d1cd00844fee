use crate::{svc, DynSvc, Service};
use indexmap::IndexMap;

/// A module made of named exports, such as the modules registered with a
/// [`ModuleRegistryLoader`](crate::ModuleRegistryLoader).
///
/// `module: "path.export"` and `@service.export` both navigate into the
/// exports by name. The export named `default` is unwrapped by
/// [`DefaultExportDecorator`](crate::DefaultExportDecorator).
#[derive(Clone, Default)]
pub struct ModuleExports {
    exports: IndexMap<String, DynSvc>,
}

impl ModuleExports {
    /// Creates a module with no exports.
    #[must_use]
    pub fn new() -> Self {
        ModuleExports::default()
    }

    /// Adds an export.
    #[must_use]
    pub fn with_export<T: Service>(
        self,
        name: impl Into<String>,
        value: T,
    ) -> Self {
        self.with_export_svc(name, svc(value))
    }

    /// Adds an export that is already a service pointer.
    #[must_use]
    pub fn with_export_svc(
        mut self,
        name: impl Into<String>,
        value: DynSvc,
    ) -> Self {
        self.exports.insert(name.into(), value);
        self
    }

    /// Gets an export by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&DynSvc> {
        self.exports.get(name)
    }

    /// Gets the `default` export.
    #[must_use]
    pub fn default_export(&self) -> Option<&DynSvc> {
        self.get("default")
    }

    /// Iterates the exports in the order they were added.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &DynSvc)> {
        self.exports.iter().map(|(name, value)| (name.as_str(), value))
    }
}

impl<N: Into<String>> FromIterator<(N, DynSvc)> for ModuleExports {
    fn from_iter<I: IntoIterator<Item = (N, DynSvc)>>(iter: I) -> Self {
        ModuleExports {
            exports: iter
                .into_iter()
                .map(|(name, value)| (name.into(), value))
                .collect(),
        }
    }
}
