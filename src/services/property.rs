use crate::{svc, DynSvc, ModuleExports, Structured};
use serde_json::Value;

/// Gets a named property of a service.
///
/// Properties are the exports of a [`ModuleExports`], the keys or indices of
/// a [`serde_json::Value`] and the children of a [`Structured`] tree. Other
/// values have no properties.
#[must_use]
pub fn get_property(value: &DynSvc, name: &str) -> Option<DynSvc> {
    if let Some(exports) = value.downcast_ref::<ModuleExports>() {
        return exports.get(name).cloned();
    }

    if let Some(value) = value.downcast_ref::<Value>() {
        let child = match value {
            Value::Object(map) => map.get(name),
            Value::Array(items) => {
                name.parse::<usize>().ok().and_then(|index| items.get(index))
            }
            _ => None,
        };
        return child.cloned().map(svc);
    }

    if let Some(tree) = value.downcast_ref::<Structured>() {
        return tree.child(name).map(Structured::to_svc);
    }

    None
}

/// Gets a property of a service by a dotted path. An empty path returns the
/// service itself.
#[must_use]
pub fn get_path(value: &DynSvc, path: &str) -> Option<DynSvc> {
    if path.is_empty() {
        return Some(value.clone());
    }

    path.split('.')
        .try_fold(value.clone(), |value, name| get_property(&value, name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Svc;
    use serde_json::json;

    #[test]
    fn exports_are_properties() {
        let module: DynSvc =
            svc(ModuleExports::new().with_export("answer", 42_u32));

        let answer = get_property(&module, "answer").unwrap();
        assert_eq!(Some(&42), answer.downcast_ref::<u32>());
        assert!(get_property(&module, "question").is_none());
    }

    #[test]
    fn json_paths_are_followed() {
        let value: DynSvc = svc(json!({ "a": { "b": [1, 2, 3] } }));

        let found = get_path(&value, "a.b.2").unwrap();
        assert_eq!(Some(&json!(3)), found.downcast_ref::<Value>());
        assert!(get_path(&value, "a.c").is_none());
    }

    #[test]
    fn nested_modules_are_followed() {
        let inner = ModuleExports::new().with_export("value", "inner");
        let outer: DynSvc = svc(ModuleExports::new().with_export("inner", inner));

        let found = get_path(&outer, "inner.value").unwrap();
        assert_eq!(Some(&"inner"), found.downcast_ref::<&str>());
    }

    #[test]
    fn opaque_values_have_no_properties() {
        let value: DynSvc = svc(5_i64);
        assert!(get_property(&value, "anything").is_none());
        assert!(Svc::ptr_eq(&value, &get_path(&value, "").unwrap()));
    }
}
