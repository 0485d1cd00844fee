use crate::{
    extension, svc, DynSvc, ExtensionApi, InjectError, InjectResult,
    Initialised, Initialiser, InstanceCreated, ModuleLoader, ResolveFuture,
    Service, Svc,
};
use futures::{future, FutureExt, TryFutureExt};
use indexmap::IndexMap;
use serde_json::Value;

/// A tree of resolved arguments, shaped like the `structuredArg` it was
/// resolved from.
#[derive(Clone)]
pub enum Structured {
    /// A resolved argument.
    Leaf(DynSvc),

    /// A resolved array.
    Seq(Vec<Structured>),

    /// A resolved object, keeping the key order of the definition.
    Map(IndexMap<String, Structured>),
}

impl Structured {
    /// Gets a child by key, or by index for sequences.
    #[must_use]
    pub fn child(&self, key: &str) -> Option<&Structured> {
        match self {
            Structured::Leaf(_) => None,
            Structured::Seq(items) => {
                key.parse::<usize>().ok().and_then(|index| items.get(index))
            }
            Structured::Map(entries) => entries.get(key),
        }
    }

    /// Gets the value of a leaf.
    #[must_use]
    pub fn leaf(&self) -> Option<&DynSvc> {
        match self {
            Structured::Leaf(value) => Some(value),
            _ => None,
        }
    }

    /// Gets the value of a leaf as a concrete type.
    #[must_use]
    pub fn leaf_as<T: Service>(&self) -> Option<Svc<T>> {
        self.leaf().cloned().and_then(|value| value.downcast().ok())
    }

    /// Converts this node into a service pointer. Leaves are unwrapped;
    /// sequences and maps are wrapped as a `Structured`.
    #[must_use]
    pub fn to_svc(&self) -> DynSvc {
        match self {
            Structured::Leaf(value) => value.clone(),
            node => svc(node.clone()),
        }
    }

    fn build(
        definition: &Value,
        resolved: &mut impl Iterator<Item = DynSvc>,
    ) -> InjectResult<Self> {
        match definition {
            Value::Array(items) => items
                .iter()
                .map(|item| Structured::build(item, resolved))
                .collect::<InjectResult<_>>()
                .map(Structured::Seq),
            Value::Object(entries) => entries
                .iter()
                .map(|(key, item)| {
                    Ok((key.clone(), Structured::build(item, resolved)?))
                })
                .collect::<InjectResult<_>>()
                .map(Structured::Map),
            _ => resolved.next().map(Structured::Leaf).ok_or_else(|| {
                InjectError::msg("structured arg has fewer values than leaves")
            }),
        }
    }
}

fn collect_leaves<'a>(definition: &'a Value, leaves: &mut Vec<&'a Value>) {
    match definition {
        Value::Array(items) => {
            items.iter().for_each(|item| collect_leaves(item, leaves));
        }
        Value::Object(entries) => {
            entries.values().for_each(|item| collect_leaves(item, leaves));
        }
        leaf => leaves.push(leaf),
    }
}

/// Defines a service as a tree of args, every leaf of which is resolved.
///
/// ```json
/// { "structuredArg": { "key": "@arg1", "more": ["@arg2", "%arg3"] } }
/// ```
///
/// The service is a [`Structured`] tree with the same shape.
pub struct StructuredArgExtension;

impl ModuleLoader for StructuredArgExtension {
    fn can_load_module(&self, api: &ExtensionApi) -> bool {
        api.service_definition().has_property("structuredArg")
    }

    fn load_module(&self, api: &ExtensionApi) -> ResolveFuture {
        let definition = match api.service_definition().property("structuredArg")
        {
            Some(definition) => definition.clone(),
            None => {
                return future::err(InjectError::MissingProperty {
                    property: "structuredArg".to_owned(),
                })
                .boxed_local()
            }
        };

        let mut leaves = Vec::new();
        collect_leaves(&definition, &mut leaves);
        let resolved = future::try_join_all(api.resolve_args(leaves));

        resolved
            .and_then(move |resolved| {
                let tree =
                    Structured::build(&definition, &mut resolved.into_iter());
                future::ready(tree.map(svc))
            })
            .boxed_local()
    }
}

impl Initialiser for StructuredArgExtension {
    fn can_initialise(&self, api: &ExtensionApi) -> bool {
        self.can_load_module(api)
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

extension!(StructuredArgExtension: module_loader, initialiser);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn leaves_are_collected_in_order() {
        let definition = json!({ "a": "@one", "b": ["@two", { "c": "%three" }] });
        let mut leaves = Vec::new();
        collect_leaves(&definition, &mut leaves);

        assert_eq!(
            vec![&json!("@one"), &json!("@two"), &json!("%three")],
            leaves
        );
    }

    #[test]
    fn tree_keeps_its_shape() {
        let definition = json!({ "a": "x", "b": ["y", "z"], "c": {} });
        let resolved = vec![svc(1_u8), svc(2_u8), svc(3_u8)];
        let tree =
            Structured::build(&definition, &mut resolved.into_iter()).unwrap();

        let a = tree.child("a").and_then(Structured::leaf_as::<u8>).unwrap();
        assert_eq!(1, *a);

        let b = tree.child("b").unwrap();
        let z = b.child("1").and_then(Structured::leaf_as::<u8>).unwrap();
        assert_eq!(3, *z);

        assert!(matches!(
            tree.child("c"),
            Some(Structured::Map(map)) if map.is_empty()
        ));
        assert!(tree.child("d").is_none());
    }
}
