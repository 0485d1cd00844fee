use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;

/// The configuration a [`Container`](crate::Container) resolves services
/// from. It is fixed for the lifetime of the container.
///
/// Configurations can be built in code, or deserialized from any format
/// supported by `serde`:
///
/// ```
/// use config_injector::Config;
///
/// let config: Config = r#"{
///     "services": {
///         "greeting": { "module": "greeting", "args": ["%name"] }
///     },
///     "params": { "name": "world" }
/// }"#
/// .parse()
/// .unwrap();
///
/// assert!(config.services.contains_key("greeting"));
/// assert_eq!(Some(&serde_json::json!("world")), config.param("name"));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// The service definitions, keyed by service id.
    #[serde(default)]
    pub services: IndexMap<String, ServiceDefinition>,

    /// Free-form parameters, usually looked up with `%path.to.param` args.
    #[serde(default)]
    pub params: Value,
}

impl Config {
    /// Creates an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Config::default()
    }

    /// Adds a service definition, replacing any existing definition with the
    /// same id.
    #[must_use]
    pub fn with_service(
        mut self,
        service_id: impl Into<String>,
        definition: ServiceDefinition,
    ) -> Self {
        self.services.insert(service_id.into(), definition);
        self
    }

    /// Replaces the parameters.
    #[must_use]
    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }

    /// Looks up a parameter by a dotted path.
    #[must_use]
    pub fn param(&self, path: &str) -> Option<&Value> {
        value_at_path(&self.params, path)
    }
}

impl FromStr for Config {
    type Err = serde_json::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_str(s)
    }
}

/// The recipe for one service.
///
/// The container itself only looks at `args` and `extras`. Every other key
/// (`module`, `init`, `alias`, ...) is kept in `properties` and interpreted by
/// whichever extension claims the service.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceDefinition {
    /// Argument definitions, resolved in order and passed to the
    /// initialiser after the loaded module.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<Value>,

    /// Extra definitions, each handled by an extra handler.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extras: Vec<Value>,

    /// Extension-specific keys.
    #[serde(flatten)]
    pub properties: Map<String, Value>,
}

impl ServiceDefinition {
    /// Creates an empty definition.
    #[must_use]
    pub fn new() -> Self {
        ServiceDefinition::default()
    }

    /// Appends an argument definition.
    #[must_use]
    pub fn with_arg(mut self, arg_definition: impl Into<Value>) -> Self {
        self.args.push(arg_definition.into());
        self
    }

    /// Appends an extra definition.
    #[must_use]
    pub fn with_extra(mut self, extra_definition: impl Into<Value>) -> Self {
        self.extras.push(extra_definition.into());
        self
    }

    /// Sets an extension-specific key.
    #[must_use]
    pub fn with_property(
        mut self,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Gets an extension-specific key.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Gets an extension-specific key if it holds a non-empty string.
    #[must_use]
    pub fn str_property(&self, key: &str) -> Option<&str> {
        self.property(key)
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
    }

    /// Checks whether an extension-specific key is set to anything other
    /// than `null`, `false`, `0` or an empty string.
    #[must_use]
    pub fn has_property(&self, key: &str) -> bool {
        self.property(key).map_or(false, is_truthy)
    }

    /// The `init` discriminator, used to choose an initialiser.
    #[must_use]
    pub fn init(&self) -> Option<&str> {
        self.str_property("init")
    }
}

/// Looks up a value by a dotted path. Objects are indexed by key and arrays
/// by position. An empty path returns the value itself.
#[must_use]
pub fn value_at_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(value);
    }

    path.split('.').try_fold(value, |value, segment| match value {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => {
            segment.parse::<usize>().ok().and_then(|index| items.get(index))
        }
        _ => None,
    })
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(value) => *value,
        Value::Number(number) => number.as_f64().map_or(true, |n| n != 0.0),
        Value::String(value) => !value.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extension_keys_are_kept_as_properties() {
        let definition: ServiceDefinition = serde_json::from_value(json!({
            "module": "http.Server",
            "init": "constructor",
            "args": ["@logger", "%http.port"],
            "extras": ["no-cache"]
        }))
        .unwrap();

        assert_eq!(vec![json!("@logger"), json!("%http.port")], definition.args);
        assert_eq!(vec![json!("no-cache")], definition.extras);
        assert_eq!(Some("http.Server"), definition.str_property("module"));
        assert_eq!(Some("constructor"), definition.init());
        assert!(definition.property("args").is_none());
    }

    #[test]
    fn builder_matches_deserialized_definition() {
        let built = ServiceDefinition::new()
            .with_property("alias", "@other")
            .with_arg("true")
            .with_extra(json!({ "subscribe": "ready" }));
        let parsed: ServiceDefinition = serde_json::from_value(json!({
            "alias": "@other",
            "args": ["true"],
            "extras": [{ "subscribe": "ready" }]
        }))
        .unwrap();

        assert_eq!(parsed, built);
    }

    #[test]
    fn params_are_found_by_path() {
        let config = Config::new().with_params(json!({
            "http": { "port": 8080, "hosts": ["a", "b"] }
        }));

        assert_eq!(Some(&json!(8080)), config.param("http.port"));
        assert_eq!(Some(&json!("b")), config.param("http.hosts.1"));
        assert_eq!(None, config.param("http.missing"));
        assert_eq!(None, config.param("http.port.deeper"));
    }

    #[test]
    fn falsy_properties_are_not_set() {
        let definition = ServiceDefinition::new()
            .with_property("a", "")
            .with_property("b", false)
            .with_property("c", Value::Null)
            .with_property("d", "x");

        assert!(!definition.has_property("a"));
        assert!(!definition.has_property("b"));
        assert!(!definition.has_property("c"));
        assert!(definition.has_property("d"));
        assert!(!definition.has_property("e"));
    }

    #[test]
    fn services_keep_their_order() {
        let config: Config = r#"{ "services": { "b": {}, "a": {}, "c": {} } }"#
            .parse()
            .unwrap();
        let ids: Vec<_> = config.services.keys().map(String::as_str).collect();
        assert_eq!(vec!["b", "a", "c"], ids);
    }
}
