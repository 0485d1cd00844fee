use crate::{extension, CachePolicy, ExtensionApi, ExtraHandler};
use serde_json::Value;

/// Handles the `"no-cache"` extra. Services with it are resolved again for
/// every request made after their previous resolution settled.
pub struct NoCacheExtension;

impl ExtraHandler for NoCacheExtension {
    fn can_handle_extra(
        &self,
        extra_definition: &Value,
        _api: &ExtensionApi,
    ) -> bool {
        extra_definition == "no-cache"
    }

    fn cache_policy(
        &self,
        _extra_definition: &Value,
        _api: &ExtensionApi,
    ) -> CachePolicy {
        CachePolicy::NoCache
    }
}

extension!(NoCacheExtension: extra_handler);
