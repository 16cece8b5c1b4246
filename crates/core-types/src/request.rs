use std::collections::HashMap;

/// Config of the API operation being invoked, as resolved by the host
/// framework's method dispatch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub http_method: String,
    pub api_version: String,
}

impl MethodDescriptor {
    pub fn new(http_method: impl Into<String>, api_version: impl Into<String>) -> Self {
        Self {
            http_method: http_method.into(),
            api_version: api_version.into(),
        }
    }
}

/// Read-only view of the raw request. Query parameters are single-valued;
/// repeated parameters keep their first occurrence, matching the host
/// framework's accessor.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestInfo {
    pub path: String,
    /// Mount point the API is served under, when it is exposed on several
    /// paths at once.
    pub base_path: String,
    pub query: HashMap<String, String>,
}

impl RequestInfo {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            base_path: String::new(),
            query: HashMap::new(),
        }
    }

    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self
    }

    pub fn with_query_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }
}
