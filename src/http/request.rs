// Per-call request descriptors.
// Representation, error overrides, and the GET/POST request shapes.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FetchError;

/// Fallback message used when neither the status nor a default is overridden.
pub const FALLBACK_TEMPLATE: &str = "Http request failed with a {status} error";

/// Shape the caller wants the response body materialized as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Representation {
    #[default]
    Json,
    Text,
    Bytes,
    Filename,
}

impl Representation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Representation::Json => "json",
            Representation::Text => "text",
            Representation::Bytes => "bytes",
            Representation::Filename => "filename",
        }
    }
}

impl fmt::Display for Representation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Representation {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(Representation::Json),
            "text" => Ok(Representation::Text),
            "bytes" => Ok(Representation::Bytes),
            "filename" => Ok(Representation::Filename),
            other => Err(FetchError::InvalidRepresentation(other.to_string())),
        }
    }
}

/// Per-call error message templates.
///
/// Templates may contain `{status}` and `{url}` placeholders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorOverrides {
    pub per_status: BTreeMap<u16, String>,
    pub default: Option<String>,
}

impl ErrorOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the message for one status code.
    pub fn status(mut self, status: u16, template: impl Into<String>) -> Self {
        self.per_status.insert(status, template.into());
        self
    }

    /// Override the message for every status without its own entry.
    pub fn default_message(mut self, template: impl Into<String>) -> Self {
        self.default = Some(template.into());
        self
    }

    /// Pick the template for `status` and fill in its placeholders.
    pub fn message_for(&self, status: u16, url: &str) -> String {
        let template = self
            .per_status
            .get(&status)
            .or(self.default.as_ref())
            .map(String::as_str)
            .unwrap_or(FALLBACK_TEMPLATE);

        template
            .replace("{status}", &status.to_string())
            .replace("{url}", url)
    }
}

/// A GET request through the shared getter.
#[derive(Debug, Clone)]
pub struct GetRequest {
    pub url: String,
    pub representation: Representation,
    pub cache: bool,
    pub cache_permanent: bool,
    pub errors: ErrorOverrides,
    pub headers: Option<HashMap<String, String>>,
}

impl GetRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            representation: Representation::default(),
            cache: false,
            cache_permanent: false,
            errors: ErrorOverrides::default(),
            headers: None,
        }
    }

    pub fn representation(mut self, representation: Representation) -> Self {
        self.representation = representation;
        self
    }

    pub fn cache(mut self, cache: bool) -> Self {
        self.cache = cache;
        self
    }

    pub fn cache_permanent(mut self, permanent: bool) -> Self {
        self.cache_permanent = permanent;
        self
    }

    pub fn errors(mut self, errors: ErrorOverrides) -> Self {
        self.errors = errors;
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(HashMap::new)
            .insert(name.into(), value.into());
        self
    }

    /// Whether the response will be cached. Permanence implies caching.
    pub fn uses_cache(&self) -> bool {
        self.cache || self.cache_permanent
    }
}

/// A POST request through the shared getter. Never cached.
#[derive(Debug, Clone)]
pub struct PostRequest {
    pub url: String,
    pub representation: Representation,
    pub errors: ErrorOverrides,
    pub headers: HashMap<String, String>,
    pub body: serde_json::Value,
}

impl PostRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            representation: Representation::default(),
            errors: ErrorOverrides::default(),
            headers: HashMap::new(),
            body: serde_json::Value::Object(Default::default()),
        }
    }

    pub fn representation(mut self, representation: Representation) -> Self {
        self.representation = representation;
        self
    }

    pub fn errors(mut self, errors: ErrorOverrides) -> Self {
        self.errors = errors;
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn body(mut self, body: serde_json::Value) -> Self {
        self.body = body;
        self
    }
}
