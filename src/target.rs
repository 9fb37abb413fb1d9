//! Mapping from request identifiers to target URLs.

use serde::{Deserialize, Serialize};

use crate::error::{Result, VolleyError};
use crate::fetch::RequestId;

/// Placeholder replaced by the request identifier.
pub const ID_PLACEHOLDER: &str = "{id}";

/// Endpoint fetched when no template is configured.
pub const DEFAULT_URL_TEMPLATE: &str = "https://jsonplaceholder.typicode.com/photos/{id}";

/// A URL pattern parameterized by a request identifier.
///
/// Building is pure and deterministic: the same id always yields the same URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UrlTemplate {
    template: String,
}

impl UrlTemplate {
    /// Parse a template, checking that it has exactly one `{id}` placeholder and
    /// that substituting an id produces an absolute URL.
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let template = template.into();

        match template.matches(ID_PLACEHOLDER).count() {
            1 => {}
            n => {
                return Err(VolleyError::InvalidUrlTemplate(format!(
                    "expected exactly one {ID_PLACEHOLDER} placeholder in '{template}', found {n}"
                )));
            }
        }

        let probe = template.replace(ID_PLACEHOLDER, "0");
        url::Url::parse(&probe)
            .map_err(|e| VolleyError::InvalidUrlTemplate(format!("'{template}': {e}")))?;

        Ok(Self { template })
    }

    /// Build the URL for `id`.
    pub fn build(&self, id: RequestId) -> String {
        self.template.replace(ID_PLACEHOLDER, &id.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }
}

impl Default for UrlTemplate {
    fn default() -> Self {
        Self {
            template: DEFAULT_URL_TEMPLATE.to_string(),
        }
    }
}

impl TryFrom<String> for UrlTemplate {
    type Error = VolleyError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<UrlTemplate> for String {
    fn from(value: UrlTemplate) -> Self {
        value.template
    }
}
