use std::fmt;
use std::str::FromStr;

use bson::{Bson, Document};

use crate::error::OperationError;

/// Container a decoded root document is materialized into.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Root {
    /// Ordered key/value pairs, in the order the keys arrived on the wire.
    Array,
    /// A structured record keyed by field name.
    #[default]
    Object,
}

impl Root {
    pub fn as_str(&self) -> &'static str {
        match self {
            Root::Array => "array",
            Root::Object => "object",
        }
    }
}

impl fmt::Display for Root {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Root {
    type Err = OperationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "array" => Ok(Root::Array),
            "object" => Ok(Root::Object),
            other => Err(OperationError::invalid(format!(
                "unknown type map root `{other}`"
            ))),
        }
    }
}

/// Caller policy for materializing reply documents.
///
/// Only the root container is configurable. An unset root falls back to
/// [`Root::Object`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeMap {
    root: Option<Root>,
}

impl TypeMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(root: Root) -> Self {
        Self { root: Some(root) }
    }

    /// Effective root container.
    pub fn root(&self) -> Root {
        self.root.unwrap_or_default()
    }

    /// Whether the root was set explicitly.
    pub fn is_default(&self) -> bool {
        self.root.is_none()
    }
}

impl TryFrom<&Document> for TypeMap {
    type Error = OperationError;

    fn try_from(doc: &Document) -> Result<Self, Self::Error> {
        let mut map = TypeMap::new();
        for (key, value) in doc {
            match key.as_str() {
                "root" => {
                    map.root = match value {
                        Bson::Null => None,
                        Bson::String(s) => Some(s.parse()?),
                        other => {
                            return Err(OperationError::invalid(format!(
                                "type map root must be a string, got {:?}",
                                other.element_type()
                            )));
                        }
                    }
                }
                "document" | "field" => {
                    return Err(OperationError::invalid(format!(
                        "type map key `{key}` is not supported"
                    )));
                }
                other => {
                    return Err(OperationError::invalid(format!(
                        "unknown type map key `{other}`"
                    )));
                }
            }
        }
        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn default_root_is_object() {
        assert_eq!(TypeMap::new().root(), Root::Object);
        assert!(TypeMap::new().is_default());
    }

    #[test]
    fn parses_root_from_document() {
        let map = TypeMap::try_from(&doc! { "root": "array" }).unwrap();
        assert_eq!(map.root(), Root::Array);

        let map = TypeMap::try_from(&doc! { "root": Bson::Null }).unwrap();
        assert!(map.is_default());
    }

    #[test]
    fn rejects_unknown_root_and_keys() {
        assert!(TypeMap::try_from(&doc! { "root": "stdClass" }).is_err());
        assert!(TypeMap::try_from(&doc! { "root": 1 }).is_err());
        assert!(TypeMap::try_from(&doc! { "document": "array" }).is_err());
        assert!(TypeMap::try_from(&doc! { "colour": "blue" }).is_err());
    }
}
