use bson::{Bson, Document, JavaScriptCodeWithScope};

use crate::error::OperationError;

/// Server-side function source, optionally paired with scope bindings.
///
/// The driver never runs this; it is forwarded to the server as a BSON
/// `JavaScriptCode` (or `JavaScriptCodeWithScope` when a scope is set).
#[derive(Debug, Clone, PartialEq)]
pub struct Javascript {
    code: String,
    scope: Option<Document>,
}

impl Javascript {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            scope: None,
        }
    }

    pub fn with_scope(code: impl Into<String>, scope: Document) -> Self {
        Self {
            code: code.into(),
            scope: Some(scope),
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn scope(&self) -> Option<&Document> {
        self.scope.as_ref()
    }
}

impl From<Javascript> for Bson {
    fn from(js: Javascript) -> Self {
        match js.scope {
            None => Bson::JavaScriptCode(js.code),
            Some(scope) => Bson::JavaScriptCodeWithScope(JavaScriptCodeWithScope {
                code: js.code,
                scope,
            }),
        }
    }
}

impl TryFrom<Bson> for Javascript {
    type Error = OperationError;

    fn try_from(value: Bson) -> Result<Self, Self::Error> {
        match value {
            Bson::String(code) | Bson::JavaScriptCode(code) => Ok(Self::new(code)),
            Bson::JavaScriptCodeWithScope(js) => Ok(Self::with_scope(js.code, js.scope)),
            other => Err(OperationError::invalid(format!(
                "expected code, got {:?}",
                other.element_type()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn plain_code_renders_without_scope() {
        let bson = Bson::from(Javascript::new("function(doc) end"));
        assert_eq!(bson, Bson::JavaScriptCode("function(doc) end".into()));
    }

    #[test]
    fn scoped_code_keeps_bindings() {
        let js = Javascript::with_scope("function(doc) emit(doc.x, factor) end", doc! { "factor": 2 });
        match Bson::from(js.clone()) {
            Bson::JavaScriptCodeWithScope(raw) => {
                assert_eq!(raw.code, js.code());
                assert_eq!(raw.scope, doc! { "factor": 2 });
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn non_code_values_are_rejected() {
        let err = Javascript::try_from(Bson::Int32(4)).unwrap_err();
        assert!(matches!(err, OperationError::InvalidArgument(_)));
    }
}
