use std::fmt;

use bson::{Bson, Document, doc};

use crate::error::OperationError;
use crate::reply::as_i64;

/// How map-reduce output is written into an existing target collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutAction {
    /// Drop whatever the target held and write the new results.
    #[default]
    Replace,
    /// Overwrite documents with matching `_id`, keep the rest.
    Merge,
    /// Reduce new values with the existing value for the same `_id`.
    Reduce,
}

impl OutAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutAction::Replace => "replace",
            OutAction::Merge => "merge",
            OutAction::Reduce => "reduce",
        }
    }

    fn from_key(key: &str) -> Option<Self> {
        match key {
            "replace" => Some(OutAction::Replace),
            "merge" => Some(OutAction::Merge),
            "reduce" => Some(OutAction::Reduce),
            _ => None,
        }
    }
}

impl fmt::Display for OutAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where map-reduce results go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Out {
    /// Results come back in the command reply.
    Inline,
    /// Results are written to `name`, in `database` when given, otherwise
    /// in the source database.
    Collection {
        name: String,
        database: Option<String>,
        action: OutAction,
    },
}

impl Out {
    /// Replace the contents of `name` in the source database.
    pub fn collection(name: impl Into<String>) -> Self {
        Out::Collection {
            name: name.into(),
            database: None,
            action: OutAction::Replace,
        }
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, Out::Inline)
    }

    pub(crate) fn validate(&self) -> Result<(), OperationError> {
        match self {
            Out::Inline => Ok(()),
            Out::Collection { name, database, .. } => {
                if name.is_empty() {
                    return Err(OperationError::invalid("output collection name is empty"));
                }
                if database.as_deref() == Some("") {
                    return Err(OperationError::invalid("output database name is empty"));
                }
                Ok(())
            }
        }
    }

    pub(crate) fn to_bson(&self) -> Bson {
        match self {
            Out::Inline => Bson::Document(doc! { "inline": 1 }),
            Out::Collection {
                name,
                database,
                action,
            } => {
                let mut spec = Document::new();
                spec.insert(action.as_str(), name.as_str());
                if let Some(db) = database {
                    spec.insert("db", db.as_str());
                }
                Bson::Document(spec)
            }
        }
    }
}

impl TryFrom<Bson> for Out {
    type Error = OperationError;

    fn try_from(value: Bson) -> Result<Self, Self::Error> {
        let out = match value {
            Bson::String(name) => Out::collection(name),
            Bson::Document(spec) => parse_spec(spec)?,
            other => {
                return Err(OperationError::invalid(format!(
                    "`out` must be a string or document, got {:?}",
                    other.element_type()
                )));
            }
        };
        out.validate()?;
        Ok(out)
    }
}

fn parse_spec(spec: Document) -> Result<Out, OperationError> {
    if let Some(inline) = spec.get("inline") {
        let enabled = match inline {
            Bson::Boolean(b) => *b,
            other => as_i64(other).is_some_and(|n| n != 0),
        };
        if !enabled || spec.len() != 1 {
            return Err(OperationError::invalid("`out` inline spec must be { inline: 1 }"));
        }
        return Ok(Out::Inline);
    }

    let mut target: Option<(OutAction, String)> = None;
    let mut database = None;
    for (key, value) in spec {
        if let Some(action) = OutAction::from_key(&key) {
            if target.is_some() {
                return Err(OperationError::invalid("`out` names more than one action"));
            }
            match value {
                Bson::String(name) => target = Some((action, name)),
                _ => {
                    return Err(OperationError::invalid(format!(
                        "`out.{key}` must be a collection name"
                    )));
                }
            }
        } else if key == "db" {
            match value {
                Bson::String(db) => database = Some(db),
                _ => return Err(OperationError::invalid("`out.db` must be a string")),
            }
        } else {
            return Err(OperationError::invalid(format!("unknown `out` key `{key}`")));
        }
    }

    match target {
        Some((action, name)) => Ok(Out::Collection {
            name,
            database,
            action,
        }),
        None => Err(OperationError::invalid(
            "`out` must be inline or name a target collection",
        )),
    }
}
