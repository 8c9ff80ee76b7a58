use std::{collections::BTreeMap, fmt};

use crate::{
    error::{Error, OgmResult},
    model::value::{FromValue, Value},
};

/// Node properties, ordered by name.
pub type Properties = BTreeMap<String, Value>;

/// The store-assigned identity of a node.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u64);

impl NodeId {
    pub const fn new(id: u64) -> NodeId {
        NodeId(id)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A graph node as returned by a driver.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub labels: Vec<String>,
    pub properties: Properties,
}

impl Node {
    pub fn new(id: NodeId, labels: Vec<String>, properties: Properties) -> Node {
        Node {
            id,
            labels,
            properties,
        }
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    /// Returns the property with the given name, coerced to `T`. A missing
    /// property is treated as [`Value::Null`], so optional properties may be
    /// read as `Option<T>`.
    pub fn property<T: FromValue>(&self, name: &str) -> OgmResult<T> {
        let value = self.properties.get(name).cloned().unwrap_or(Value::Null);
        T::from_value(value).map_err(|error| match error {
            Error::Decoding(msg) => {
                Error::decoding(format!("property `{name}` of node {}: {msg}", self.id))
            }
            other => other,
        })
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}", self.id)?;
        for label in &self.labels {
            write!(f, ":{label}")?;
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person() -> Node {
        Node::new(
            NodeId::new(3),
            vec!["Person".into()],
            Properties::from([("name".into(), Value::from("Ada"))]),
        )
    }

    #[test]
    fn test_property_access() {
        let node = person();
        assert_eq!(node.property::<String>("name").unwrap(), "Ada");
        assert_eq!(node.property::<Option<i64>>("age").unwrap(), None);
        assert!(node.has_label("Person"));
        assert_eq!(node.to_string(), "(#3:Person)");
    }

    #[test]
    fn test_missing_required_property() {
        let err = person().property::<i64>("age").unwrap_err();
        assert!(err.is_decoding());
        assert!(err.to_string().contains("property `age`"));
    }
}
