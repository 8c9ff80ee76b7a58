use std::{borrow::Cow, fmt};

use crate::model::{NodeId, Properties, Value};

/// A driver-neutral statement. Translating it into a query language (or not)
/// is up to each driver.
///
/// Node statements return their nodes in the `n` column; `DeleteNode` and
/// `CountNodes` return a single row with a `count` column.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// Creates a node (if `id` is `None`) or replaces the properties of an
    /// existing one. Yields the resulting node, or no row if there is no node
    /// with the given id and label.
    MergeNode {
        id: Option<NodeId>,
        label: String,
        properties: Properties,
    },
    /// Matches a single node by id and label.
    MatchNode { label: String, id: NodeId },
    /// Matches all the nodes with the given label whose properties are equal
    /// to the ones in `filter`, ordered by id.
    MatchNodes { label: String, filter: Properties },
    /// Deletes a node by id and label.
    DeleteNode { label: String, id: NodeId },
    /// Counts the nodes with the given label.
    CountNodes { label: String },
    /// Returns the given rows as they are.
    Rows {
        columns: Vec<String>,
        rows: Vec<Vec<Value>>,
    },
    /// Nothing to be done. Sessions answer it without a round trip.
    Noop,
}

impl Statement {
    /// The statement name, for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Statement::MergeNode { .. } => "merge-node",
            Statement::MatchNode { .. } => "match-node",
            Statement::MatchNodes { .. } => "match-nodes",
            Statement::DeleteNode { .. } => "delete-node",
            Statement::CountNodes { .. } => "count-nodes",
            Statement::Rows { .. } => "rows",
            Statement::Noop => "noop",
        }
    }

    /// Checks whether the statement may change the store.
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Statement::MergeNode { .. } | Statement::DeleteNode { .. }
        )
    }
}

/// A request to be executed by a [`Driver`](crate::driver::Driver).
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    statement: Statement,
    description: Option<Cow<'static, str>>,
}

impl Request {
    pub fn new(statement: Statement) -> Request {
        Request {
            statement,
            description: None,
        }
    }

    pub fn noop() -> Request {
        Request::new(Statement::Noop)
    }

    /// Returns literal rows. Mostly useful for diagnostics.
    pub fn rows<C, S>(columns: C, rows: Vec<Vec<Value>>) -> Request
    where
        C: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Request::new(Statement::Rows {
            columns: columns.into_iter().map(Into::into).collect(),
            rows,
        })
    }

    /// Attaches a human readable description, used in logs.
    pub fn describe(mut self, description: impl Into<Cow<'static, str>>) -> Request {
        self.description = Some(description.into());
        self
    }

    pub fn statement(&self) -> &Statement {
        &self.statement
    }

    pub fn is_noop(&self) -> bool {
        self.statement == Statement::Noop
    }
}

impl From<Statement> for Request {
    fn from(statement: Statement) -> Request {
        Request::new(statement)
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.description {
            Some(description) => write!(f, "{} ({description})", self.statement.name()),
            None => f.write_str(self.statement.name()),
        }
    }
}
