use std::{borrow::Cow, marker::PhantomData};

use crate::{
    error::{Error, OgmResult},
    model::{FromValue, Node},
    response::ResponseRecord,
};

/// Converts raw records into the element type of a response.
pub trait RowDecoder: Send {
    type Output: Send;

    fn decode(&mut self, record: ResponseRecord) -> OgmResult<Self::Output>;
}

/// Yields records as they are.
#[derive(Debug, Clone, Copy, Default)]
pub struct Records;

impl RowDecoder for Records {
    type Output = ResponseRecord;

    fn decode(&mut self, record: ResponseRecord) -> OgmResult<ResponseRecord> {
        Ok(record)
    }
}

/// Yields the node found in a given column (`n` by default).
#[derive(Debug, Clone)]
pub struct Nodes {
    column: Cow<'static, str>,
}

impl Nodes {
    /// The column every node statement returns.
    pub const DEFAULT_COLUMN: &'static str = "n";

    pub fn new() -> Nodes {
        Nodes {
            column: Cow::Borrowed(Self::DEFAULT_COLUMN),
        }
    }

    pub fn in_column(column: impl Into<Cow<'static, str>>) -> Nodes {
        Nodes {
            column: column.into(),
        }
    }
}

impl Default for Nodes {
    fn default() -> Self {
        Self::new()
    }
}

impl RowDecoder for Nodes {
    type Output = Node;

    fn decode(&mut self, record: ResponseRecord) -> OgmResult<Node> {
        record.take(&self.column)?.try_into_typed()
    }
}

/// Yields the first column of each row, coerced to `T`.
pub struct Scalar<T> {
    _ty: PhantomData<fn() -> T>,
}

impl<T> Scalar<T> {
    pub fn new() -> Scalar<T> {
        Scalar { _ty: PhantomData }
    }
}

impl<T> Default for Scalar<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: FromValue + Send> RowDecoder for Scalar<T> {
    type Output = T;

    fn decode(&mut self, record: ResponseRecord) -> OgmResult<T> {
        let value = record
            .into_values()
            .into_iter()
            .next()
            .ok_or_else(|| Error::decoding("expected at least one column"))?;
        T::from_value(value)
    }
}
