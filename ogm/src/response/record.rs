use std::sync::Arc;

use crate::{
    error::{Error, OgmResult},
    model::{FromValue, Value},
};

/// A single decoded row, along with the column names of its result set.
///
/// Records are immutable once produced. Column names are shared among all the
/// records of the same response.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseRecord {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl ResponseRecord {
    /// Constructs a new record, checking that there is exactly one value per
    /// column.
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> OgmResult<ResponseRecord> {
        if columns.len() != values.len() {
            return Err(Error::decoding(format!(
                "row has {} values, but the result set has {} columns",
                values.len(),
                columns.len()
            )));
        }
        Ok(ResponseRecord { columns, values })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns a reference to the value of the given column.
    pub fn get(&self, column: &str) -> Option<&Value> {
        let index = self.columns.iter().position(|c| c == column)?;
        self.values.get(index)
    }

    /// Returns the value of the given column coerced to `T`.
    pub fn get_as<T: FromValue>(&self, column: &str) -> OgmResult<T> {
        let value = self
            .get(column)
            .ok_or_else(|| Error::decoding(format!("no column named `{column}`")))?;
        T::from_value(value.clone())
    }

    /// Takes the value of the given column out of the record.
    pub fn take(mut self, column: &str) -> OgmResult<Value> {
        let index = self
            .columns
            .iter()
            .position(|c| c == column)
            .ok_or_else(|| Error::decoding(format!("no column named `{column}`")))?;
        Ok(self.values.swap_remove(index))
    }
}

/// The expected shape of a record. See [`Response::expect`].
///
/// [`Response::expect`]: crate::response::Response::expect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordShape {
    columns: Vec<String>,
}

impl RecordShape {
    /// A shape with the given column names, in order.
    pub fn columns<I, S>(columns: I) -> RecordShape
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        RecordShape {
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    /// The shape of an existing record.
    pub fn of(record: &ResponseRecord) -> RecordShape {
        RecordShape {
            columns: record.columns().to_vec(),
        }
    }

    /// Fails with a decoding error if the record doesn't have this shape.
    pub fn check(&self, record: &ResponseRecord) -> OgmResult<()> {
        if self.columns.as_slice() == record.columns() {
            return Ok(());
        }
        Err(Error::decoding(format!(
            "expected record with columns {:?}, but got {:?}",
            self.columns,
            record.columns()
        )))
    }
}
