use std::{borrow::Cow, io};

pub type OgmResult<T, E = Error> = Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed or missing configuration values. Always fatal at startup.
    #[error("configuration error: {0}")]
    Configuration(Cow<'static, str>),

    /// The driver (or the network beneath it) failed while executing a
    /// request. Marks any enclosing transaction as failed.
    #[error("transport error: {0}")]
    Transport(Cow<'static, str>),

    /// Protocol misuse, such as beginning a transaction twice or committing a
    /// finished one.
    #[error("illegal state: {0}")]
    IllegalState(Cow<'static, str>),

    /// A row doesn't have the expected shape, or a column value couldn't be
    /// coerced to the requested type.
    #[error("decoding error: {0}")]
    Decoding(Cow<'static, str>),

    /// An generic IO error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn configuration(msg: impl Into<Cow<'static, str>>) -> Error {
        Error::Configuration(msg.into())
    }

    pub(crate) fn transport(msg: impl Into<Cow<'static, str>>) -> Error {
        Error::Transport(msg.into())
    }

    pub(crate) fn illegal_state(msg: impl Into<Cow<'static, str>>) -> Error {
        Error::IllegalState(msg.into())
    }

    pub(crate) fn decoding(msg: impl Into<Cow<'static, str>>) -> Error {
        Error::Decoding(msg.into())
    }

    /// Checks whether this is a transport failure reported by a driver.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_))
    }

    /// Checks whether this error denotes protocol misuse.
    pub fn is_illegal_state(&self) -> bool {
        matches!(self, Error::IllegalState(_))
    }

    /// Checks whether this is a row decoding failure.
    pub fn is_decoding(&self) -> bool {
        matches!(self, Error::Decoding(_))
    }

    /// Checks whether this is a configuration failure.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::Configuration(_))
    }
}
