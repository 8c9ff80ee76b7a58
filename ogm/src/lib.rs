//! A transactional session core for object-graph mapping.
//!
//! Sessions issue requests through a [`driver::Driver`] and hand results back
//! as lazily-consumed [`response::Response`]s, within explicit transactions or
//! in autocommit mode.

pub mod error;

pub mod config;

pub mod model;

pub mod response;

pub mod driver;

pub mod transaction;

pub mod session;

mod factory;
pub use factory::SessionFactory;

pub use session::{Entity, Session};
