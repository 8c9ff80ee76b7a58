mod graph;
pub use graph::*;

mod value;
pub use value::*;
