use crate::{
    error::OgmResult,
    model::{Node, NodeId, Properties},
};

/// A type that maps onto graph nodes of a single label.
///
/// ```ignore
/// struct Person {
///     id: Option<NodeId>,
///     name: String,
/// }
///
/// impl Entity for Person {
///     fn label() -> &'static str {
///         "Person"
///     }
///     // ...
/// }
/// ```
pub trait Entity: Sized {
    /// The node label entities of this type are stored under.
    fn label() -> &'static str;

    /// The id of the backing node, or `None` if never saved.
    fn id(&self) -> Option<NodeId>;

    fn set_id(&mut self, id: NodeId);

    fn to_properties(&self) -> Properties;

    fn from_node(node: &Node) -> OgmResult<Self>;
}
