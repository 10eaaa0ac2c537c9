//! The node store: lineage tables, content-tree nodes, file mirrors and the
//! coarse lock every document operation runs under.

pub mod error;
pub mod lineage;
pub mod mirror;
pub mod node;
pub mod sign;
pub mod store;

pub use error::{
  Result,
  StoreError,
};
pub use lineage::{
  Lineage,
  RevisionRow,
  RevisionState,
};
pub use mirror::Mirror;
pub use node::{
  Node,
  NodeData,
  NodeState,
  PropMap,
  PropValue,
};
pub use store::{
  NodeStore,
  Store,
};
