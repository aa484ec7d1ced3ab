//! Logic-form representation and execution.
//!
//! A plan is a straight-line list of [`LogicNode`]s parsed from the
//! model's step/action decomposition. Execution threads alias bindings
//! and chunk-hash provenance through a [`ReasoningSession`].

mod exec;
mod node;
mod session;

pub use exec::PlanExecutor;
pub use node::{parse_action, EntityRef, LogicNode, NodeMeta, RelationRef};
pub use session::ReasoningSession;
