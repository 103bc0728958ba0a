pub mod accumulation;
pub mod node;
pub mod substitution;
pub mod symbols;
pub mod tree;

// re-export for cleaner imports
pub use self::accumulation::{accumulate, accumulate_aa};
pub use self::node::{NODE_TYPE_NEW, NODE_TYPE_REFERENCE, NodeAttr, TreeNode};
pub use self::substitution::{AaSub, NucSub};
pub use self::symbols::{Aa, AaPos, Nuc, NucPos};
pub use self::tree::{NodeId, Tree};
