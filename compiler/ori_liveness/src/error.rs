//! Input validation errors.
//!
//! These are the only recoverable failures in the crate. Once a [`Cfg`]
//! exists, every broken invariant is an internal compiler bug and panics.
//!
//! [`Cfg`]: crate::Cfg

use crate::ir::{BlockId, InstrId};

/// Why [`CfgBuilder::build`](crate::CfgBuilder::build) rejected a graph.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CfgError {
    #[error("control-flow graph has no blocks")]
    Empty,

    #[error("reference to unknown block {block:?}")]
    UnknownBlock { block: BlockId },

    #[error("{instr:?} is not a phi")]
    NotAPhi { instr: InstrId },

    #[error("duplicate edge {from:?} -> {to:?}")]
    DuplicateEdge { from: BlockId, to: BlockId },

    #[error("{user:?} reads {operand:?}, which does not produce a value")]
    NotAValue { user: InstrId, operand: InstrId },

    #[error("phi {phi:?} has {found} inputs but its block has {expected} predecessors")]
    PhiArity {
        phi: InstrId,
        expected: usize,
        found: usize,
    },

    #[error("block {block:?} is unreachable from the entry block")]
    UnreachableBlock { block: BlockId },

    #[error("irreducible control flow: edge {from:?} -> {to:?} enters a loop other than through its header")]
    Irreducible { from: BlockId, to: BlockId },

    #[error("{user:?} reads {operand:?} at a point its definition does not dominate")]
    UseNotDominated { user: InstrId, operand: InstrId },
}
