//! Demand analysis stages.
//!
//! Leaf-first: aggregation, qualification, ABC ranking, ROP estimation and
//! result assembly. Each stage is a plain function over in-memory records;
//! `crate::pipeline` wires them together.

pub mod abc;
pub mod aggregator;
pub mod assembler;
pub mod qualifier;
pub mod rop;

pub use abc::{rank, AbcAssignment, AbcPolicy};
pub use aggregator::aggregate;
pub use assembler::assemble;
pub use qualifier::QualificationRules;
pub use rop::{estimate_rop, item_rng, EstimatorParams};
