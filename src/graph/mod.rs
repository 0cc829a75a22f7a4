//! Store adapters and the bounded exploration engines.

pub mod closure;
pub mod impact;
pub mod memory;
pub mod neighborhood;
pub mod ordering;
pub mod slice;
pub mod source;
pub mod store;
pub mod traversal;
