//! Fixed-size slab allocation.
//!
//! A slab carves whole arena pages into equal blocks and keeps the free ones
//! on an intrusive LIFO list.

mod fixed_block;
mod free_list;
pub(crate) mod slab_cache;

pub use fixed_block::FixedBlock;
pub use slab_cache::{DEFAULT_BLOCK_SIZE, MAX_SCALAR_ALIGN};
