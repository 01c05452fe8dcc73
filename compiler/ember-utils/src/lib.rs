//! Utility data structures and third-party re-exports shared by every crate
//! in the Ember compiler. Downstream crates import the ecosystem through
//! here so the whole workspace agrees on versions.

pub mod counter;

pub use fxhash;
pub use index_vec;
pub use indexmap;
pub use itertools;
pub use lazy_static;
pub use log;
