pub mod compare;
pub mod duplicates;
pub mod mirror;

pub use compare::{compare, ComparisonResult};
pub use duplicates::{find_duplicates, DuplicateGroups};
pub use mirror::mirror_entries;
