pub mod sparse;
pub mod special;
