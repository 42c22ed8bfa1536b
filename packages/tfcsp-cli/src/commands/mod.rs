pub mod decode;
pub mod grid;
pub mod group;
pub mod validate;
