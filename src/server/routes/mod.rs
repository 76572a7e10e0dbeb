pub mod meta;
pub mod records;
