pub mod confirmation;
pub mod record;

pub use confirmation::*;
pub use record::*;
