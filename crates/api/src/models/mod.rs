pub mod meta;
pub mod throwable;
pub mod value;

pub use meta::*;
pub use throwable::*;
pub use value::*;
