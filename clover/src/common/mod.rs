mod constants;
mod normalize;
mod sync;
mod value;

pub use constants::*;
pub use normalize::*;
pub use sync::*;
pub use value::*;
