pub mod money;
pub mod order;
pub mod rounding;
pub mod state;

pub use money::*;
pub use order::*;
pub use state::*;
