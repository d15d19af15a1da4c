mod asset;
mod league;
mod player;

pub use asset::*;
pub use league::*;
pub use player::*;
