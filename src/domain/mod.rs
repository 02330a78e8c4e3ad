pub mod award;
pub mod game;
pub mod job;
pub mod pick;

pub use award::*;
pub use game::*;
pub use job::*;
pub use pick::*;
