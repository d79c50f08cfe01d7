mod health;
mod waitlist;

pub use health::*;
pub use waitlist::*;
