mod location;
mod waitlist_email;
mod waitlist_entry;

pub use location::*;
pub use waitlist_email::*;
pub use waitlist_entry::*;
