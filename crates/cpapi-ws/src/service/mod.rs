//! Public and private service facades.
//!
//! Each facade wraps one [`Session`](crate::Session) and exposes a typed
//! subscribe and unsubscribe pair per topic family the endpoint serves.

mod private;
mod public;

pub use private::PrivateService;
pub use public::PublicService;
