//! Auth-domain identifiers, credential keys, and token models.

pub mod id;
pub mod key;
pub mod token;

pub use id::*;
pub use key::*;
pub use token::*;
