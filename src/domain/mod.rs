pub mod candidate;
pub mod contact;
pub mod email;

pub use candidate::*;
pub use contact::*;
pub use email::*;
