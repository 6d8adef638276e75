pub mod attribute;
pub mod common;
pub mod remote;
pub mod submission;
pub mod variant;

pub use attribute::*;
pub use common::*;
pub use remote::*;
pub use submission::*;
pub use variant::*;
