pub mod canonicalize;
pub mod generate;
pub mod hydrate;
pub mod image_stager;
pub mod reconcile;
pub mod session;
pub mod submission;

pub use canonicalize::*;
pub use generate::*;
pub use hydrate::*;
pub use image_stager::*;
pub use reconcile::*;
pub use session::*;
pub use submission::*;
