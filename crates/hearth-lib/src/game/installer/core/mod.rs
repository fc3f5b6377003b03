pub mod local;
pub mod traits;

pub use local::LocalVersions;
pub use traits::*;
