pub mod installer;
pub mod launcher;
pub mod modpack;
pub mod profile;

pub use installer::{InstallOrchestrator, InstallOutcome, ModRequest};
pub use launcher::{build_launch_spec, LaunchSpec};
pub use profile::{LoaderKind, Profile, ProfileStore};
