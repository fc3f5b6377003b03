pub mod arguments;
pub mod java;
pub mod process;
pub mod types;

pub use arguments::{build_game_arguments, build_jvm_arguments, build_launch_spec};
pub use java::{find_java, verify_java, JavaSearch};
pub use process::{ProcessHandle, ProcessRunner, TokioProcessRunner};
pub use types::{LaunchAuth, LaunchManifest, LaunchSpec};
