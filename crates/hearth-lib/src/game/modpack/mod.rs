pub mod exporter;
pub mod importer;
pub mod share_code;
pub mod types;

pub use exporter::export_profile;
pub use importer::{import_profile, read_manifest};
pub use share_code::{generate_share_code, parse_share_code};
pub use types::*;
