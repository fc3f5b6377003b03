use once_cell::sync::Lazy;
use regex::Regex;

// `\w` is Unicode-aware, so letters from any script survive.
static UNSAFE_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\-]").expect("static pattern"));
static UNDERSCORE_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"_+").expect("static pattern"));

/// Folder name used when a profile name sanitizes to nothing.
pub const FALLBACK_FOLDER_NAME: &str = "profile";

/// Turn a profile name into a folder name: anything that is not a letter,
/// digit, `_` or `-` becomes `_`, runs of `_` collapse, and leading or
/// trailing `_` are dropped.
pub fn sanitize_folder_name(name: &str) -> String {
    let replaced = UNSAFE_CHARS.replace_all(name, "_");
    let collapsed = UNDERSCORE_RUNS.replace_all(&replaced, "_");
    let trimmed = collapsed.trim_matches('_');
    if trimmed.is_empty() {
        FALLBACK_FOLDER_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}
