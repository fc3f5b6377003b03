/// Argument builder for the game process
use crate::config::LauncherConfig;
use crate::game::launcher::java::find_java;
use crate::game::launcher::types::{LaunchAuth, LaunchManifest, LaunchSpec};
use crate::game::profile::Profile;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// JVM flags in the order the game and its agents need them: provider agents
/// first, then heap bounds, then tuning flags, then whatever the user added.
pub fn build_jvm_arguments(auth: &LaunchAuth, config: &LauncherConfig) -> Vec<String> {
    let mut args = Vec::new();
    args.extend(auth.jvm_args.iter().cloned());
    args.push(format!("-Xms{}G", config.ram_min));
    args.push(format!("-Xmx{}G", config.ram_max));
    args.extend(config.jvm_tuning_args.iter().cloned());
    args.extend(
        config
            .extra_jvm_args
            .iter()
            .filter(|arg| !arg.trim().is_empty())
            .cloned(),
    );
    args
}

/// Game arguments (everything after the main class).
pub fn build_game_arguments(
    manifest: &LaunchManifest,
    auth: &LaunchAuth,
    game_dir: &Path,
    config: &LauncherConfig,
) -> Vec<String> {
    let mut args = vec![
        "--username".to_string(),
        auth.username.clone(),
        "--version".to_string(),
        manifest.version_id.clone(),
        "--gameDir".to_string(),
        game_dir.to_string_lossy().to_string(),
        "--assetsDir".to_string(),
        manifest.assets_dir.to_string_lossy().to_string(),
        "--assetIndex".to_string(),
        manifest.asset_index.clone(),
        "--uuid".to_string(),
        auth.uuid.clone(),
        "--accessToken".to_string(),
        auth.access_token.clone(),
        "--userType".to_string(),
        auth.user_type.clone(),
        "--versionType".to_string(),
        manifest.version_type.clone(),
        "--width".to_string(),
        config.window_width.to_string(),
        "--height".to_string(),
        config.window_height.to_string(),
    ];
    args.extend(
        manifest
            .game_args
            .iter()
            .filter(|arg| !arg.trim().is_empty())
            .cloned(),
    );
    args
}

/// Assemble the full launch command.
///
/// The working directory is the profile's data directory, or
/// `default_game_dir` when launching without a profile. It is created here,
/// right before launch, and nowhere earlier. Without a configured Java path
/// the runtime is discovered; if none is found, `java` is left to the OS.
pub fn build_launch_spec(
    manifest: &LaunchManifest,
    auth: &LaunchAuth,
    profile: Option<&Profile>,
    config: &LauncherConfig,
    default_game_dir: &Path,
) -> Result<LaunchSpec> {
    let working_directory = profile
        .map(|p| p.data_directory.clone())
        .unwrap_or_else(|| default_game_dir.to_path_buf());

    let classpath = std::env::join_paths(&manifest.classpath)
        .context("Classpath entry contains the path separator")?;

    let mut args = build_jvm_arguments(auth, config);
    args.push(format!(
        "-Djava.library.path={}",
        manifest.natives_dir.to_string_lossy()
    ));
    args.push("-cp".to_string());
    args.push(classpath.to_string_lossy().to_string());
    args.push(manifest.main_class.clone());
    args.extend(build_game_arguments(manifest, auth, &working_directory, config));

    std::fs::create_dir_all(&working_directory).with_context(|| {
        format!(
            "Failed to create game directory {}",
            working_directory.display()
        )
    })?;
    log::info!(
        "[launch] Prepared {} for {} in {}",
        manifest.version_id,
        auth.username,
        working_directory.display()
    );

    let executable = match config.java_override() {
        Some(path) => path,
        None => find_java().unwrap_or_else(|| {
            log::warn!("[launch] No working Java found, falling back to `java`");
            PathBuf::from("java")
        }),
    };

    Ok(LaunchSpec {
        executable,
        args,
        working_directory,
        env: HashMap::new(),
    })
}
