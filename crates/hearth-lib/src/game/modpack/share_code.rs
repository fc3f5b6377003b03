//! Share codes: a profile's shareable subset packed into one URL-safe string.
//!
//! Pipeline: compact JSON, zlib, URL-safe base64 without padding, then the
//! `CL1-` tag. Only mods with a registry id survive the trip.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

use crate::error::ArchiveError;
use crate::game::modpack::types::SharedProfile;
use crate::game::profile::{InstalledModReference, LoaderKind, ModProvenance, Profile};

pub const SHARE_CODE_PREFIX: &str = "CL1-";
pub const SHARE_FORMAT_VERSION: u32 = 1;

const MAX_NAME_CHARS: usize = 50;
const MAX_MOD_NAME_CHARS: usize = 30;
/// Largest decompressed payload a pasted code may expand to
const MAX_PAYLOAD_BYTES: u64 = 256 * 1024;

#[derive(Debug, Serialize, Deserialize)]
struct SharePayload {
    v: u32,
    name: String,
    game_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    loader: Option<LoaderKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    loader_version: Option<String>,
    #[serde(default)]
    mods: Vec<ShareMod>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ShareMod {
    id: String,
    src: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ver: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

fn share_mod(reference: &InstalledModReference) -> Option<ShareMod> {
    let src = reference.provenance.share_tag()?;
    let id = reference.remote_mod_id.clone()?;
    Some(ShareMod {
        id,
        src: src.to_string(),
        ver: reference.remote_version_id.clone(),
        name: reference
            .display_name
            .as_deref()
            .map(|n| truncate_chars(n, MAX_MOD_NAME_CHARS)),
    })
}

/// Encode the shareable parts of `profile`. Local mods and mods without a
/// registry id are left out.
pub fn generate_share_code(profile: &Profile) -> Result<String, ArchiveError> {
    let payload = SharePayload {
        v: SHARE_FORMAT_VERSION,
        name: truncate_chars(&profile.name, MAX_NAME_CHARS),
        game_version: profile.game_version.clone(),
        loader: profile.loader_kind,
        loader_version: profile.loader_version.clone(),
        mods: profile.installed_mods.iter().filter_map(share_mod).collect(),
    };
    let json = serde_json::to_vec(&payload)
        .map_err(|e| ArchiveError::InvalidFormat(e.to_string()))?;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(&json)?;
    let compressed = encoder.finish()?;

    log::debug!(
        "[share] Encoded {} ({} mod(s), {} -> {} bytes)",
        profile.name,
        payload.mods.len(),
        json.len(),
        compressed.len()
    );
    Ok(format!("{}{}", SHARE_CODE_PREFIX, URL_SAFE_NO_PAD.encode(compressed)))
}

fn decode_payload(body: &str) -> Result<SharePayload, ArchiveError> {
    let compressed = URL_SAFE_NO_PAD
        .decode(body.trim())
        .map_err(|e| ArchiveError::InvalidFormat(format!("share code is not base64: {}", e)))?;
    let mut json = Vec::new();
    ZlibDecoder::new(compressed.as_slice())
        .take(MAX_PAYLOAD_BYTES + 1)
        .read_to_end(&mut json)
        .map_err(|e| ArchiveError::InvalidFormat(format!("share code is corrupt: {}", e)))?;
    if json.len() as u64 > MAX_PAYLOAD_BYTES {
        return Err(ArchiveError::InvalidFormat(format!(
            "share code expands past {} bytes",
            MAX_PAYLOAD_BYTES
        )));
    }
    serde_json::from_slice(&json)
        .map_err(|e| ArchiveError::InvalidFormat(format!("share code payload: {}", e)))
}

/// Decode a share code.
///
/// Everything up to and including the first `-` is treated as the tag and
/// dropped, so other tags (or none) are accepted. Since URL-safe base64 can
/// itself contain `-`, a code that fails to decode after stripping is tried
/// again whole. A payload version other than ours is only logged.
pub fn parse_share_code(code: &str) -> Result<SharedProfile, ArchiveError> {
    let code = code.trim();
    let payload = match code.split_once('-') {
        Some((_, body)) => decode_payload(body).or_else(|first| decode_payload(code).map_err(|_| first))?,
        None => decode_payload(code)?,
    };

    if payload.v != SHARE_FORMAT_VERSION {
        log::warn!(
            "[share] Share code version {} differs from {}; parsing anyway",
            payload.v,
            SHARE_FORMAT_VERSION
        );
    }
    if payload.loader.is_some() != payload.loader_version.is_some() {
        return Err(ArchiveError::InvalidFormat(
            "share code has a loader without a version".to_string(),
        ));
    }

    let mods = payload
        .mods
        .into_iter()
        .filter_map(|m| {
            let Some(provenance) = ModProvenance::from_share_tag(&m.src) else {
                log::warn!("[share] Skipping mod {} with unknown source {}", m.id, m.src);
                return None;
            };
            Some(InstalledModReference {
                filename: String::new(),
                provenance,
                remote_mod_id: Some(m.id),
                remote_version_id: m.ver,
                display_name: m.name,
            })
        })
        .collect();

    Ok(SharedProfile {
        format_version: payload.v,
        name: payload.name,
        game_version: payload.game_version,
        loader_kind: payload.loader,
        loader_version: payload.loader_version,
        mods,
    })
}
