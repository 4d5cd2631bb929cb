// crates/core/src/worldgen/extract.rs
//! Multi-path asset extraction over the fetched world resource.
//!
//! The upstream schema has drifted across versions and exposes the same
//! logical asset at several paths/resolutions. Extraction therefore walks an
//! explicit ordered candidate list per asset and takes the first present,
//! non-empty value. The lists are configuration data: schema drift means
//! editing candidates, not orchestration code.

use serde_json::Value;

use super::WorldGenError;

/// Ordered JSON-pointer candidates per logical asset, best path first.
#[derive(Debug, Clone)]
pub struct ExtractionCandidates {
    pub world: Vec<String>,
    pub collision: Vec<String>,
    pub lowres: Vec<String>,
    pub preview: Vec<String>,
}

impl Default for ExtractionCandidates {
    fn default() -> Self {
        Self {
            world: vec![
                "/result/world/glb_url".into(),
                "/result/world/url".into(),
                "/assets/world_glb".into(),
                "/output/model_url".into(),
            ],
            collision: vec![
                "/result/collision/glb_url".into(),
                "/assets/collision_glb".into(),
                "/output/collision_url".into(),
            ],
            lowres: vec![
                "/result/world_lowres/glb_url".into(),
                "/assets/world_lowres_glb".into(),
            ],
            preview: vec![
                "/result/preview/image_url".into(),
                "/assets/preview_image".into(),
            ],
        }
    }
}

/// Asset URLs extracted from a ready world resource.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldAssets {
    pub world_url: String,
    pub collision_url: Option<String>,
    pub lowres_url: Option<String>,
    pub preview_url: Option<String>,
}

/// First present, non-empty string among `candidates`, in order.
pub fn first_string(doc: &Value, candidates: &[String]) -> Option<String> {
    for pointer in candidates {
        if let Some(s) = doc.pointer(pointer).and_then(Value::as_str) {
            if !s.is_empty() {
                return Some(s.to_string());
            }
        }
    }
    None
}

/// Whether the resource has its assets populated yet.
///
/// The service marks readiness with a `state` field on newer schema
/// versions; older versions only signal it by the asset fields appearing.
pub fn assets_ready(doc: &Value, candidates: &ExtractionCandidates) -> bool {
    if let Some(state) = doc.pointer("/state").and_then(Value::as_str) {
        return state == "ready";
    }
    first_string(doc, &candidates.world).is_some()
}

/// Extract all asset URLs. The primary world asset is required; everything
/// else is optional. A ready resource with no usable primary asset fails
/// with [`WorldGenError::NoUsableAsset`].
pub fn extract_assets(
    doc: &Value,
    candidates: &ExtractionCandidates,
) -> Result<WorldAssets, WorldGenError> {
    let world_url =
        first_string(doc, &candidates.world).ok_or(WorldGenError::NoUsableAsset)?;
    Ok(WorldAssets {
        world_url,
        collision_url: first_string(doc, &candidates.collision),
        lowres_url: first_string(doc, &candidates.lowres),
        preview_url: first_string(doc, &candidates.preview),
    })
}
