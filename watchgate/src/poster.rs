//! Poster image selection from the video host's media metadata.
//!
//! The poster is shown until the visitor presses play. Metadata lives at
//! [`metadata_url`]; the host application fetches it and passes the body
//! to [`resolve_poster`]. A poster URL set explicitly by the caller wins
//! over the metadata; without either, the host's swatch image is used.

use serde::Deserialize;

use crate::tracing::prelude::*;

const HOST: &str = "https://fast.wistia.com/embed/medias";
const CROP_PARAM: &str = "image_crop_resized";
const CROP_SIZE: &str = "1920x1080";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaMetadata {
    #[serde(default)]
    pub media: Media,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Media {
    #[serde(default)]
    pub assets: Vec<Asset>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Asset {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub width: Option<u64>,
}

pub fn metadata_url(media_id: &str) -> String {
    format!("{HOST}/{media_id}.json")
}

pub fn swatch_url(media_id: &str) -> String {
    format!("{HOST}/{media_id}/swatch")
}

pub fn parse_metadata(json: &str) -> crate::error::Result<MediaMetadata> {
    Ok(serde_json::from_str(json)?)
}

/// Widest still image, else widest preview, sized for a full-HD poster.
pub fn best_poster_url(metadata: &MediaMetadata) -> Option<String> {
    let assets = &metadata.media.assets;
    let best = widest(assets, "still_image").or_else(|| widest(assets, "preview"))?;
    best.url.as_deref().map(with_crop)
}

/// Poster URL for `media_id`.
///
/// `explicit` is a poster URL configured by the page and always wins.
/// `metadata_json` is the body fetched from [`metadata_url`], or `None`
/// if the fetch failed.
pub fn resolve_poster(media_id: &str, explicit: Option<&str>, metadata_json: Option<&str>) -> String {
    if let Some(url) = explicit {
        return url.to_string();
    }

    metadata_json
        .and_then(|body| match parse_metadata(body) {
            Ok(metadata) => best_poster_url(&metadata),
            Err(e) => {
                debug!(media_id, error = %e, "Unreadable media metadata");
                None
            }
        })
        .unwrap_or_else(|| swatch_url(media_id))
}

/// First asset of `kind` with the greatest width. Missing widths count
/// as zero.
fn widest<'a>(assets: &'a [Asset], kind: &str) -> Option<&'a Asset> {
    let mut best: Option<&Asset> = None;
    for asset in assets.iter().filter(|a| a.kind == kind) {
        let wider = best.is_none_or(|b| asset.width.unwrap_or(0) > b.width.unwrap_or(0));
        if wider {
            best = Some(asset);
        }
    }
    best
}

fn with_crop(url: &str) -> String {
    if url.contains(CROP_PARAM) {
        return url.to_string();
    }
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}{CROP_PARAM}={CROP_SIZE}")
}
