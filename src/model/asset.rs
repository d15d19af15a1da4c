use std::path::Path;

/// Which asset directory a reference is downloaded into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum AssetKind {
    Players,
    Flags,
}

/// Last path segment of a reference, ignoring any query string.
pub fn asset_basename(reference: &str) -> Option<&str> {
    let path = reference.split(['?', '#']).next().unwrap_or_default();
    path.rsplit('/').next().filter(|name| !name.is_empty())
}

/// Basename without its extension; the id the serving layer keys on.
pub fn asset_id(reference: &str) -> Option<&str> {
    let basename = asset_basename(reference)?;
    Path::new(basename).file_stem().and_then(|s| s.to_str())
}

/// Path under which the serving layer exposes a downloaded asset.
pub fn local_asset_path(kind: AssetKind, reference: &str) -> Option<String> {
    asset_id(reference).map(|id| format!("/static/images/{kind}/{id}.png"))
}
