//! Store path construction.

/// Join a child segment onto a parent path. The root parent is `""`.
///
/// Slashes around either side are normalised, so `"/field"`, `"field"` and
/// `"field/"` all produce the same child.
pub fn join(parent: &str, segment: &str) -> String {
    format!(
        "{}/{}",
        parent.trim_end_matches('/'),
        segment.trim_matches('/')
    )
}
