//! Release message derivation from tag annotations.

use serde::Serialize;

/// Lines that open a detached signature block inside a tag annotation
pub const SIGNATURE_MARKERS: &[&str] = &[
    "-----BEGIN PGP SIGNATURE-----",
    "-----BEGIN SSH SIGNATURE-----",
];

/// Tag name and body of a release
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReleaseMessage {
    /// Tag the release is attached to
    pub tag: String,
    /// Release notes
    pub body: String,
}

fn is_marker(line: &str) -> bool {
    let line = line.trim_end();
    SIGNATURE_MARKERS.iter().any(|marker| line == *marker)
}

/// Removes a trailing signature block from annotation text.
///
/// Everything from the first marker line onwards is dropped and the
/// remaining lines are joined with `\n`. Text without a marker is returned
/// unchanged, so applying this twice gives the same result as once.
///
/// ```
/// use release_matrix::release::strip_signature;
///
/// let annotation = "Fixes\n-----BEGIN PGP SIGNATURE-----\nabc\n-----END PGP SIGNATURE-----";
/// assert_eq!(strip_signature(annotation), "Fixes");
/// assert_eq!(strip_signature("Fixes"), "Fixes");
/// ```
pub fn strip_signature(content: &str) -> String {
    if !content.lines().any(is_marker) {
        return content.to_string();
    }
    content
        .lines()
        .take_while(|line| !is_marker(line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Body of a real release: the annotation without its signature
pub fn release_body(annotation: &str) -> String {
    strip_signature(annotation)
}
