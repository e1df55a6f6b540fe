//! Identity-derived artifact names

/// Longest stem kept from the identity
const MAX_STEM_LEN: usize = 96;

/// File name for the resource with `identity`.
///
/// The stem is the last path segment of the identity with query and fragment
/// removed, followed by a short md5 digest of the full identity so two URLs
/// ending in the same segment do not collide. Identities without a usable
/// segment are named by the full digest.
///
/// ```
/// use storage::artifact_file_name;
///
/// let name = artifact_file_name("https://images.unsplash.com/photo-123?ixid=abc", "jpg");
/// assert!(name.starts_with("photo-123-"));
/// assert!(name.ends_with(".jpg"));
/// ```
pub fn artifact_file_name(identity: &str, extension: &str) -> String {
    let digest = format!("{:x}", md5::compute(identity.as_bytes()));

    let base = match last_segment(identity).map(sanitize) {
        Some(stem) if !stem.is_empty() => format!("{stem}-{}", &digest[..8]),
        _ => digest,
    };

    if extension.is_empty() {
        base
    } else {
        format!("{base}.{extension}")
    }
}

fn last_segment(identity: &str) -> Option<&str> {
    let without_query = identity.split(['?', '#']).next().unwrap_or(identity);
    let trimmed = without_query.trim_end_matches('/');

    // Host alone is not a usable name
    let path = match trimmed.find("://") {
        Some(pos) => {
            let rest = &trimmed[pos + 3..];
            rest.find('/').map(|slash| &rest[slash + 1..]).unwrap_or("")
        }
        None => trimmed,
    };

    path.rsplit('/').next().filter(|s| !s.is_empty())
}

fn sanitize(segment: &str) -> String {
    segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_STEM_LEN)
        .collect::<String>()
        .trim_start_matches('.')
        .to_string()
}
