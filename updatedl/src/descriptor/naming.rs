//! Local file and directory naming.

/// Characters that cannot appear in a single path component on common
/// filesystems.
const RESERVED: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Make `name` safe to use as one path component.
///
/// Reserved characters and control characters become `_`, surrounding
/// whitespace and trailing dots are dropped, and names that would resolve to
/// the current or parent directory are replaced.
pub fn sanitize_component(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| {
            if RESERVED.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();

    let trimmed = replaced.trim().trim_end_matches('.').trim_end();
    if trimmed.is_empty() {
        "_".to_string()
    } else {
        trimmed.to_string()
    }
}

/// File name for a downloaded package: `v<version> - <basename>`.
pub fn local_file_name(version: &str, basename: &str) -> String {
    sanitize_component(&format!("v{} - {}", version, basename))
}
