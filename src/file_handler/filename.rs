//! Filename helpers for callers that pick handles by name.

/// Characters that end a directory component
const SEPARATORS: &[char] = &['\\', '/', ':'];

/// The final component of `name`, optionally without its extension
///
/// Only the last `.` is treated as the start of an extension.
pub fn extract_base(name: &str, strip_extension: bool) -> &str {
    let base = match name.rfind(SEPARATORS) {
        Some(at) => &name[at + 1..],
        None => name,
    };
    if !strip_extension {
        return base;
    }
    match base.rfind('.') {
        Some(at) => &base[..at],
        None => base,
    }
}

/// Does `name` end with `extension`, ignoring ASCII case?
///
/// `extension` is matched as a plain suffix, so a leading dot is optional.
pub fn ends_with_extension(name: &str, extension: &str) -> bool {
    let (name, extension) = (name.as_bytes(), extension.as_bytes());
    name.len() >= extension.len()
        && name[name.len() - extension.len()..].eq_ignore_ascii_case(extension)
}
