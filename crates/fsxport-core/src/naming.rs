//! Identifier and file name helpers
//!
//! Frame, bone and material names end up as bare identifiers in the .X
//! grammar, so they are reduced to `[A-Za-z0-9_]` and kept clear of the
//! format's reserved type keywords.

use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Type keywords of the .X template language
static RESERVED_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "ARRAY",
        "DWORD",
        "UCHAR",
        "FLOAT",
        "ULONGLONG",
        "BINARY_RESOURCE",
        "SDWORD",
        "UNICODE",
        "CHAR",
        "STRING",
        "WORD",
        "CSTRING",
        "SWORD",
        "DOUBLE",
        "TEMPLATE",
    ]
    .into_iter()
    .collect()
});

/// Check whether a name collides with a .X type keyword
pub fn is_reserved_word(name: &str) -> bool {
    RESERVED_WORDS.contains(name)
}

/// Make a scene name usable as a .X identifier
///
/// ASCII punctuation and spaces become `_`. A leading digit or a reserved
/// keyword gets a `_` prefix. Applying it twice gives the same result.
pub fn safe_name(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| if c.is_ascii_punctuation() || c == ' ' { '_' } else { c })
        .collect();

    let leading_digit = out.chars().next().is_some_and(|c| c.is_ascii_digit());
    if leading_digit || is_reserved_word(&out) {
        out.insert(0, '_');
    }
    out
}

/// Safe name of a bone, qualified by its armature
pub fn bone_safe_name(armature: &str, bone: &str) -> String {
    format!("{}_{}", safe_name(armature), safe_name(bone))
}

/// Replace the extension of a path
///
/// `ext` carries its own leading separator, so `"-log.txt"` turns
/// `scene.x` into `scene-log.txt`.
pub fn replace_extension(path: impl AsRef<Path>, ext: &str) -> PathBuf {
    let path = path.as_ref();
    let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    path.with_file_name(format!("{stem}{ext}"))
}

/// File name without directories or extension
pub fn file_stem(path: &str) -> String {
    Path::new(&path.replace('\\', "/"))
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// File name without directories
pub fn file_name(path: &str) -> String {
    Path::new(&path.replace('\\', "/"))
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Texture reference as the simulator loads it
///
/// Directories are dropped and the extension becomes `.dds`, or `.bmp`
/// for older tool chains.
pub fn texture_file_name(image_path: &str, use_bmp: bool) -> String {
    let ext = if use_bmp { "bmp" } else { "dds" };
    format!("{}.{ext}", file_stem(image_path))
}
