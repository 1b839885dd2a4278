//! Extension based media classification

use crate::config::Config;
use std::path::Path;

/// Media kind of a file, derived from its lower-cased extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Photo,
    Video,
    Other,
}

/// Extension to kind table. Add entries here to support more formats.
const EXTENSIONS: &[(&str, MediaKind)] = &[
    ("jpg", MediaKind::Photo),
    ("mov", MediaKind::Video),
    ("mp4", MediaKind::Video),
    ("avi", MediaKind::Video),
];

impl MediaKind {
    /// Destination subfolder for this kind, `None` for files that are not moved
    pub fn folder_name<'a>(&self, config: &'a Config) -> Option<&'a str> {
        match self {
            MediaKind::Photo => Some(config.photo_folder.as_str()),
            MediaKind::Video => Some(config.video_folder.as_str()),
            MediaKind::Other => None,
        }
    }
}

/// Classify a path by its extension, case-insensitively
pub fn classify(path: &Path) -> MediaKind {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return MediaKind::Other;
    };
    let ext = ext.to_lowercase();

    EXTENSIONS
        .iter()
        .find(|(known, _)| *known == ext)
        .map(|(_, kind)| *kind)
        .unwrap_or(MediaKind::Other)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_known_extensions() {
        assert_eq!(classify(Path::new("/a/b/IMG_0001.jpg")), MediaKind::Photo);
        assert_eq!(classify(Path::new("clip.mov")), MediaKind::Video);
        assert_eq!(classify(Path::new("clip.mp4")), MediaKind::Video);
        assert_eq!(classify(Path::new("clip.avi")), MediaKind::Video);
    }

    #[test]
    fn test_classify_is_case_insensitive() {
        assert_eq!(classify(Path::new("IMG_0001.JPG")), MediaKind::Photo);
        assert_eq!(classify(Path::new("clip.Mp4")), MediaKind::Video);
    }

    #[test]
    fn test_classify_others() {
        assert_eq!(classify(Path::new("notes.txt")), MediaKind::Other);
        assert_eq!(classify(Path::new("photo.jpeg")), MediaKind::Other);
        assert_eq!(classify(Path::new("README")), MediaKind::Other);
        // Suffix without a dot is not an extension
        assert_eq!(classify(Path::new("notajpg")), MediaKind::Other);
    }

    #[test]
    fn test_folder_names() {
        let config = Config::default();
        assert_eq!(MediaKind::Photo.folder_name(&config), Some("fotos"));
        assert_eq!(MediaKind::Video.folder_name(&config), Some("videos"));
        assert_eq!(MediaKind::Other.folder_name(&config), None);
    }
}
