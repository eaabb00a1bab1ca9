use crate::models::FileType;

const DOCUMENT_EXTENSIONS: &[&str] = &[
    "pdf", "doc", "docx", "txt", "xls", "xlsx", "csv", "rtf", "ods", "ppt", "odp", "md", "html",
    "htm", "epub", "pages", "fig", "psd", "ai", "indd", "xd", "sketch", "afdesign", "afphoto",
];
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "svg", "webp"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "webm"];
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "ogg", "flac"];

/// Classifies a stored file name into a [`FileType`] and its lowercase extension.
///
/// Known extensions are matched first; anything else falls back to the MIME
/// type guessed from the extension. A name without an extension is `other`
/// with an empty extension.
pub fn get_file_type(file_name: &str) -> (FileType, String) {
    let extension = match file_name.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => ext.to_lowercase(),
        _ => return (FileType::Other, String::new()),
    };

    let ext = extension.as_str();
    let file_type = if DOCUMENT_EXTENSIONS.contains(&ext) {
        FileType::Document
    } else if IMAGE_EXTENSIONS.contains(&ext) {
        FileType::Image
    } else if VIDEO_EXTENSIONS.contains(&ext) {
        FileType::Video
    } else if AUDIO_EXTENSIONS.contains(&ext) {
        FileType::Audio
    } else {
        classify_mime(file_name)
    };

    (file_type, extension)
}

fn classify_mime(file_name: &str) -> FileType {
    match mime_guess::from_path(file_name).first() {
        Some(mime) if mime.type_() == mime::IMAGE => FileType::Image,
        Some(mime) if mime.type_() == mime::VIDEO => FileType::Video,
        Some(mime) if mime.type_() == mime::AUDIO => FileType::Audio,
        Some(mime) if mime.type_() == mime::TEXT => FileType::Document,
        _ => FileType::Other,
    }
}

/// Maps a listing category (`documents`, `images`, `media`, `others`) to the
/// file types it shows. Unknown categories are unrestricted.
/// Listing categories, each served at `/{category}`.
pub const CATEGORIES: [&str; 4] = ["documents", "images", "media", "others"];

pub fn file_types_for_category(category: &str) -> Vec<FileType> {
    match category {
        "documents" => vec![FileType::Document],
        "images" => vec![FileType::Image],
        "media" => vec![FileType::Video, FileType::Audio],
        "others" => vec![FileType::Other],
        _ => Vec::new(),
    }
}

pub fn compose_file_name(base: &str, extension: &str) -> String {
    format!("{}.{}", base, extension)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_extensions() {
        assert_eq!(get_file_type("report.pdf"), (FileType::Document, "pdf".to_string()));
        assert_eq!(get_file_type("photo.JPG"), (FileType::Image, "jpg".to_string()));
        assert_eq!(get_file_type("clip.mov"), (FileType::Video, "mov".to_string()));
        assert_eq!(get_file_type("song.flac"), (FileType::Audio, "flac".to_string()));
        assert_eq!(get_file_type("archive.tar.gz").0, FileType::Other);
    }

    #[test]
    fn test_mime_fallback() {
        assert_eq!(get_file_type("icon.tiff").0, FileType::Image);
        assert_eq!(get_file_type("voice.m4a").0, FileType::Audio);
        assert_eq!(get_file_type("style.css").0, FileType::Document);
    }

    #[test]
    fn test_names_without_extension() {
        assert_eq!(get_file_type("Makefile"), (FileType::Other, String::new()));
        assert_eq!(get_file_type("trailing."), (FileType::Other, String::new()));
    }

    #[test]
    fn test_categories() {
        assert_eq!(file_types_for_category("media"), vec![FileType::Video, FileType::Audio]);
        assert_eq!(file_types_for_category("documents"), vec![FileType::Document]);
        assert!(file_types_for_category("dashboard").is_empty());
    }

    #[test]
    fn test_compose_file_name() {
        assert_eq!(compose_file_name("summary", "pdf"), "summary.pdf");
    }
}
