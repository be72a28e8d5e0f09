//! EXIF metadata extraction.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::MetadataError;

/// Read EXIF fields from an image as (tag name, rendered value) pairs.
///
/// An image without EXIF data yields an empty list rather than an error.
pub fn read_exif(path: &Path) -> Result<Vec<(String, String)>, MetadataError> {
    if !path.exists() {
        return Err(MetadataError::NotFound(path.to_path_buf()));
    }

    let mut reader = BufReader::new(File::open(path)?);
    let exif = match exif::Reader::new().read_from_container(&mut reader) {
        Ok(exif) => exif,
        Err(exif::Error::NotFound(_)) => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    Ok(exif
        .fields()
        .map(|field| {
            (
                field.tag.to_string(),
                field.display_value().with_unit(&exif).to_string(),
            )
        })
        .collect())
}

/// Render fields one per line, tag names padded to a fixed column.
pub fn format_fields(fields: &[(String, String)]) -> String {
    fields
        .iter()
        .map(|(tag, value)| format!("{:25}: {}\n", tag, value))
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::tests::write_split_png;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file() {
        let result = read_exif(Path::new("/nonexistent/photo.jpg"));
        assert!(matches!(result, Err(MetadataError::NotFound(_))));
    }

    #[test]
    fn test_png_without_exif_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("plain.png");
        write_split_png(&path, 8, 8, true);

        assert!(read_exif(&path).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_container_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("junk.jpg");
        fs::write(&path, b"not an image at all").unwrap();

        assert!(read_exif(&path).is_err());
    }

    #[test]
    fn test_format_fields_pads_tag() {
        let fields = vec![
            ("Make".to_string(), "Canon".to_string()),
            ("ExposureTime".to_string(), "1/250 s".to_string()),
        ];
        let output = format_fields(&fields);

        assert_eq!(
            output,
            format!("{:25}: Canon\n{:25}: 1/250 s\n", "Make", "ExposureTime")
        );
    }
}
