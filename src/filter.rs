use serde::Serialize;

/// Document formats the knowledge base accepts.
///
/// Anything else is excluded before fetch — no bytes are ever downloaded
/// for an unsupported type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SupportedType {
    Pdf,
    PlainText,
    Markdown,
}

impl SupportedType {
    /// Match a file name by suffix, case-insensitive.
    ///
    /// Used by filesystem-style sources (local directory, uploads, object
    /// storage keys) where the extension is the only type signal.
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_lowercase();
        if lower.ends_with(".pdf") {
            Some(Self::Pdf)
        } else if lower.ends_with(".txt") {
            Some(Self::PlainText)
        } else if lower.ends_with(".md") {
            Some(Self::Markdown)
        } else {
            None
        }
    }

    /// Match a MIME type by equality.
    ///
    /// Used by API-style sources (cloud drive, wiki attachments) that report
    /// proper media-type metadata.
    pub fn from_media_type(media_type: &str) -> Option<Self> {
        match media_type {
            "application/pdf" => Some(Self::Pdf),
            "text/plain" => Some(Self::PlainText),
            "text/markdown" => Some(Self::Markdown),
            _ => None,
        }
    }

    /// Canonical MIME type for this format.
    pub fn media_type(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::PlainText => "text/plain",
            Self::Markdown => "text/markdown",
        }
    }

    /// All supported MIME types, for sources that accept a metadata query.
    pub fn all_media_types() -> [&'static str; 3] {
        ["application/pdf", "text/plain", "text/markdown"]
    }
}

/// Predicate over file name / MIME metadata restricting to supported
/// document types. Pure functions; connectors apply it at list time and
/// the pipeline guards with it before fetch.
pub struct FileFilter;

impl FileFilter {
    /// Classify by file name suffix; `None` means unsupported.
    pub fn by_name(name: &str) -> Option<SupportedType> {
        SupportedType::from_name(name)
    }

    /// Classify by MIME type equality; `None` means unsupported.
    pub fn by_media_type(media_type: &str) -> Option<SupportedType> {
        SupportedType::from_media_type(media_type)
    }

    /// True if the file name carries a supported extension.
    pub fn matches_name(name: &str) -> bool {
        Self::by_name(name).is_some()
    }

    /// True if the MIME type is one of the supported document types.
    pub fn matches_media_type(media_type: &str) -> bool {
        Self::by_media_type(media_type).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffix_match_case_insensitive() {
        assert_eq!(SupportedType::from_name("report.PDF"), Some(SupportedType::Pdf));
        assert_eq!(SupportedType::from_name("notes.Txt"), Some(SupportedType::PlainText));
        assert_eq!(SupportedType::from_name("README.md"), Some(SupportedType::Markdown));
    }

    #[test]
    fn test_unsupported_extensions_rejected() {
        assert_eq!(SupportedType::from_name("tool.exe"), None);
        assert_eq!(SupportedType::from_name("image.png"), None);
        assert_eq!(SupportedType::from_name("archive.tar.gz"), None);
        // Extension must be a suffix, not a substring
        assert_eq!(SupportedType::from_name("notes.txt.bak"), None);
    }

    #[test]
    fn test_media_type_equality() {
        assert_eq!(
            SupportedType::from_media_type("application/pdf"),
            Some(SupportedType::Pdf)
        );
        assert_eq!(
            SupportedType::from_media_type("text/markdown"),
            Some(SupportedType::Markdown)
        );
        // Equality, not prefix: parameters disqualify
        assert_eq!(SupportedType::from_media_type("text/plain; charset=utf-8"), None);
        assert_eq!(SupportedType::from_media_type("image/png"), None);
    }

    #[test]
    fn test_filter_helpers() {
        assert!(FileFilter::matches_name("a.pdf"));
        assert!(!FileFilter::matches_name("a.exe"));
        assert!(FileFilter::matches_media_type("text/plain"));
        assert!(!FileFilter::matches_media_type("application/zip"));
    }

    #[test]
    fn test_round_trip_media_type() {
        for mt in SupportedType::all_media_types() {
            let ty = SupportedType::from_media_type(mt).unwrap();
            assert_eq!(ty.media_type(), mt);
        }
    }
}
