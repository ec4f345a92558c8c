/// Media extension matching for the `/all` archive.
///
/// Extensions are compared case-insensitively (`clip.MKV` is media). The set
/// is configurable; the default mirrors the common video containers.

/// Extensions packaged by `/all` when none are configured.
pub const DEFAULT_MEDIA_EXTENSIONS: &[&str] = &["mp4", "avi", "mkv"];

/// A set of lower-case file extensions, without the leading dot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaSet {
    extensions: Vec<String>,
}

impl Default for MediaSet {
    fn default() -> Self {
        Self::new(DEFAULT_MEDIA_EXTENSIONS.iter().copied())
    }
}

impl MediaSet {
    /// Build a set; leading dots and case are normalised away.
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut extensions: Vec<String> = extensions
            .into_iter()
            .map(|e| e.as_ref().trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        extensions.sort();
        extensions.dedup();
        Self { extensions }
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// `true` if the file name's last extension is in the set.
    pub fn matches_name(&self, file_name: &str) -> bool {
        match file_name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => self
                .extensions
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext)),
            _ => false,
        }
    }
}
