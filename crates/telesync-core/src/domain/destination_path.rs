//! Normalized upload directory inside the destination share

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use super::item::DerivedFileName;

/// Upload directory relative to the share root
///
/// Derived once per run from configuration. Segments are joined with `/`
/// and the share name never appears as a leading segment.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DestinationPath(String);

impl DestinationPath {
    /// The share root itself
    pub fn root() -> Self {
        Self(String::new())
    }

    /// Normalizes a configured subpath against the share name
    ///
    /// Operators often write the subpath with the share name in front
    /// (`"Media/telegram"` for share `Media`). Every leading segment equal
    /// to the share name is dropped case-insensitively, as are
    /// leading/trailing separators, empty segments and `.` segments. Both
    /// `/` and `\` act as separators. A share-named segment deeper in the
    /// path is an ordinary directory and is kept.
    pub fn normalize(subpath: &str, share: &str) -> Self {
        let trimmed = subpath.trim().trim_start_matches(['/', '\\']);
        let share = share.trim().trim_matches(['/', '\\']);

        let mut without_share = trimmed;
        loop {
            let stripped = strip_share_prefix(without_share, share)
                .trim_start_matches(['/', '\\']);
            if stripped.len() == without_share.len() {
                break;
            }
            without_share = stripped;
        }

        let segments: Vec<&str> = without_share
            .split(['/', '\\'])
            .map(str::trim)
            .filter(|s| !s.is_empty() && *s != ".")
            .collect();

        Self(segments.join("/"))
    }

    /// Returns the normalized path (`""` for the share root)
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if uploads go straight into the share root
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the individual path segments
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// Returns every cumulative ancestor, shallowest first
    ///
    /// `"a/b/c"` yields `a`, `a/b`, `a/b/c`; these are the directories that
    /// must exist before the first write.
    pub fn prefixes(&self) -> Vec<DestinationPath> {
        let mut current = String::new();
        self.segments()
            .map(|segment| {
                if !current.is_empty() {
                    current.push('/');
                }
                current.push_str(segment);
                DestinationPath(current.clone())
            })
            .collect()
    }

    /// Path of an object inside this directory
    pub fn object_path(&self, name: &DerivedFileName) -> String {
        if self.is_root() {
            name.as_str().to_string()
        } else {
            format!("{}/{}", self.0, name)
        }
    }
}

impl Display for DestinationPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            write!(f, "/")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

fn strip_share_prefix<'a>(path: &'a str, share: &str) -> &'a str {
    if share.is_empty() {
        return path;
    }

    let share_len = share.len();
    let head_matches = path
        .get(..share_len)
        .is_some_and(|head| head.eq_ignore_ascii_case(share));

    if !head_matches {
        return path;
    }

    match path[share_len..].chars().next() {
        None => "",
        Some('/') | Some('\\') => &path[share_len + 1..],
        Some(_) => path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MessageId, RemoteItem};

    #[test]
    fn test_strips_share_prefix_and_trailing_separator() {
        let path = DestinationPath::normalize("ShareName/docs/", "ShareName");
        assert_eq!(path.as_str(), "docs");
    }

    #[test]
    fn test_share_prefix_is_case_insensitive() {
        let path = DestinationPath::normalize("/sharename\\photos\\2024", "ShareName");
        assert_eq!(path.as_str(), "photos/2024");
    }

    #[test]
    fn test_subpath_equal_to_share_is_root() {
        assert!(DestinationPath::normalize("ShareName", "ShareName").is_root());
        assert!(DestinationPath::normalize(" /ShareName/ ", "ShareName").is_root());
    }

    #[test]
    fn test_empty_subpath_is_root() {
        let path = DestinationPath::normalize("", "Media");
        assert!(path.is_root());
        assert_eq!(path.to_string(), "/");
        assert!(path.prefixes().is_empty());
    }

    #[test]
    fn test_share_name_only_stripped_as_whole_segment() {
        let path = DestinationPath::normalize("Mediathek/x", "Media");
        assert_eq!(path.as_str(), "Mediathek/x");
    }

    #[test]
    fn test_repeated_leading_share_segments_are_stripped() {
        let path = DestinationPath::normalize("Media/Media/x", "Media");
        assert_eq!(path.as_str(), "x");

        let path = DestinationPath::normalize("media//MEDIA\\x", "Media");
        assert_eq!(path.as_str(), "x");
    }

    #[test]
    fn test_share_named_segment_below_the_top_is_kept() {
        let path = DestinationPath::normalize("Media/albums/Media", "Media");
        assert_eq!(path.as_str(), "albums/Media");
    }

    #[test]
    fn test_collapses_empty_and_dot_segments() {
        let path = DestinationPath::normalize("//a//./b/", "Media");
        assert_eq!(path.as_str(), "a/b");
    }

    #[test]
    fn test_prefixes_shallowest_first() {
        let path = DestinationPath::normalize("a/b/c", "Media");
        let prefixes: Vec<String> = path
            .prefixes()
            .iter()
            .map(|p| p.as_str().to_string())
            .collect();
        assert_eq!(prefixes, vec!["a", "a/b", "a/b/c"]);
    }

    #[test]
    fn test_object_path() {
        let name = DerivedFileName::for_item(&RemoteItem::photo(MessageId::new(42)));

        assert_eq!(
            DestinationPath::normalize("docs", "S").object_path(&name),
            "docs/photo_42.jpg"
        );
        assert_eq!(DestinationPath::root().object_path(&name), "photo_42.jpg");
    }
}
