//! Extension-based categorization of files.
//!
//! A [`Categorizer`] maps a file extension to the name of the category folder
//! the file belongs in. The table is an ordered list of [`CategoryRule`]s; when
//! two rules list the same extension the earlier rule wins. Extensions that no
//! rule lists fall into the default bucket.
//!
//! # Examples
//!
//! ```
//! use pctidy::file_category::Categorizer;
//!
//! let categorizer = Categorizer::default();
//! assert_eq!(categorizer.category_for_extension(Some("jpg")), "Images");
//! assert_eq!(categorizer.category_for_extension(Some(".PDF")), "Documents");
//! assert_eq!(categorizer.category_for_extension(Some("xyz")), "Other");
//! assert_eq!(categorizer.category_for_extension(None), "Other");
//! ```

use crate::config::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Component, Path};

/// Folder used for files whose extension matches no rule.
pub const DEFAULT_CATEGORY: &str = "Other";

/// A destination folder and the extensions that go into it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRule {
    /// Folder name, created directly under the organized directory.
    pub name: String,
    /// Extensions, matched case-insensitively, with or without a leading dot.
    pub extensions: Vec<String>,
}

impl CategoryRule {
    pub fn new(name: &str, extensions: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            extensions: extensions.iter().map(|ext| ext.to_string()).collect(),
        }
    }

    /// The built-in table.
    pub fn standard_rules() -> Vec<CategoryRule> {
        vec![
            Self::new("Images", &["jpg", "jpeg", "png", "gif", "bmp"]),
            Self::new("Documents", &["pdf", "doc", "docx", "txt", "xlsx"]),
            Self::new("Videos", &["mp4", "mkv", "avi"]),
            Self::new("Music", &["mp3", "wav"]),
            Self::new("Archives", &["zip", "rar", "tar"]),
        ]
    }
}

/// Lower-cases an extension and strips any leading dots, so ".JPG" and "jpg" compare equal.
pub fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_lowercase()
}

/// Returns the normalized extension of `path`, if it has one.
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| normalize_extension(&ext.to_string_lossy()))
        .filter(|ext| !ext.is_empty())
}

/// Case folding used wherever category folder names are compared; folder
/// names must match on case-insensitive filesystems too.
pub fn fold_case(name: &str) -> String {
    name.to_lowercase()
}

/// Maps extensions to category folder names.
#[derive(Debug, Clone)]
pub struct Categorizer {
    rules: Vec<CategoryRule>,
    default_category: String,
    extension_map: HashMap<String, usize>,
}

impl Categorizer {
    /// Builds a categorizer from an ordered rule list.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidCategory`] when a category name is empty,
    /// is not a single plain path component, appears twice, or when a rule
    /// lists an empty extension.
    pub fn new(rules: Vec<CategoryRule>, default_category: &str) -> Result<Self, ConfigError> {
        validate_category_name(default_category)?;

        let mut extension_map: HashMap<String, usize> = HashMap::new();
        let mut seen_names: Vec<String> = vec![fold_case(default_category)];

        for (index, rule) in rules.iter().enumerate() {
            validate_category_name(&rule.name)?;
            let lowered = fold_case(&rule.name);
            if seen_names.contains(&lowered) {
                return Err(ConfigError::InvalidCategory {
                    name: rule.name.clone(),
                    reason: "category listed more than once".to_string(),
                });
            }
            seen_names.push(lowered);

            for ext in &rule.extensions {
                let normalized = normalize_extension(ext);
                if normalized.is_empty() {
                    return Err(ConfigError::InvalidCategory {
                        name: rule.name.clone(),
                        reason: "empty extension".to_string(),
                    });
                }
                if let Some(&earlier) = extension_map.get(&normalized) {
                    tracing::debug!(
                        extension = %normalized,
                        kept = %rules[earlier].name,
                        ignored = %rule.name,
                        "extension listed by two categories"
                    );
                    continue;
                }
                extension_map.insert(normalized, index);
            }
        }

        Ok(Self {
            rules,
            default_category: default_category.to_string(),
            extension_map,
        })
    }

    /// Returns the category folder for an extension. Total: unknown or
    /// missing extensions map to the default category.
    pub fn category_for_extension(&self, ext: Option<&str>) -> &str {
        ext.map(normalize_extension)
            .and_then(|ext| self.extension_map.get(&ext))
            .map(|&index| self.rules[index].name.as_str())
            .unwrap_or(&self.default_category)
    }

    /// Returns the category folder for a file path, based on its extension.
    pub fn category_for_path(&self, path: &Path) -> &str {
        self.category_for_extension(extension_of(path).as_deref())
    }

    pub fn default_category(&self) -> &str {
        &self.default_category
    }

    /// All folder names this categorizer can produce, default bucket included.
    pub fn category_names(&self) -> impl Iterator<Item = &str> {
        self.rules
            .iter()
            .map(|rule| rule.name.as_str())
            .chain(std::iter::once(self.default_category.as_str()))
    }
}

impl Default for Categorizer {
    fn default() -> Self {
        let rules = CategoryRule::standard_rules();
        let extension_map = rules
            .iter()
            .enumerate()
            .flat_map(|(index, rule)| {
                rule.extensions
                    .iter()
                    .map(move |ext| (normalize_extension(ext), index))
            })
            .collect();
        Self {
            rules,
            default_category: DEFAULT_CATEGORY.to_string(),
            extension_map,
        }
    }
}

fn validate_category_name(name: &str) -> Result<(), ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidCategory {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.trim().is_empty() {
        return Err(invalid("name is empty"));
    }
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => {}
        _ => return Err(invalid("name must be a single folder name")),
    }
    if name.contains(['/', '\\']) {
        return Err(invalid("name must be a single folder name"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_standard_table() {
        let categorizer = Categorizer::default();
        assert_eq!(categorizer.category_for_extension(Some("png")), "Images");
        assert_eq!(categorizer.category_for_extension(Some("docx")), "Documents");
        assert_eq!(categorizer.category_for_extension(Some("mkv")), "Videos");
        assert_eq!(categorizer.category_for_extension(Some("wav")), "Music");
        assert_eq!(categorizer.category_for_extension(Some("tar")), "Archives");
    }

    #[test]
    fn test_extension_case_and_dot_insensitive() {
        let categorizer = Categorizer::default();
        assert_eq!(categorizer.category_for_extension(Some("JPG")), "Images");
        assert_eq!(categorizer.category_for_extension(Some(".jpg")), "Images");
        assert_eq!(categorizer.category_for_extension(Some(".Jpg")), "Images");
    }

    #[test]
    fn test_unmatched_goes_to_default() {
        let categorizer = Categorizer::default();
        assert_eq!(categorizer.category_for_extension(Some("xyz")), "Other");
        assert_eq!(categorizer.category_for_extension(None), "Other");
        assert_eq!(categorizer.category_for_path(Path::new("Makefile")), "Other");
    }

    #[test]
    fn test_category_for_path() {
        let categorizer = Categorizer::default();
        assert_eq!(
            categorizer.category_for_path(&PathBuf::from("/home/me/Downloads/photo.JPEG")),
            "Images"
        );
        assert_eq!(
            categorizer.category_for_path(Path::new("archive.tar.gz")),
            "Other"
        );
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let categorizer = Categorizer::new(
            vec![
                CategoryRule::new("Spreadsheets", &["xlsx", "csv"]),
                CategoryRule::new("Documents", &["xlsx", "pdf"]),
            ],
            "Other",
        )
        .unwrap();

        assert_eq!(
            categorizer.category_for_extension(Some("xlsx")),
            "Spreadsheets"
        );
        assert_eq!(categorizer.category_for_extension(Some("pdf")), "Documents");
    }

    #[test]
    fn test_custom_default_bucket() {
        let categorizer =
            Categorizer::new(vec![CategoryRule::new("Images", &["png"])], "Unsorted").unwrap();
        assert_eq!(categorizer.category_for_extension(Some("doc")), "Unsorted");
        let names: Vec<_> = categorizer.category_names().collect();
        assert_eq!(names, vec!["Images", "Unsorted"]);
    }

    #[test]
    fn test_invalid_category_names_rejected() {
        for name in ["", "  ", "..", ".", "a/b", "a\\b", "/abs"] {
            let result = Categorizer::new(vec![CategoryRule::new(name, &["txt"])], "Other");
            assert!(
                matches!(result, Err(ConfigError::InvalidCategory { .. })),
                "name {:?} should be rejected",
                name
            );
        }
    }

    #[test]
    fn test_duplicate_category_rejected() {
        let result = Categorizer::new(
            vec![
                CategoryRule::new("Images", &["png"]),
                CategoryRule::new("images", &["jpg"]),
            ],
            "Other",
        );
        assert!(result.is_err());

        let folded_non_ascii = Categorizer::new(
            vec![
                CategoryRule::new("Фото", &["png"]),
                CategoryRule::new("фото", &["jpg"]),
            ],
            "Other",
        );
        assert!(folded_non_ascii.is_err());

        let clashes_with_default =
            Categorizer::new(vec![CategoryRule::new("Other", &["png"])], "Other");
        assert!(clashes_with_default.is_err());
    }

    #[test]
    fn test_empty_extension_rejected() {
        let result = Categorizer::new(vec![CategoryRule::new("Images", &["."])], "Other");
        assert!(result.is_err());
    }

    #[test]
    fn test_category_names_include_default() {
        let categorizer = Categorizer::default();
        let names: Vec<_> = categorizer.category_names().collect();
        assert_eq!(
            names,
            vec!["Images", "Documents", "Videos", "Music", "Archives", "Other"]
        );
    }
}
