//! Allergen keyword dictionary
//!
//! Maps each regulated allergen category to the ingredient words that
//! indicate it. A dictionary is immutable once built; share it with `Arc`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Regulated allergen categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AllergenCategory {
    Gluten,
    Crustaceans,
    Eggs,
    Fish,
    Peanuts,
    Soy,
    Milk,
    Lactose,
    TreeNuts,
    Celery,
    Mustard,
    Sesame,
    Sulfites,
}

impl AllergenCategory {
    pub const ALL: [AllergenCategory; 13] = [
        AllergenCategory::Gluten,
        AllergenCategory::Crustaceans,
        AllergenCategory::Eggs,
        AllergenCategory::Fish,
        AllergenCategory::Peanuts,
        AllergenCategory::Soy,
        AllergenCategory::Milk,
        AllergenCategory::Lactose,
        AllergenCategory::TreeNuts,
        AllergenCategory::Celery,
        AllergenCategory::Mustard,
        AllergenCategory::Sesame,
        AllergenCategory::Sulfites,
    ];

    /// German label as printed on labels
    pub fn label(&self) -> &'static str {
        match self {
            AllergenCategory::Gluten => "Gluten",
            AllergenCategory::Crustaceans => "Krebstiere",
            AllergenCategory::Eggs => "Eier",
            AllergenCategory::Fish => "Fisch",
            AllergenCategory::Peanuts => "Erdnüsse",
            AllergenCategory::Soy => "Soja",
            AllergenCategory::Milk => "Milch",
            AllergenCategory::Lactose => "Laktose",
            AllergenCategory::TreeNuts => "Schalenfrüchte",
            AllergenCategory::Celery => "Sellerie",
            AllergenCategory::Mustard => "Senf",
            AllergenCategory::Sesame => "Sesam",
            AllergenCategory::Sulfites => "Schwefel",
        }
    }

    pub fn english_name(&self) -> &'static str {
        match self {
            AllergenCategory::Gluten => "Gluten",
            AllergenCategory::Crustaceans => "Crustaceans",
            AllergenCategory::Eggs => "Eggs",
            AllergenCategory::Fish => "Fish",
            AllergenCategory::Peanuts => "Peanuts",
            AllergenCategory::Soy => "Soy",
            AllergenCategory::Milk => "Milk",
            AllergenCategory::Lactose => "Lactose",
            AllergenCategory::TreeNuts => "Tree nuts",
            AllergenCategory::Celery => "Celery",
            AllergenCategory::Mustard => "Mustard",
            AllergenCategory::Sesame => "Sesame",
            AllergenCategory::Sulfites => "Sulfites",
        }
    }

    /// Key used in dictionary files
    pub fn key(&self) -> &'static str {
        match self {
            AllergenCategory::Gluten => "gluten",
            AllergenCategory::Crustaceans => "crustaceans",
            AllergenCategory::Eggs => "eggs",
            AllergenCategory::Fish => "fish",
            AllergenCategory::Peanuts => "peanuts",
            AllergenCategory::Soy => "soy",
            AllergenCategory::Milk => "milk",
            AllergenCategory::Lactose => "lactose",
            AllergenCategory::TreeNuts => "tree_nuts",
            AllergenCategory::Celery => "celery",
            AllergenCategory::Mustard => "mustard",
            AllergenCategory::Sesame => "sesame",
            AllergenCategory::Sulfites => "sulfites",
        }
    }

    /// Inverse of [`AllergenCategory::key`]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.key() == key)
    }
}

impl fmt::Display for AllergenCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// E-numbers contain digits and never equal a token; the spelled-out sulfite
// names are what actually matches.
const BUILTIN_KEYWORDS: &[(AllergenCategory, &[&str])] = &[
    (
        AllergenCategory::Gluten,
        &[
            "gluten", "weizen", "weizenmehl", "roggen", "gerste", "dinkel", "hafer", "grünkern",
            "kamut", "kleie", "malz", "schrot", "bulgur", "couscous", "polenta", "paniermehl",
        ],
    ),
    (
        AllergenCategory::Crustaceans,
        &[
            "krebs", "shrimps", "krabben", "garnelen", "muscheln", "langusten", "hummer", "scampi",
            "crevetten", "krill", "seespinne",
        ],
    ),
    // "ei" is shorter than any token, so it only matches with max_distance >= 2
    (AllergenCategory::Eggs, &[" ei ", "mayonnaise", "eipulver", "eier"]),
    (AllergenCategory::Fish, &["fisch", "lachs", "thunfisch", "hering"]),
    (AllergenCategory::Peanuts, &["erdnüsse", "erdnussöl", "erdnussbutter"]),
    (AllergenCategory::Soy, &["soja", "sojamehl", "sojasauce"]),
    (
        AllergenCategory::Milk,
        &["milch", "vollmilch", "magermilch", "butter", "joghurt", "kasein", "laktose"],
    ),
    (AllergenCategory::Lactose, &["laktose", "milchzucker"]),
    (
        AllergenCategory::TreeNuts,
        &[
            "nüsse", "nuss", "haselnüsse", "mandeln", "walnüsse", "cashew", "paranüsse",
            "pistazien", "kaschunüsse", "nougat", "marzipan",
        ],
    ),
    (AllergenCategory::Celery, &["sellerie", "knollensellerie"]),
    (AllergenCategory::Mustard, &["senf", "senfkörner", "senfmehl"]),
    (AllergenCategory::Sesame, &["sesam", "sesamöl", "sesamsamen"]),
    (
        AllergenCategory::Sulfites,
        // E numbers are split at their digits by the tokenizer and are kept
        // for exported dictionaries and custom tokenizers
        &["e220", "e228", "schwefeldioxid", "sulfit", "disulfit"],
    ),
];

/// Errors loading or building a dictionary
#[derive(Debug, Error)]
pub enum DictionaryError {
    #[error("failed to read dictionary {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid dictionary: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize dictionary: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("empty keyword in category {0}")]
    EmptyKeyword(AllergenCategory),
    #[error("unknown allergen category '{0}'")]
    UnknownCategory(String),
}

/// On-disk dictionary format
#[derive(Debug, Default, Serialize, Deserialize)]
struct DictionaryFile {
    keywords: BTreeMap<String, Vec<String>>,
}

/// Immutable category -> keywords table with a length index for matching
#[derive(Debug, Clone)]
pub struct Dictionary {
    entries: BTreeMap<AllergenCategory, Vec<String>>,
    /// Keywords bucketed by char count
    by_length: BTreeMap<usize, Vec<(AllergenCategory, String)>>,
}

impl Dictionary {
    /// Build from (category, keywords) pairs. Keywords are trimmed and
    /// lowercased; duplicates within a category are dropped, order is kept.
    pub fn from_entries<I, K>(entries: I) -> Result<Self, DictionaryError>
    where
        I: IntoIterator<Item = (AllergenCategory, Vec<K>)>,
        K: AsRef<str>,
    {
        let mut table: BTreeMap<AllergenCategory, Vec<String>> = BTreeMap::new();
        for (category, keywords) in entries {
            let mut list = table.remove(&category).unwrap_or_default();
            for keyword in keywords {
                if !push_keyword(&mut list, keyword.as_ref()) {
                    return Err(DictionaryError::EmptyKeyword(category));
                }
            }
            if !list.is_empty() {
                table.insert(category, list);
            }
        }
        Ok(Self::index(table))
    }

    /// The built-in German ingredient vocabulary
    pub fn builtin() -> Self {
        let mut table: BTreeMap<AllergenCategory, Vec<String>> = BTreeMap::new();
        for (category, keywords) in BUILTIN_KEYWORDS {
            let list = table.entry(*category).or_default();
            for keyword in keywords.iter() {
                push_keyword(list, keyword);
            }
        }
        Self::index(table)
    }

    fn index(entries: BTreeMap<AllergenCategory, Vec<String>>) -> Self {
        let mut by_length: BTreeMap<usize, Vec<(AllergenCategory, String)>> = BTreeMap::new();
        for (category, keywords) in &entries {
            for keyword in keywords {
                by_length
                    .entry(keyword.chars().count())
                    .or_default()
                    .push((*category, keyword.clone()));
            }
        }
        Self { entries, by_length }
    }

    /// Parse a TOML dictionary (`[keywords]` table keyed by category)
    pub fn from_toml_str(content: &str) -> Result<Self, DictionaryError> {
        let file: DictionaryFile = toml::from_str(content)?;
        let mut entries = Vec::with_capacity(file.keywords.len());
        for (key, keywords) in file.keywords {
            let category = AllergenCategory::from_key(&key)
                .ok_or(DictionaryError::UnknownCategory(key))?;
            entries.push((category, keywords));
        }
        Self::from_entries(entries)
    }

    /// Load a TOML dictionary file
    pub fn load(path: &Path) -> Result<Self, DictionaryError> {
        let content = std::fs::read_to_string(path).map_err(|source| DictionaryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let dictionary = Self::from_toml_str(&content)?;
        debug!(
            "Loaded dictionary from {:?}: {} categories, {} keywords",
            path,
            dictionary.entries.len(),
            dictionary.len()
        );
        Ok(dictionary)
    }

    /// Serialize in the same format [`Dictionary::from_toml_str`] reads
    pub fn to_toml_string(&self) -> Result<String, DictionaryError> {
        let file = DictionaryFile {
            keywords: self
                .entries
                .iter()
                .map(|(category, keywords)| (category.key().to_string(), keywords.clone()))
                .collect(),
        };
        Ok(toml::to_string_pretty(&file)?)
    }

    /// Categories that have at least one keyword
    pub fn categories(&self) -> impl Iterator<Item = AllergenCategory> + '_ {
        self.entries.keys().copied()
    }

    /// Keywords of one category, in dictionary order
    pub fn keywords(&self, category: AllergenCategory) -> &[String] {
        self.entries.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every (category, keyword) pair
    pub fn iter(&self) -> impl Iterator<Item = (AllergenCategory, &str)> + '_ {
        self.entries
            .iter()
            .flat_map(|(category, keywords)| keywords.iter().map(move |k| (*category, k.as_str())))
    }

    /// Keywords whose char count is within `max_distance` of `token_len`.
    /// Any keyword outside this range is further than `max_distance` edits away.
    pub fn candidates(
        &self,
        token_len: usize,
        max_distance: usize,
    ) -> impl Iterator<Item = (AllergenCategory, &str)> + '_ {
        let lo = token_len.saturating_sub(max_distance);
        let hi = token_len.saturating_add(max_distance);
        self.by_length
            .range(lo..=hi)
            .flat_map(|(_, bucket)| bucket.iter().map(|(c, k)| (*c, k.as_str())))
    }

    /// Total number of keywords
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Normalize and append a keyword. Returns false if it is blank.
fn push_keyword(list: &mut Vec<String>, raw: &str) -> bool {
    let keyword = raw.trim().to_lowercase();
    if keyword.is_empty() {
        return false;
    }
    if !list.contains(&keyword) {
        list.push(keyword);
    }
    true
}

impl Default for Dictionary {
    fn default() -> Self {
        Self::builtin()
    }
}
