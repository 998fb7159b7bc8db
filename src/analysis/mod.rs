//! Analysis Layer
//!
//! Turns recognized ingredient text into allergen findings:
//! tokenize, then fuzzy-match every token against the keyword dictionary.

pub mod dictionary;
pub mod matcher;
pub mod tokenizer;

pub use dictionary::{AllergenCategory, Dictionary, DictionaryError};
pub use matcher::{edit_distance, match_tokens, Finding, FindingSet, FuzzyMatcher};
pub use tokenizer::{tokenize, TokenStream, Tokens, MIN_TOKEN_CHARS};
