//! Ingredient text tokenizer
//!
//! Splits OCR output into lowercase words of the Latin alphabet. Digits,
//! punctuation, whitespace and any other symbol all act as separators, so
//! OCR noise such as `weizenmeh1` breaks into `weizenmeh`.

/// Tokens shorter than this are dropped as noise
pub const MIN_TOKEN_CHARS: usize = 4;

/// Letters a token may contain: basic Latin plus the Latin-1 and
/// Latin Extended-A lowercase letters (umlauts, accents, ß).
pub fn is_token_char(c: char) -> bool {
    c.is_ascii_lowercase()
        || matches!(c, 'ß' | 'à'..='ö' | 'ø'..='ÿ' | '\u{0100}'..='\u{017F}')
}

fn is_separator(c: char) -> bool {
    !is_token_char(c)
}

/// Combining diacritical marks. Lowercasing `İ` yields `i` + U+0307, and
/// decomposed text carries umlauts this way.
fn is_combining_mark(c: char) -> bool {
    matches!(c, '\u{0300}'..='\u{036F}')
}

/// Lowercased text ready to be split. Iterate it as often as needed;
/// each pass yields the same tokens in order of appearance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenStream {
    lowered: String,
}

impl TokenStream {
    /// Iterate over the tokens
    pub fn iter(&self) -> Tokens<'_> {
        Tokens {
            inner: self.lowered.split(is_separator as fn(char) -> bool),
        }
    }
}

impl<'a> IntoIterator for &'a TokenStream {
    type Item = &'a str;
    type IntoIter = Tokens<'a>;

    fn into_iter(self) -> Tokens<'a> {
        self.iter()
    }
}

/// Lazy token iterator over a [`TokenStream`]
#[derive(Debug, Clone)]
pub struct Tokens<'a> {
    inner: std::str::Split<'a, fn(char) -> bool>,
}

impl<'a> Iterator for Tokens<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        self.inner
            .by_ref()
            .find(|piece| piece.chars().count() >= MIN_TOKEN_CHARS)
    }
}

/// Lowercase `text`, drop combining marks and prepare it for token iteration
pub fn tokenize(text: &str) -> TokenStream {
    TokenStream {
        lowered: text
            .to_lowercase()
            .chars()
            .filter(|c| !is_combining_mark(*c))
            .collect(),
    }
}
