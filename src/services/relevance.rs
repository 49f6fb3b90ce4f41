use crate::models::news::NewsItem;
use crate::utils::text::strip_html;

/// Cheap precision filter: case-insensitive substring match against a fixed keyword list.
#[derive(Debug, Clone)]
pub struct RelevanceClassifier {
    keywords: Vec<String>,
}

impl RelevanceClassifier {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        Self { keywords }
    }

    pub fn is_relevant(&self, text: &str) -> bool {
        if text.is_empty() {
            return false;
        }
        let lowered = text.to_lowercase();
        self.keywords.iter().any(|k| lowered.contains(k.as_str()))
    }

    /// Relevant when the title or the markup-free summary matches.
    pub fn is_relevant_item(&self, item: &NewsItem) -> bool {
        self.is_relevant(&item.title) || self.is_relevant(&strip_html(&item.summary_raw))
    }
}
