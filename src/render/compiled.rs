// Compiled fast template shape (spec.md section 3/4.8): a static segment
// sequence interleaved with typed placeholders, derived once on first render
// and cached by content hash.

use serde::{Deserialize, Serialize};

/// The closed set of placeholder kinds the renderer resolves against a
/// `RenderContext`. Matches spec.md section 3's enumerated set exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlaceholderKind {
    Cls,
    Url,
    Keyword,
    KeywordEmoji,
    Image,
    Number,
    Now,
    Content,
    Title,
    ArticleContent,
}

impl PlaceholderKind {
    /// Recognized function names in the source template dialect.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "cls" => Self::Cls,
            "url" => Self::Url,
            "keyword" => Self::Keyword,
            "keyword_emoji" => Self::KeywordEmoji,
            "image" => Self::Image,
            "number" => Self::Number,
            "now" => Self::Now,
            "content" => Self::Content,
            "title" => Self::Title,
            "article_content" => Self::ArticleContent,
            _ => return None,
        })
    }

    /// Upper-case component used inside the `__PH_<KIND>_<INDEX>__` token.
    pub fn marker_name(&self) -> &'static str {
        match self {
            Self::Cls => "CLS",
            Self::Url => "URL",
            Self::Keyword => "KEYWORD",
            Self::KeywordEmoji => "KEYWORD_EMOJI",
            Self::Image => "IMAGE",
            Self::Number => "NUMBER",
            Self::Now => "NOW",
            Self::Content => "CONTENT",
            Self::Title => "TITLE",
            Self::ArticleContent => "ARTICLE_CONTENT",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Placeholder {
    pub token: String,
    pub kind: PlaceholderKind,
    pub arg: Option<String>,
    pub num_range: Option<(i64, i64)>,
}

/// `len(segments) == len(placeholders) + 1` (spec.md P8). Produced once per
/// distinct template content and shared by every subsequent render.
#[derive(Debug, Clone)]
pub struct CompiledFastTemplate {
    pub segments: Vec<String>,
    pub placeholders: Vec<Placeholder>,
    pub estimated_size: usize,
}

impl CompiledFastTemplate {
    pub fn invariant_holds(&self) -> bool {
        self.segments.len() == self.placeholders.len() + 1
    }
}
