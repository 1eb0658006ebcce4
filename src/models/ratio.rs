use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Aspect ratios accepted in the reply turn, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AspectRatio {
    #[serde(rename = "21:9")]
    UltraWide,
    #[serde(rename = "16:9")]
    Widescreen,
    #[serde(rename = "3:2")]
    Classic,
    #[serde(rename = "4:3")]
    Standard,
    #[serde(rename = "5:4")]
    NearSquare,
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "4:5")]
    NearSquarePortrait,
    #[serde(rename = "3:4")]
    StandardPortrait,
    #[serde(rename = "2:3")]
    ClassicPortrait,
    #[serde(rename = "9:16")]
    WidescreenPortrait,
    #[serde(rename = "9:21")]
    UltraTall,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 11] = [
        AspectRatio::UltraWide,
        AspectRatio::Widescreen,
        AspectRatio::Classic,
        AspectRatio::Standard,
        AspectRatio::NearSquare,
        AspectRatio::Square,
        AspectRatio::NearSquarePortrait,
        AspectRatio::StandardPortrait,
        AspectRatio::ClassicPortrait,
        AspectRatio::WidescreenPortrait,
        AspectRatio::UltraTall,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::UltraWide => "21:9",
            AspectRatio::Widescreen => "16:9",
            AspectRatio::Classic => "3:2",
            AspectRatio::Standard => "4:3",
            AspectRatio::NearSquare => "5:4",
            AspectRatio::Square => "1:1",
            AspectRatio::NearSquarePortrait => "4:5",
            AspectRatio::StandardPortrait => "3:4",
            AspectRatio::ClassicPortrait => "2:3",
            AspectRatio::WidescreenPortrait => "9:16",
            AspectRatio::UltraTall => "9:21",
        }
    }

    /// Exact match against the vocabulary after trimming surrounding whitespace.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        Self::ALL.into_iter().find(|ratio| ratio.as_str() == text)
    }

    /// The whole vocabulary joined with `", "`.
    pub fn options_list() -> String {
        Self::join(&Self::ALL)
    }

    pub fn join(options: &[AspectRatio]) -> String {
        options
            .iter()
            .map(AspectRatio::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownAspectRatio(pub String);

impl fmt::Display for UnknownAspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown aspect ratio: {}", self.0)
    }
}

impl std::error::Error for UnknownAspectRatio {}

impl FromStr for AspectRatio {
    type Err = UnknownAspectRatio;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| UnknownAspectRatio(s.to_string()))
    }
}
