//! Prompts for the image-summarisation stage.
//!
//! Kept in one place so tests can inspect them without a model. Callers can
//! override the prompt via [`crate::config::PipelineConfig::system_prompt`].

use once_cell::sync::Lazy;
use regex::Regex;

/// Default prompt sent with every image.
///
/// The fixed openers let downstream retrieval tell images, diagrams, logos
/// and symbols apart from the first words of the description.
pub const IMAGE_SUMMARY_PROMPT: &str = r#"You are an image summarizing agent. I will be giving you an image and you will provide a summary describing the image, starting with "An image", or "An illustration", or "A diagram:", or "A logo:" or "A symbol:". If it contains a part, you will try to identify the part and if it shows an action (such as a person cleaning a pool or a woman holding a pool cleaning product) you will call those out. If it is a symbol, just give the symbol a meaningful name such as "warning symbol" or "attention!""#;

/// The openers a description is expected to start with.
pub const STOCK_OPENERS: [&str; 5] = ["An image", "An illustration", "A diagram:", "A logo:", "A symbol:"];

static OPENER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:An image|An illustration|A diagram:|A logo:|A symbol:)").unwrap()
});

/// Whether `summary` starts with one of [`STOCK_OPENERS`].
pub fn has_stock_opener(summary: &str) -> bool {
    OPENER.is_match(summary)
}
