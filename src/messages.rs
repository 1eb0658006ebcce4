//! User-visible channel text.

use crate::models::AspectRatio;

pub const UPLOAD_TITLE: &str = "Generated image";
pub const GENERATION_FAILED: &str = "❌ Something went wrong while generating the image.";
pub const EMPTY_PROMPT: &str = "⚠️ Please provide a prompt after `generate`.";

pub fn ratio_prompt(options: &[AspectRatio]) -> String {
    format!(
        "🖼 Which aspect ratio would you like? Reply with one of: {}",
        AspectRatio::join(options)
    )
}

pub fn invalid_ratio(options: &[AspectRatio]) -> String {
    format!(
        "⚠️ Please reply with one of the valid ratios: {}",
        AspectRatio::join(options)
    )
}

pub fn delivery_caption(user_id: &str) -> String {
    format!("<@{}> Here you go ⚡", user_id)
}
