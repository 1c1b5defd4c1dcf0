use crate::provider::FieldKind;
use serde::{Deserialize, Serialize};

pub const DESCRIBE_PROMPT: &str = "Describe this image in detail, focusing on the main subject, colors, style, and any text or elements that would be relevant for creating a print-on-demand product.";

const SHORT_TITLE_PROMPT: &str = "If there is text in the image, describe only that text in 1-3 words. If there is no text, describe the image in 1-3 words. Return only the description, nothing else.";

const HTML_RULES: &str = "Output in valid HTML format using <p> for paragraphs, <strong> for bold text, <em> for italic text, and other basic HTML tags as appropriate. Do not include <html>, <head>, or <body> tags - just the content. Do not use any markdown syntax such as **, *, _, or any other non-HTML formatting.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum TitleMode {
    #[default]
    Simple,
    Compound { segments: u32 },
}

/// Everything a prompt may depend on besides the image itself.
#[derive(Debug, Clone)]
pub struct FieldContext {
    pub title_mode: TitleMode,
    pub paragraphs: u32,
    pub influencer_phrases: String,
    pub tag_count: usize,
    pub image_description: Option<String>,
}

impl Default for FieldContext {
    fn default() -> Self {
        Self {
            title_mode: TitleMode::Simple,
            paragraphs: 1,
            influencer_phrases: String::new(),
            tag_count: 10,
            image_description: None,
        }
    }
}

/// Prompt shared by the cloud providers.
pub fn field_prompt(field: FieldKind, context: &FieldContext, with_image: bool) -> String {
    match field {
        FieldKind::Title => title_prompt(context, with_image),
        FieldKind::Description => description_prompt(context, with_image),
        FieldKind::Tags => tags_prompt(context, with_image),
    }
}

/// The local model does better with a very short title request, so a simple
/// title over an image asks for a 1-3 word phrase instead.
pub fn local_field_prompt(field: FieldKind, context: &FieldContext, with_image: bool) -> String {
    match (field, context.title_mode, with_image) {
        (FieldKind::Title, TitleMode::Simple, true) => SHORT_TITLE_PROMPT.to_string(),
        _ => field_prompt(field, context, with_image),
    }
}

fn title_prompt(context: &FieldContext, with_image: bool) -> String {
    match (context.title_mode, with_image) {
        (TitleMode::Compound { segments }, _) => format!(
            "Generate a compound title with {} segments for a custom print-on-demand product. \
             Make it creative and appealing. Keep it under 60 characters. \
             Return only the title, nothing else.",
            segments.max(1)
        ),
        (TitleMode::Simple, true) => "Generate exactly one creative title for a print-on-demand product based on this image. \
             Keep it under 60 characters. Make it catchy and appealing. \
             If there is text in the design, try to use that in the title. \
             Return only the title, nothing else."
            .to_string(),
        (TitleMode::Simple, false) => "Generate a creative title for a custom print-on-demand product. \
             Keep it under 60 characters. Make it catchy and appealing. \
             Return only the title, nothing else."
            .to_string(),
    }
}

fn description_prompt(context: &FieldContext, with_image: bool) -> String {
    let subject = if with_image {
        "a print-on-demand item based on this image"
    } else {
        "a custom print-on-demand item"
    };
    let mut prompt = format!(
        "Generate a compelling product description for {subject}. Write {} paragraph(s). \
         Tap into the emotional or thematic message behind the design. \
         Use intriguing, appealing language and incorporate any text from the design. {HTML_RULES}",
        context.paragraphs.max(1)
    );
    let phrases = context.influencer_phrases.trim();
    if !phrases.is_empty() {
        prompt.push_str(&format!(
            " Incorporate the following style or perspective: {phrases}."
        ));
    }
    prompt
}

fn tags_prompt(context: &FieldContext, with_image: bool) -> String {
    let subject = match (&context.image_description, with_image) {
        (Some(description), _) if !description.trim().is_empty() => {
            format!(" based on this image description: {}", description.trim())
        }
        (_, true) => " based on this image".to_string(),
        _ => String::new(),
    };
    format!(
        "Generate {} relevant tags for a custom print-on-demand product{subject}. \
         Make them SEO-friendly and appealing. Return as a comma-separated list.",
        context.tag_count.max(1)
    )
}
