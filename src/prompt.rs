use crate::types::NewsItem;

const INSTRUCTION: &str = r#"You are an AI fake news detection system.

Given a news item (either full text or URL), you must respond ONLY in valid JSON with this shape:

{
  "label": "fake" | "real" | "uncertain",
  "confidence": 0.0 to 1.0,
  "explanation": "short explanation in simple English"
}

Rules:
- "fake" = very likely false / misleading
- "real" = very likely true / credible
- "uncertain" = not enough information to decide
- confidence = number between 0 and 1
- Do NOT add any extra text outside the JSON."#;

pub fn build_prompt(item: &NewsItem) -> String {
    let content = match item {
        NewsItem::Text(text) => format!("News text:\n{text}"),
        NewsItem::Url(url) => format!(
            "News URL: {url}\nIf you cannot actually open the URL, mark label as \"uncertain\" and explain why."
        ),
    };

    format!("{INSTRUCTION}\n\n{content}")
}
