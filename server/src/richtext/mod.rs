//! Rich-text event descriptions.
//!
//! Descriptions are persisted as a raw block document serialized to JSON.
//! Older rows hold plain text, so decoding never fails: anything that is not
//! a valid raw document comes back as [`Description::Plain`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDocument {
    pub blocks: Vec<RawBlock>,
    #[serde(default)]
    pub entity_map: BTreeMap<String, RawEntity>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawBlock {
    pub key: String,
    pub text: String,
    #[serde(rename = "type")]
    pub block_type: String,
    #[serde(default)]
    pub depth: u32,
    #[serde(default)]
    pub inline_style_ranges: Vec<InlineStyleRange>,
    #[serde(default)]
    pub entity_ranges: Vec<EntityRange>,
    #[serde(default)]
    pub data: Map<String, Value>,
}

/// Offsets and lengths count UTF-16 code units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InlineStyleRange {
    pub offset: usize,
    pub length: usize,
    pub style: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRange {
    pub offset: usize,
    pub length: usize,
    pub key: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEntity {
    #[serde(rename = "type")]
    pub entity_type: String,
    pub mutability: String,
    #[serde(default)]
    pub data: Map<String, Value>,
}

fn block_key() -> String {
    Uuid::new_v4().simple().to_string()[..5].to_string()
}

impl RawBlock {
    pub fn unstyled(text: impl Into<String>) -> Self {
        Self {
            key: block_key(),
            text: text.into(),
            block_type: "unstyled".to_string(),
            depth: 0,
            inline_style_ranges: Vec::new(),
            entity_ranges: Vec::new(),
            data: Map::new(),
        }
    }

    fn contains(offset: usize, start: usize, length: usize) -> bool {
        offset >= start && offset - start < length
    }
}

impl RawDocument {
    /// One unstyled block per line, the way an editor opens plain text.
    pub fn from_plain_text(text: &str) -> Self {
        let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
        Self {
            blocks: normalized.split('\n').map(RawBlock::unstyled).collect(),
            entity_map: BTreeMap::new(),
        }
    }

    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn plain_text(&self) -> String {
        self.blocks
            .iter()
            .map(|block| block.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn is_blank(&self) -> bool {
        self.blocks.iter().all(|block| block.text.trim().is_empty())
    }

    pub fn to_html(&self) -> String {
        let mut out: Vec<String> = Vec::new();
        let mut open_list: Option<&'static str> = None;

        for block in &self.blocks {
            let list_tag = match block.block_type.as_str() {
                "unordered-list-item" => Some("ul"),
                "ordered-list-item" => Some("ol"),
                _ => None,
            };
            if open_list != list_tag {
                if let Some(tag) = open_list {
                    out.push(format!("</{}>", tag));
                }
                if let Some(tag) = list_tag {
                    out.push(format!("<{}>", tag));
                }
                open_list = list_tag;
            }

            let inner = self.render_inline(block);
            let inner = if inner.is_empty() {
                "<br>".to_string()
            } else {
                inner
            };
            let html = match block.block_type.as_str() {
                "header-one" => format!("<h1>{}</h1>", inner),
                "header-two" => format!("<h2>{}</h2>", inner),
                "header-three" => format!("<h3>{}</h3>", inner),
                "header-four" => format!("<h4>{}</h4>", inner),
                "header-five" => format!("<h5>{}</h5>", inner),
                "header-six" => format!("<h6>{}</h6>", inner),
                "blockquote" => format!("<blockquote>{}</blockquote>", inner),
                "code-block" => format!("<pre><code>{}</code></pre>", inner),
                "atomic" => format!("<figure>{}</figure>", inner),
                "unordered-list-item" | "ordered-list-item" => format!("  <li>{}</li>", inner),
                _ => format!("<p>{}</p>", inner),
            };
            out.push(html);
        }
        if let Some(tag) = open_list {
            out.push(format!("</{}>", tag));
        }

        out.join("\n")
    }

    fn render_inline(&self, block: &RawBlock) -> String {
        // (styles, entity key, text) runs
        let mut runs: Vec<(Vec<&str>, Option<usize>, String)> = Vec::new();
        let mut offset = 0;

        for ch in block.text.chars() {
            let mut styles: Vec<&str> = block
                .inline_style_ranges
                .iter()
                .filter(|r| RawBlock::contains(offset, r.offset, r.length))
                .map(|r| r.style.as_str())
                .collect();
            styles.sort_by_key(|style| style_rank(style));
            styles.dedup();
            let entity = block
                .entity_ranges
                .iter()
                .find(|r| RawBlock::contains(offset, r.offset, r.length))
                .map(|r| r.key);
            offset += ch.len_utf16();

            let same_run = matches!(
                runs.last(),
                Some((run_styles, run_entity, _)) if *run_styles == styles && *run_entity == entity
            );
            if same_run {
                if let Some((_, _, text)) = runs.last_mut() {
                    text.push(ch);
                }
            } else {
                runs.push((styles, entity, ch.to_string()));
            }
        }

        runs.into_iter()
            .map(|(styles, entity, text)| {
                let mut html = escape_html(&text);
                for style in styles.iter().rev() {
                    if let Some(tag) = style_tag(style) {
                        html = format!("<{tag}>{html}</{tag}>");
                    }
                }
                match entity.and_then(|key| self.link_url(key)) {
                    Some(url) => format!("<a href=\"{}\">{}</a>", escape_html(url), html),
                    None => html,
                }
            })
            .collect()
    }

    fn link_url(&self, key: usize) -> Option<&str> {
        let entity = self.entity_map.get(&key.to_string())?;
        if entity.entity_type != "LINK" {
            return None;
        }
        entity.data.get("url").and_then(Value::as_str)
    }
}

fn style_rank(style: &str) -> usize {
    match style {
        "BOLD" => 0,
        "ITALIC" => 1,
        "UNDERLINE" => 2,
        "STRIKETHROUGH" => 3,
        "CODE" => 4,
        _ => 5,
    }
}

fn style_tag(style: &str) -> Option<&'static str> {
    match style {
        "BOLD" => Some("strong"),
        "ITALIC" => Some("em"),
        "UNDERLINE" => Some("u"),
        "STRIKETHROUGH" => Some("del"),
        "CODE" => Some("code"),
        _ => None,
    }
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// A stored description after the single decode step.
#[derive(Debug, Clone, PartialEq)]
pub enum Description {
    Rich(RawDocument),
    Plain(String),
}

impl Description {
    pub fn decode(stored: &str) -> Self {
        match serde_json::from_str::<RawDocument>(stored) {
            Ok(document) => Description::Rich(document),
            Err(_) => Description::Plain(stored.to_string()),
        }
    }

    /// Editable content. Plain text is wrapped one block per line.
    pub fn into_document(self) -> RawDocument {
        match self {
            Description::Rich(document) => document,
            Description::Plain(text) => RawDocument::from_plain_text(&text),
        }
    }

    pub fn plain_text(&self) -> String {
        match self {
            Description::Rich(document) => document.plain_text(),
            Description::Plain(text) => text.clone(),
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            Description::Rich(document) => document.is_blank(),
            Description::Plain(text) => text.trim().is_empty(),
        }
    }

    pub fn to_html(&self) -> String {
        match self {
            Description::Rich(document) => document.to_html(),
            Description::Plain(text) => escape_html(text).replace('\n', "<br />"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn styled_document() -> RawDocument {
        serde_json::from_value(json!({
            "blocks": [
                {
                    "key": "a1b2c",
                    "text": "Kickoff at HQ",
                    "type": "header-two",
                    "depth": 0,
                    "inlineStyleRanges": [{ "offset": 0, "length": 7, "style": "BOLD" }],
                    "entityRanges": [],
                    "data": {}
                },
                {
                    "key": "d3e4f",
                    "text": "Agenda",
                    "type": "unordered-list-item",
                    "depth": 0,
                    "inlineStyleRanges": [],
                    "entityRanges": [{ "offset": 0, "length": 6, "key": 0 }],
                    "data": {}
                },
                {
                    "key": "g5h6i",
                    "text": "Q&A",
                    "type": "unordered-list-item",
                    "depth": 0,
                    "inlineStyleRanges": [{ "offset": 2, "length": 1, "style": "ITALIC" }],
                    "entityRanges": [],
                    "data": {}
                }
            ],
            "entityMap": {
                "0": { "type": "LINK", "mutability": "MUTABLE", "data": { "url": "https://example.com/agenda" } }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_decode_rich_round_trip() {
        let document = styled_document();
        let stored = document.encode().unwrap();

        match Description::decode(&stored) {
            Description::Rich(decoded) => {
                assert_eq!(decoded, document);
                assert_eq!(decoded.to_html(), document.to_html());
            }
            Description::Plain(_) => panic!("expected rich content"),
        }
    }

    #[test]
    fn test_decode_legacy_plain_text() {
        let description = Description::decode("Line one\nLine two");
        assert_eq!(description, Description::Plain("Line one\nLine two".to_string()));

        let document = description.into_document();
        assert_eq!(document.blocks.len(), 2);
        assert_eq!(document.blocks[1].text, "Line two");
        assert_eq!(document.plain_text(), "Line one\nLine two");
    }

    #[test]
    fn test_non_document_json_is_plain() {
        assert!(matches!(Description::decode("42"), Description::Plain(_)));
        assert!(matches!(
            Description::decode(r#"{"title": "x"}"#),
            Description::Plain(_)
        ));
    }

    #[test]
    fn test_html_rendering() {
        let html = styled_document().to_html();
        assert_eq!(
            html,
            "<h2><strong>Kickoff</strong> at HQ</h2>\n\
             <ul>\n  \
             <li><a href=\"https://example.com/agenda\">Agenda</a></li>\n  \
             <li>Q&amp;<em>A</em></li>\n\
             </ul>"
        );
    }

    #[test]
    fn test_plain_fallback_html_escapes_and_breaks_lines() {
        let description = Description::Plain("<b>Hi</b>\nthere".to_string());
        assert_eq!(description.to_html(), "&lt;b&gt;Hi&lt;/b&gt;<br />there");
    }

    #[test]
    fn test_empty_block_renders_line_break() {
        let document = RawDocument::from_plain_text("");
        assert_eq!(document.to_html(), "<p><br></p>");
        assert!(document.is_blank());
    }

    #[test]
    fn test_style_offsets_count_utf16_units() {
        let mut block = RawBlock::unstyled("🎉 Party");
        // The emoji is two UTF-16 units, then a space.
        block.inline_style_ranges.push(InlineStyleRange {
            offset: 3,
            length: 5,
            style: "BOLD".to_string(),
        });
        let document = RawDocument {
            blocks: vec![block],
            entity_map: BTreeMap::new(),
        };
        assert_eq!(document.to_html(), "<p>🎉 <strong>Party</strong></p>");
    }

    #[test]
    fn test_ranges_reaching_past_the_text() {
        let mut block = RawBlock::unstyled("Open floor");
        block.inline_style_ranges.push(InlineStyleRange {
            offset: 5,
            length: usize::MAX,
            style: "BOLD".to_string(),
        });
        block.inline_style_ranges.push(InlineStyleRange {
            offset: usize::MAX,
            length: usize::MAX,
            style: "ITALIC".to_string(),
        });
        let document = RawDocument {
            blocks: vec![block],
            entity_map: BTreeMap::new(),
        };
        assert_eq!(document.to_html(), "<p>Open <strong>floor</strong></p>");
    }
}
