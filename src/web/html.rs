//! Page text extraction.
//!
//! [`html_to_text`] turns an HTML document into readable lines.
//! [`TextCleaner`] then drops lines that carry no content (image embeds,
//! bare navigation links, cookie and subscription banners) and collapses
//! whitespace.

use regex::{Regex, RegexBuilder};

/// Marker appended when page text is cut at the length limit.
pub const TRUNCATION_MARKER: &str = "\n\n[Content truncated...]";

const BLOCK_TAGS: &[&str] = &[
    "p", "br", "div", "section", "article", "li", "tr", "td", "th", "h1", "h2", "h3", "h4", "h5",
    "h6", "pre", "blockquote", "table", "ul", "ol", "header", "footer",
];

const SKIPPED_TAGS: &[&str] = &["script", "style", "noscript", "svg", "nav", "template"];

/// Strips tags, skips script-like elements and comments, decodes common
/// entities, and returns one trimmed line per block.
#[must_use]
pub fn html_to_text(html: &str) -> String {
    let mut text = String::with_capacity(html.len() / 2);
    let mut rest = html;
    let mut skipping: Option<String> = None;

    while let Some(open) = rest.find('<') {
        if skipping.is_none() {
            text.push_str(&rest[..open]);
        }
        rest = &rest[open..];

        if rest.starts_with("<!--") {
            rest = rest.find("-->").map_or("", |end| &rest[end + 3..]);
            continue;
        }

        let Some(close) = tag_end(rest).or_else(|| rest.find('>')) else {
            rest = "";
            break;
        };
        let tag = &rest[1..close];
        rest = &rest[close + 1..];

        let closing = tag.starts_with('/');
        let name: String = tag
            .trim_start_matches('/')
            .chars()
            .take_while(char::is_ascii_alphanumeric)
            .collect::<String>()
            .to_ascii_lowercase();

        match &skipping {
            Some(skipped) if closing && *skipped == name => skipping = None,
            Some(_) => {}
            None if !closing && !tag.ends_with('/') && SKIPPED_TAGS.contains(&name.as_str()) => {
                skipping = Some(name);
            }
            None if BLOCK_TAGS.contains(&name.as_str()) => text.push('\n'),
            None => {}
        }
    }
    if skipping.is_none() {
        text.push_str(rest);
    }

    let decoded = decode_entities(&text);
    decoded
        .lines()
        .map(|l| l.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Offset of the `>` closing the tag at the start of `tag`, skipping
/// quoted attribute values. `None` if quotes never balance.
fn tag_end(tag: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (i, c) in tag.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '"' || c == '\'' => quote = Some(c),
            None if c == '>' => return Some(i),
            None => {}
        }
    }
    None
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&apos;", "'")
        .replace("&mdash;", "-")
        .replace("&ndash;", "-")
        .replace("&hellip;", "...")
        .replace("&amp;", "&")
}

/// Removes non-content lines from extracted page text.
#[derive(Debug, Clone)]
pub struct TextCleaner {
    image: Regex,
    comment: Regex,
    nav_link: Regex,
    boilerplate: Regex,
    blank_runs: Regex,
}

impl TextCleaner {
    /// Compiles the cleaning patterns.
    ///
    /// # Errors
    ///
    /// Returns a regex error if a pattern fails to compile.
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            image: Regex::new(r"!\[[^\]]*\]\([^)]*\)")?,
            comment: Regex::new(r"(?s)<!--.*?-->")?,
            nav_link: Regex::new(r"^\s*(?:[-*+|]\s*)?(?:\[[^\]]*\]\([^)]*\)\s*[|·•]?\s*)+$")?,
            boilerplate: RegexBuilder::new(
                r"^(?:accept (?:all )?cookies?|we use cookies|cookie (?:policy|settings)|skip to (?:main )?content|subscribe to (?:our )?newsletter|sign (?:in|up)|log ?in|share (?:this|on)|all rights reserved|advertisement|back to top|privacy policy|terms of (?:use|service)|©.*)\W*$",
            )
            .case_insensitive(true)
            .build()?,
            blank_runs: Regex::new(r"\n{3,}")?,
        })
    }

    /// Cleans `text` and truncates it to `max_chars` characters.
    #[must_use]
    pub fn clean(&self, text: &str, max_chars: usize) -> String {
        let text = self.comment.replace_all(text, "");
        let text = self.image.replace_all(&text, "");

        let kept: Vec<String> = text
            .lines()
            .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
            .map(|line| {
                if self.nav_link.is_match(&line) || self.boilerplate.is_match(&line) {
                    String::new()
                } else {
                    line
                }
            })
            .collect();
        let joined = kept.join("\n");
        let collapsed = self.blank_runs.replace_all(joined.trim(), "\n\n");

        truncate_content(&collapsed, max_chars)
    }
}

/// Cuts text to `max_chars` characters, appending [`TRUNCATION_MARKER`].
#[must_use]
pub fn truncate_content(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}{TRUNCATION_MARKER}", &text[..idx]),
        None => text.to_string(),
    }
}
