//! Line-oriented section markup
//!
//! A line matches at most one structural rule (heading, list item, whole-line
//! placeholder); every other non-empty line becomes its own paragraph. A
//! block placeholder inside a paragraph line closes the paragraph, and the
//! text after it opens a new one.
//! Inline syntax: `**bold**`, `*italic*`, `[text](url)`, `![alt](url)` and
//! `{{kind:arg}}` placeholders. Anything that does not parse is emitted as
//! escaped text, so a token that fails the grammar survives unchanged.

use super::html::{El, Node};

/// Placeholder token recognized by the grammar
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placeholder {
    Interactive(i64),
    Image(String),
    Video(String),
    Audio(String),
    Topic(i64),
}

fn parse_id(arg: &str) -> Option<i64> {
    if arg.is_empty() || !arg.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    arg.parse().ok()
}

fn parse_path(arg: &str) -> Option<String> {
    if arg.trim().is_empty() {
        return None;
    }
    Some(arg.to_string())
}

impl Placeholder {
    /// Parse the text between `{{` and `}}`
    pub fn parse(inner: &str) -> Option<Self> {
        let (kind, arg) = inner.split_once(':')?;
        match kind {
            "interactive" => parse_id(arg).map(Placeholder::Interactive),
            "topic" => parse_id(arg).map(Placeholder::Topic),
            "image" => parse_path(arg).map(Placeholder::Image),
            "video" => parse_path(arg).map(Placeholder::Video),
            "audio" => parse_path(arg).map(Placeholder::Audio),
            _ => None,
        }
    }

    /// Renders as flow content, which may not sit inside `<p>`
    pub fn is_block(&self) -> bool {
        !matches!(self, Placeholder::Topic(_))
    }
}

/// Length of the `{{…}}` candidate at the start of `s`, with its inner text
///
/// A candidate runs to the first `}}` and may not contain another `{{`.
fn placeholder_candidate(s: &str) -> Option<(usize, &str)> {
    if !s.starts_with("{{") || s.starts_with("{{{") {
        return None;
    }
    let end = s[2..].find("}}")? + 2;
    let inner = &s[2..end];
    if inner.contains("{{") {
        return None;
    }
    Some((end + 2, inner))
}

/// Find `marker` in `s`, skipping over placeholder candidates
fn find_outside_placeholders(s: &str, marker: &str) -> Option<usize> {
    let mut i = 0;
    while i < s.len() {
        let rest = &s[i..];
        if rest.starts_with(marker) {
            return Some(i);
        }
        if let Some((len, _)) = placeholder_candidate(rest) {
            i += len;
            continue;
        }
        i += rest.chars().next().map_or(1, char::len_utf8);
    }
    None
}

/// `[label](target)` at the start of `s`; returns (consumed, label, target)
fn bracketed(s: &str) -> Option<(usize, &str, &str)> {
    let body = s.strip_prefix('[')?;
    let close = find_outside_placeholders(body, "](")?;
    let label = &body[..close];
    if label.contains(']') {
        return None;
    }
    let after = &body[close + 2..];
    let end = after.find(')')?;
    let target = &after[..end];
    if target.trim().is_empty() || target.contains(char::is_whitespace) {
        return None;
    }
    Some((1 + close + 2 + end + 1, label, target))
}

/// Supplies nodes for placeholders; `None` keeps the token verbatim
pub trait PlaceholderResolver {
    fn resolve(&mut self, placeholder: &Placeholder) -> Option<Node>;
}

/// One unit of inline scanning
enum Step {
    Node(Node, usize),
    Block(Node, usize),
    Literal(usize),
}

/// Inline scan result of a paragraph line
enum Part {
    Inline(Node),
    Block(Node),
}

pub struct MarkupParser<'r, R: PlaceholderResolver> {
    resolver: &'r mut R,
}

impl<'r, R: PlaceholderResolver> MarkupParser<'r, R> {
    pub fn new(resolver: &'r mut R) -> Self {
        Self { resolver }
    }

    /// Render the whole document; blocks are separated by newlines
    pub fn render(&mut self, source: &str) -> String {
        let mut blocks: Vec<Node> = Vec::new();
        let mut list: Vec<Node> = Vec::new();

        for line in source.lines() {
            let line = line.trim_end();

            if let Some(item) = line.strip_prefix("- ") {
                list.push(El::new("li").children(self.inline(item.trim())).into());
                continue;
            }
            if !list.is_empty() {
                blocks.push(El::new("ul").children(list.drain(..)).into());
            }

            if line.trim().is_empty() {
                continue;
            }
            self.block(line, &mut blocks);
        }
        if !list.is_empty() {
            blocks.push(El::new("ul").children(list).into());
        }

        let mut out = String::new();
        for (i, block) in blocks.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            block.write_to(&mut out);
        }
        out
    }

    fn block(&mut self, line: &str, blocks: &mut Vec<Node>) {
        if let Some((level, text)) = heading(line) {
            let tag = match level {
                1 => "h1",
                2 => "h2",
                3 => "h3",
                4 => "h4",
                5 => "h5",
                _ => "h6",
            };
            blocks.push(El::new(tag).children(self.inline(text)).into());
            return;
        }

        let trimmed = line.trim();
        if let Some((len, inner)) = placeholder_candidate(trimmed) {
            if len == trimmed.len() {
                if let Some(node) = Placeholder::parse(inner)
                    .and_then(|placeholder| self.resolver.resolve(&placeholder))
                {
                    blocks.push(node);
                    return;
                }
            }
        }

        let mut run: Vec<Node> = Vec::new();
        for part in self.inline_parts(trimmed) {
            match part {
                Part::Inline(node) => run.push(node),
                Part::Block(node) => {
                    if !run.is_empty() {
                        blocks.push(El::new("p").children(run.drain(..)).into());
                    }
                    blocks.push(node);
                }
            }
        }
        if !run.is_empty() {
            blocks.push(El::new("p").children(run).into());
        }
    }

    /// Inline nodes of `s`; block placeholders stay in place
    fn inline(&mut self, s: &str) -> Vec<Node> {
        self.inline_parts(s)
            .into_iter()
            .map(|part| match part {
                Part::Inline(node) | Part::Block(node) => node,
            })
            .collect()
    }

    fn inline_parts(&mut self, s: &str) -> Vec<Part> {
        let mut nodes = Vec::new();
        let mut text = String::new();
        let mut i = 0;

        while i < s.len() {
            let rest = &s[i..];
            match self.step(rest) {
                Some(Step::Node(node, used)) => {
                    if !text.is_empty() {
                        nodes.push(Part::Inline(Node::Text(std::mem::take(&mut text))));
                    }
                    nodes.push(Part::Inline(node));
                    i += used;
                }
                Some(Step::Block(node, used)) => {
                    let lead = text.trim_end();
                    if !lead.is_empty() {
                        nodes.push(Part::Inline(Node::Text(lead.to_string())));
                    }
                    text.clear();
                    nodes.push(Part::Block(node));
                    i += used;
                    // Whitespace after a block would open an empty paragraph
                    i += s[i..].len() - s[i..].trim_start().len();
                }
                Some(Step::Literal(used)) => {
                    text.push_str(&rest[..used]);
                    i += used;
                }
                None => {
                    let ch_len = rest.chars().next().map_or(1, char::len_utf8);
                    text.push_str(&rest[..ch_len]);
                    i += ch_len;
                }
            }
        }

        if !text.is_empty() {
            nodes.push(Part::Inline(Node::Text(text)));
        }
        nodes
    }

    fn step(&mut self, rest: &str) -> Option<Step> {
        if rest.starts_with("{{") {
            let (len, inner) = placeholder_candidate(rest)?;
            let Some(placeholder) = Placeholder::parse(inner) else {
                return Some(Step::Literal(len));
            };
            return Some(match self.resolver.resolve(&placeholder) {
                Some(node) if placeholder.is_block() => Step::Block(node, len),
                Some(node) => Step::Node(node, len),
                None => Step::Literal(len),
            });
        }

        if let Some(after_bang) = rest.strip_prefix('!') {
            let (len, alt, url) = bracketed(after_bang)?;
            let img = El::new("img").attr("src", url).attr("alt", alt);
            return Some(Step::Node(img.into(), len + 1));
        }

        if rest.starts_with('[') {
            let (len, label, url) = bracketed(rest)?;
            let link = El::new("a").attr("href", url).children(self.inline(label));
            return Some(Step::Node(link.into(), len));
        }

        if let Some(body) = rest.strip_prefix("**") {
            let end = find_outside_placeholders(body, "**")?;
            let inner = &body[..end];
            if inner.is_empty() || find_outside_placeholders(inner, "*").is_some() {
                return None;
            }
            let strong = El::new("strong").children(self.inline(inner));
            return Some(Step::Node(strong.into(), end + 4));
        }

        if let Some(body) = rest.strip_prefix('*') {
            let end = find_outside_placeholders(body, "*")?;
            let inner = &body[..end];
            if inner.is_empty() {
                return None;
            }
            let em = El::new("em").children(self.inline(inner));
            return Some(Step::Node(em.into(), end + 2));
        }

        None
    }
}

/// `#`..`######` followed by a space and non-empty text
fn heading(line: &str) -> Option<(usize, &str)> {
    let level = line.bytes().take_while(|b| *b == b'#').count();
    if !(1..=6).contains(&level) {
        return None;
    }
    let text = line[level..].strip_prefix(' ')?.trim();
    if text.is_empty() {
        return None;
    }
    Some((level, text))
}

/// Every well-formed `{{topic:N}}` id in `source`
pub fn topic_ids(source: &str) -> Vec<i64> {
    let mut ids = Vec::new();
    let mut i = 0;
    while i < source.len() {
        let rest = &source[i..];
        if let Some((len, inner)) = placeholder_candidate(rest) {
            if let Some(Placeholder::Topic(id)) = Placeholder::parse(inner) {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
            i += len;
            continue;
        }
        i += rest.chars().next().map_or(1, char::len_utf8);
    }
    ids
}
