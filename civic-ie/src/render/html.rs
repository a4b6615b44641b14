//! Minimal HTML tree that escapes by default
//!
//! Text and attribute values are always escaped when written. [`Node::Raw`]
//! is the only way to emit pre-rendered markup.

/// Elements written without a closing tag
const VOID_TAGS: &[&str] = &["br", "hr", "img", "input", "source", "track"];

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(El),
    Text(String),
    /// Already-rendered HTML, written as-is
    Raw(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct El {
    tag: &'static str,
    attrs: Vec<(&'static str, Option<String>)>,
    children: Vec<Node>,
}

impl El {
    pub fn new(tag: &'static str) -> Self {
        Self {
            tag,
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.attrs.push((name, Some(value.into())));
        self
    }

    pub fn attr_opt(self, name: &'static str, value: Option<impl Into<String>>) -> Self {
        match value {
            Some(v) => self.attr(name, v),
            None => self,
        }
    }

    /// Boolean attribute written without a value
    pub fn flag(mut self, name: &'static str) -> Self {
        self.attrs.push((name, None));
        self
    }

    pub fn class(self, value: impl Into<String>) -> Self {
        self.attr("class", value)
    }

    pub fn child(mut self, node: impl Into<Node>) -> Self {
        self.children.push(node.into());
        self
    }

    pub fn children<I, N>(mut self, nodes: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<Node>,
    {
        self.children.extend(nodes.into_iter().map(Into::into));
        self
    }

    pub fn text(self, text: impl Into<String>) -> Self {
        self.child(Node::Text(text.into()))
    }

    fn write_to(&self, out: &mut String) {
        out.push('<');
        out.push_str(self.tag);
        for (name, value) in &self.attrs {
            out.push(' ');
            out.push_str(name);
            if let Some(value) = value {
                out.push_str("=\"");
                escape_attr_into(value, out);
                out.push('"');
            }
        }
        out.push('>');

        if VOID_TAGS.contains(&self.tag) {
            return;
        }

        for child in &self.children {
            child.write_to(out);
        }
        out.push_str("</");
        out.push_str(self.tag);
        out.push('>');
    }
}

impl From<El> for Node {
    fn from(el: El) -> Self {
        Node::Element(el)
    }
}

impl Node {
    pub fn text(text: impl Into<String>) -> Self {
        Node::Text(text.into())
    }

    pub fn write_to(&self, out: &mut String) {
        match self {
            Node::Element(el) => el.write_to(out),
            Node::Text(text) => escape_text_into(text, out),
            Node::Raw(html) => out.push_str(html),
        }
    }

    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_to(&mut out);
        out
    }
}

fn escape_text_into(text: &str, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
}

fn escape_attr_into(value: &str, out: &mut String) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_and_attributes_are_escaped() {
        let node: Node = El::new("a")
            .attr("href", "/x?a=1&b=\"2\"")
            .attr("title", "it's")
            .text("<script>alert(1)</script>")
            .into();

        assert_eq!(
            node.to_html(),
            "<a href=\"/x?a=1&amp;b=&quot;2&quot;\" title=\"it&#39;s\">&lt;script&gt;alert(1)&lt;/script&gt;</a>"
        );
    }

    #[test]
    fn test_void_and_flag_attributes() {
        let node: Node = El::new("input")
            .attr("type", "radio")
            .flag("required")
            .into();
        assert_eq!(node.to_html(), "<input type=\"radio\" required>");
    }

    #[test]
    fn test_raw_is_written_verbatim() {
        let node: Node = El::new("div")
            .child(Node::Raw("<b>kept</b>".into()))
            .child(Node::text("<b>escaped</b>"))
            .into();
        assert_eq!(
            node.to_html(),
            "<div><b>kept</b>&lt;b&gt;escaped&lt;/b&gt;</div>"
        );
    }

    #[test]
    fn test_quotes_escaped_only_in_attributes() {
        let node: Node = El::new("span").attr("data-x", "a & \"b\"").text("a & \"b\"").into();
        assert_eq!(
            node.to_html(),
            "<span data-x=\"a &amp; &quot;b&quot;\">a &amp; \"b\"</span>"
        );
    }
}
