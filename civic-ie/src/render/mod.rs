//! Markup renderer
//!
//! Converts section source into HTML in one pass. Output depends only on
//! the source and the [`RenderContext`]; the same inputs always give
//! byte-identical output.

pub mod html;
pub mod markup;
mod widgets;

pub use markup::{topic_ids, Placeholder};

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::models::{DiscussionTopic, Element};
use html::{El, Node};
use markup::{MarkupParser, PlaceholderResolver};

/// Everything a render may look at
#[derive(Debug, Clone, Default)]
pub struct RenderContext {
    /// Elements attached to the section being rendered
    pub elements: BTreeMap<i64, Element>,
    pub topics: BTreeMap<i64, DiscussionTopic>,
    /// Element ids the viewing user has completed
    pub completed: BTreeSet<i64>,
}

impl RenderContext {
    pub fn new(elements: impl IntoIterator<Item = Element>) -> Self {
        Self {
            elements: elements.into_iter().map(|e| (e.id, e)).collect(),
            ..Default::default()
        }
    }

    pub fn with_topics(mut self, topics: impl IntoIterator<Item = DiscussionTopic>) -> Self {
        self.topics = topics.into_iter().map(|t| (t.id, t)).collect();
        self
    }

    pub fn with_completed(mut self, completed: impl IntoIterator<Item = i64>) -> Self {
        self.completed = completed.into_iter().collect();
        self
    }
}

/// Resolves placeholders against a context; widgets are built once per render
struct ContextResolver<'a> {
    ctx: &'a RenderContext,
    widgets: HashMap<i64, String>,
}

impl PlaceholderResolver for ContextResolver<'_> {
    fn resolve(&mut self, placeholder: &Placeholder) -> Option<Node> {
        match placeholder {
            Placeholder::Interactive(id) => {
                if let Some(html) = self.widgets.get(id) {
                    return Some(Node::Raw(html.clone()));
                }
                let element = self.ctx.elements.get(id)?;
                let html =
                    widgets::element_widget(element, self.ctx.completed.contains(id)).to_html();
                self.widgets.insert(*id, html.clone());
                Some(Node::Raw(html))
            }
            Placeholder::Topic(id) => self.ctx.topics.get(id).map(widgets::topic_card),
            Placeholder::Image(path) => Some(
                El::new("figure")
                    .class("ie-media ie-image")
                    .child(El::new("img").attr("src", path.as_str()).attr("alt", ""))
                    .into(),
            ),
            Placeholder::Video(path) => Some(video_embed(path)),
            Placeholder::Audio(path) => Some(
                El::new("div")
                    .class("ie-media ie-audio")
                    .child(
                        El::new("audio")
                            .flag("controls")
                            .attr("src", path.as_str()),
                    )
                    .into(),
            ),
        }
    }
}

fn is_video_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

/// Video id from a share URL (`…?v=ID` or `youtu.be/ID`)
pub fn video_id(path: &str) -> Option<&str> {
    let start = if let Some(pos) = path.find("youtu.be/") {
        pos + "youtu.be/".len()
    } else {
        let pos = path.find("v=")?;
        pos + 2
    };

    let rest = &path[start..];
    let end = rest.find(|c: char| !is_video_id_char(c)).unwrap_or(rest.len());
    let id = &rest[..end];
    if id.is_empty() {
        None
    } else {
        Some(id)
    }
}

fn video_embed(path: &str) -> Node {
    let wrapper = El::new("div").class("ie-media ie-video");
    match video_id(path) {
        Some(id) => wrapper
            .child(
                El::new("iframe")
                    .attr("src", format!("https://www.youtube.com/embed/{}", id))
                    .attr("title", "Embedded video")
                    .flag("allowfullscreen"),
            )
            .into(),
        None => wrapper
            .child(El::new("video").flag("controls").attr("src", path))
            .into(),
    }
}

/// Render section source against `ctx`
pub fn render_section(source: &str, ctx: &RenderContext) -> String {
    let mut resolver = ContextResolver {
        ctx,
        widgets: HashMap::new(),
    };
    MarkupParser::new(&mut resolver).render(source)
}
