//! Per-variant widget markup
//!
//! Widgets never contain answer keys; grading happens server-side.

use super::html::{El, Node};
use crate::models::{DiscussionTopic, Element, ElementContent};
use crate::payload::{
    AnswerKey, CallToActionPayload, DiscussionPromptPayload, MediaType, Payload, PollPayload,
    Question, QuestionMedia, QuizPayload, ReflectionPayload,
};

/// Wrapper plus type-specific body for one element
pub fn element_widget(element: &Element, completed: bool) -> Node {
    let mut class = format!("ie-element ie-{}", element.element_type);
    if completed {
        class.push_str(" ie-completed");
    }

    let mut wrapper = El::new("div")
        .class(class)
        .attr("data-element-id", element.id.to_string())
        .attr("data-element-type", element.element_type.as_str())
        .attr("data-completion-type", element.completion_type.as_str())
        .attr("data-points", element.points_value.to_string());
    if element.required {
        wrapper = wrapper.attr("data-required", "true");
    }
    if completed {
        wrapper = wrapper.attr("data-completed", "true");
    }

    wrapper = wrapper.child(El::new("h3").class("ie-title").text(element.title.as_str()));
    if !element.description.is_empty() {
        wrapper = wrapper.child(
            El::new("p")
                .class("ie-description")
                .text(element.description.as_str()),
        );
    }

    let body = match &element.content {
        ElementContent::Valid(Payload::Quiz(p)) => quiz(element.id, p),
        ElementContent::Valid(Payload::Reflection(p)) => reflection(p),
        ElementContent::Valid(Payload::CallToAction(p)) => call_to_action(element.id, p),
        ElementContent::Valid(Payload::DiscussionPrompt(p)) => discussion(p),
        ElementContent::Valid(Payload::Poll(p)) => poll(element.id, p),
        ElementContent::Corrupt { .. } => El::new("div").class("ie-error").text(format!(
            "Error loading {} content",
            element.element_type.display_name()
        )),
    };

    wrapper.child(body).into()
}

fn submit() -> El {
    El::new("button")
        .attr("type", "submit")
        .class("ie-submit")
        .text("Submit")
}

fn bullet_list(class: &'static str, items: &[String]) -> Option<El> {
    if items.is_empty() {
        return None;
    }
    Some(
        El::new("ul")
            .class(class)
            .children(items.iter().map(|item| El::new("li").text(item.as_str()))),
    )
}

fn question_media(media: &QuestionMedia) -> El {
    let alt = media.alt.clone().unwrap_or_default();
    match media.media_type {
        MediaType::Image => El::new("img")
            .class("ie-question-media")
            .attr("src", media.url.as_str())
            .attr("alt", alt),
        MediaType::Audio => El::new("audio")
            .class("ie-question-media")
            .flag("controls")
            .attr("src", media.url.as_str())
            .attr("aria-label", alt),
        MediaType::Video => El::new("video")
            .class("ie-question-media")
            .flag("controls")
            .attr("src", media.url.as_str())
            .attr("aria-label", alt),
    }
}

fn choice(input_type: &'static str, name: &str, value: &str, label: &str) -> El {
    El::new("label").class("ie-choice").children([
        Node::from(
            El::new("input")
                .attr("type", input_type)
                .attr("name", name)
                .attr("value", value),
        ),
        Node::text(format!(" {}", label)),
    ])
}

fn question_block(question: &Question) -> El {
    let name = format!("q-{}", question.id);
    let mut block = El::new("fieldset")
        .class("ie-question")
        .attr("data-question-id", question.id.as_str())
        .attr("data-kind", question.key.kind().as_str())
        .child(El::new("legend").text(question.text.as_str()));

    if let Some(media) = &question.media {
        block = block.child(question_media(media));
    }

    match &question.key {
        AnswerKey::MultipleChoice { options, .. } => block.children(
            options
                .iter()
                .map(|o| choice("radio", &name, &o.id, &o.text)),
        ),
        AnswerKey::TrueFalse { .. } => block
            .child(choice("radio", &name, "true", "True"))
            .child(choice("radio", &name, "false", "False")),
        AnswerKey::FillBlank { .. } => block.child(
            El::new("input")
                .attr("type", "text")
                .attr("name", name.as_str())
                .class("ie-fill-blank"),
        ),
        AnswerKey::ShortAnswer { .. } => block.child(
            El::new("textarea")
                .attr("name", name.as_str())
                .class("ie-short-answer"),
        ),
    }
}

fn quiz(element_id: i64, payload: &QuizPayload) -> El {
    let mut form = El::new("form")
        .class("ie-quiz-form")
        .attr("data-element-id", element_id.to_string())
        .attr("data-pass-score", payload.pass_score.to_string());
    if payload.randomize {
        form = form.attr("data-randomize", "true");
    }
    if let Some(limit) = payload.time_limit_seconds {
        form = form.attr("data-time-limit", limit.to_string());
    }

    form.children(payload.questions.iter().map(question_block))
        .child(submit())
}

fn reflection(payload: &ReflectionPayload) -> El {
    let mut form = El::new("form")
        .class("ie-reflection-form")
        .child(El::new("p").class("ie-prompt").text(payload.prompt.as_str()));

    if let Some(list) = bullet_list("ie-guiding-questions", &payload.guiding_questions) {
        form = form.child(list);
    }

    let textarea = El::new("textarea")
        .attr("name", "response")
        .class("ie-response")
        .attr_opt("minlength", payload.min_response_length.map(|m| m.to_string()))
        .attr_opt("maxlength", payload.max_response_length.map(|m| m.to_string()));
    form = form.child(textarea);

    if !payload.sharing_options.is_empty() {
        form = form.child(
            El::new("select")
                .attr("name", "sharing_mode")
                .class("ie-sharing-mode")
                .children(payload.sharing_options.iter().map(|mode| {
                    El::new("option")
                        .attr("value", mode.as_str())
                        .text(mode.as_str())
                })),
        );
    }

    form.child(submit())
}

fn call_to_action(element_id: i64, payload: &CallToActionPayload) -> El {
    let mut body = El::new("div")
        .class("ie-cta")
        .child(El::new("p").class("ie-cta-text").text(payload.text.as_str()));

    if let Some(secondary) = &payload.secondary_text {
        body = body.child(
            El::new("p")
                .class("ie-secondary-text")
                .text(secondary.as_str()),
        );
    }

    let button = El::new("button")
        .attr("type", "button")
        .class("ie-cta-button")
        .attr("data-action-type", payload.action_type.as_str())
        .attr_opt("data-url", payload.url.as_deref())
        .attr("data-element-id", element_id.to_string())
        .attr_opt("data-tracking-id", payload.tracking_id.as_deref())
        .text(payload.button_text.as_str());

    body.child(button)
}

fn discussion(payload: &DiscussionPromptPayload) -> El {
    let mut form = El::new("form")
        .class("ie-discussion-form")
        .child(El::new("h4").class("ie-topic").text(payload.topic.as_str()))
        .child(
            El::new("p")
                .class("ie-prompt")
                .text(payload.initial_prompt.as_str()),
        );

    if let Some(list) = bullet_list("ie-supporting-points", &payload.supporting_points) {
        form = form.child(list);
    }
    if let Some(guidelines) = &payload.guidelines {
        form = form.child(
            El::new("div")
                .class("ie-guidelines")
                .text(guidelines.as_str()),
        );
    }

    form = form.child(
        El::new("textarea")
            .attr("name", "response")
            .class("ie-response"),
    );
    if let Some(forum) = &payload.discussion_forum_id {
        form = form.child(
            El::new("input")
                .attr("type", "hidden")
                .attr("name", "discussion_forum_id")
                .attr("value", forum.as_str()),
        );
    }

    form.child(submit())
}

fn poll(element_id: i64, payload: &PollPayload) -> El {
    let input_type = if payload.allow_multiple {
        "checkbox"
    } else {
        "radio"
    };

    let options = El::new("ul")
        .class("ie-poll-options")
        .children(payload.options.iter().map(|option| {
            let mut label = El::new("label").class("ie-choice").child(
                El::new("input")
                    .attr("type", input_type)
                    .attr("name", "option_ids")
                    .attr("value", option.id.as_str()),
            );
            if let Some(image) = &option.image {
                label = label.child(
                    El::new("img")
                        .class("ie-poll-image")
                        .attr("src", image.as_str())
                        .attr("alt", option.text.as_str()),
                );
            }
            El::new("li").child(label.text(format!(" {}", option.text)))
        }));

    let mut form = El::new("form")
        .class("ie-poll-form")
        .attr("data-show-results", payload.show_results.as_str())
        .child(
            El::new("p")
                .class("ie-poll-question")
                .text(payload.question.as_str()),
        )
        .child(options);

    if payload.allow_comments {
        form = form.child(
            El::new("textarea")
                .attr("name", "comment")
                .class("ie-poll-comment"),
        );
    }

    form.child(submit()).child(
        El::new("div")
            .class("ie-poll-results")
            .attr("data-element-id", element_id.to_string())
            .flag("hidden"),
    )
}

/// Card linking to a resolved discussion topic
pub fn topic_card(topic: &DiscussionTopic) -> Node {
    let mut card = El::new("a")
        .class("ie-topic-card")
        .attr("href", format!("/discussions/topics/{}", topic.id))
        .attr("data-topic-id", topic.id.to_string())
        .child(
            El::new("span")
                .class("ie-topic-title")
                .text(topic.title.as_str()),
        );
    if let Some(summary) = &topic.summary {
        card = card.child(
            El::new("span")
                .class("ie-topic-summary")
                .text(summary.as_str()),
        );
    }
    card.into()
}
