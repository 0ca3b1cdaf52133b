//! Static button catalog
//!
//! Tokens are opaque to the client. Each one resolves to either a structured
//! action or a canonical phrase that is fed onward as if typed.

use super::Action;
use crate::contract::Button;
use crate::messages::{self, Msg};
use crate::session::{DeviceKind, Locale, NeedKind, Rating};

pub const BTN_LANG_ES_AR: &str = "BTN_LANG_ES_AR";
pub const BTN_LANG_ES_ES: &str = "BTN_LANG_ES_ES";
pub const BTN_LANG_EN: &str = "BTN_LANG_EN";
pub const BTN_NO_NAME: &str = "BTN_NO_NAME";
pub const BTN_HELP: &str = "BTN_HELP";
pub const BTN_TASK: &str = "BTN_TASK";
pub const BTN_QUESTION: &str = "BTN_QUESTION";
pub const BTN_SOLVED: &str = "BTN_SOLVED";
pub const BTN_TESTS_DONE: &str = "BTN_TESTS_DONE";
pub const BTN_PERSIST: &str = "BTN_PERSIST";
pub const BTN_TESTS_FAIL: &str = "BTN_TESTS_FAIL";
pub const BTN_HELP_STEP_PREFIX: &str = "BTN_HELP_STEP_";
pub const BTN_BACK: &str = "BTN_BACK";
pub const BTN_ESCALATE: &str = "BTN_ESCALATE";
pub const BTN_YES: &str = "BTN_YES";
pub const BTN_NO: &str = "BTN_NO";
pub const BTN_SKIP_CONTACT: &str = "BTN_SKIP_CONTACT";
pub const BTN_FEEDBACK_GOOD: &str = "BTN_FEEDBACK_GOOD";
pub const BTN_FEEDBACK_BAD: &str = "BTN_FEEDBACK_BAD";
pub const BTN_RESUME: &str = "BTN_RESUME";
pub const BTN_RESTART: &str = "BTN_RESTART";
pub const BTN_END: &str = "BTN_END";

/// Device buttons and the phrase each one stands for
const DEVICE_BUTTONS: [(&str, DeviceKind, &str); 8] = [
    ("BTN_DEV_DESKTOP", DeviceKind::Desktop, "desktop"),
    ("BTN_DEV_NOTEBOOK", DeviceKind::Notebook, "notebook"),
    ("BTN_DEV_PHONE", DeviceKind::Phone, "phone"),
    ("BTN_DEV_TABLET", DeviceKind::Tablet, "tablet"),
    ("BTN_DEV_TV", DeviceKind::TvStreaming, "smart tv"),
    ("BTN_DEV_ROUTER", DeviceKind::Router, "router"),
    ("BTN_DEV_PRINTER", DeviceKind::Printer, "printer"),
    ("BTN_DEV_OTHER", DeviceKind::Other, "other device"),
];

/// What a token stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogEntry {
    Action(Action),
    Phrase(&'static str),
}

pub fn resolve(token: &str) -> Option<CatalogEntry> {
    let action = match token {
        BTN_LANG_ES_AR => Action::Language(Locale::EsAr),
        BTN_LANG_ES_ES => Action::Language(Locale::EsEs),
        BTN_LANG_EN => Action::Language(Locale::En),
        BTN_NO_NAME => Action::SkipName,
        BTN_HELP => Action::Need(NeedKind::Problem),
        BTN_TASK => Action::Need(NeedKind::Task),
        BTN_QUESTION => Action::AskQuestion,
        BTN_SOLVED | BTN_TESTS_DONE => Action::StepWorked,
        BTN_PERSIST | BTN_TESTS_FAIL => Action::StillBroken,
        BTN_BACK => Action::GoBack,
        BTN_ESCALATE => Action::Escalate,
        BTN_YES => Action::Yes,
        BTN_NO => Action::No,
        BTN_SKIP_CONTACT => Action::SkipContact,
        BTN_FEEDBACK_GOOD => Action::Feedback(Rating::Good),
        BTN_FEEDBACK_BAD => Action::Feedback(Rating::Bad),
        BTN_RESUME => Action::Resume,
        BTN_RESTART => Action::Restart,
        BTN_END => Action::End,
        other => {
            if let Some(rest) = other.strip_prefix(BTN_HELP_STEP_PREFIX) {
                return parse_step_ordinal(rest).map(|n| CatalogEntry::Action(Action::ExplainStep(Some(n))));
            }
            return DEVICE_BUTTONS
                .iter()
                .find(|(t, _, _)| *t == other)
                .map(|(_, _, phrase)| CatalogEntry::Phrase(*phrase));
        }
    };
    Some(CatalogEntry::Action(action))
}

/// `BTN_HELP_STEP_<n>` with n a positive integer without sign or padding
fn parse_step_ordinal(rest: &str) -> Option<usize> {
    if rest.is_empty() || rest.starts_with('0') || !rest.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    rest.parse().ok()
}

fn button(token: &str, msg: Msg, locale: Locale) -> Button {
    Button::new(token, msg.text(locale))
}

pub fn language_buttons() -> Vec<Button> {
    [
        (BTN_LANG_ES_AR, Locale::EsAr),
        (BTN_LANG_ES_ES, Locale::EsEs),
        (BTN_LANG_EN, Locale::En),
    ]
    .into_iter()
    .map(|(token, locale)| Button::new(token, messages::language_label(locale)))
    .collect()
}

pub fn name_buttons(locale: Locale) -> Vec<Button> {
    vec![button(BTN_NO_NAME, Msg::LabelNoName, locale)]
}

pub fn need_buttons(locale: Locale) -> Vec<Button> {
    vec![
        button(BTN_HELP, Msg::LabelProblem, locale),
        button(BTN_TASK, Msg::LabelTask, locale),
        button(BTN_QUESTION, Msg::LabelQuestion, locale),
    ]
}

pub fn device_buttons(locale: Locale) -> Vec<Button> {
    DEVICE_BUTTONS
        .iter()
        .map(|(token, kind, _)| Button::new(*token, messages::device_label(*kind, locale)))
        .collect()
}

/// The four buttons every diagnostic step carries.
///
/// "Go back" is offered on the first step as well so every step has the same
/// four buttons; pressing it there only answers that there is no earlier step.
pub fn step_buttons(locale: Locale, ordinal: usize) -> Vec<Button> {
    vec![
        button(BTN_SOLVED, Msg::LabelWorked, locale),
        button(BTN_PERSIST, Msg::LabelStillBroken, locale),
        button(&format!("{BTN_HELP_STEP_PREFIX}{ordinal}"), Msg::LabelExplain, locale),
        button(BTN_BACK, Msg::LabelBack, locale),
    ]
}

pub fn feedback_buttons(locale: Locale) -> Vec<Button> {
    vec![
        button(BTN_FEEDBACK_GOOD, Msg::LabelFeedbackGood, locale),
        button(BTN_FEEDBACK_BAD, Msg::LabelFeedbackBad, locale),
    ]
}

pub fn escalation_buttons(locale: Locale) -> Vec<Button> {
    vec![button(BTN_SKIP_CONTACT, Msg::LabelSkipContact, locale)]
}

pub fn ticket_buttons(locale: Locale) -> Vec<Button> {
    vec![button(BTN_END, Msg::LabelEnd, locale)]
}

pub fn ended_buttons(locale: Locale) -> Vec<Button> {
    vec![button(BTN_RESTART, Msg::LabelRestart, locale)]
}

pub fn resume_buttons(locale: Locale) -> Vec<Button> {
    vec![button(BTN_RESUME, Msg::LabelResume, locale)]
}
