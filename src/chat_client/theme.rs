//! Color themes and message rendering

use crossterm::style::{style, Color, Stylize};

use crate::message::{Category, Message};

/// Available color themes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Theme {
    Default,
    Dark,
}

/// Palette entries a theme assigns a color to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Element {
    Category(Category),
    Timestamp,
    Username,
    Header,
    Command,
}

impl Theme {
    pub const NAMES: [&'static str; 2] = ["default", "dark"];

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "default" => Some(Theme::Default),
            "dark" => Some(Theme::Dark),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Theme::Default => "default",
            Theme::Dark => "dark",
        }
    }

    pub fn color(self, element: Element) -> Color {
        match (self, element) {
            (Theme::Default, Element::Category(Category::Chat)) => Color::White,
            (Theme::Default, Element::Category(Category::System)) => Color::DarkYellow,
            (Theme::Default, Element::Category(Category::Error)) => Color::Red,
            (Theme::Default, Element::Category(Category::Private | Category::PrivateSent)) => {
                Color::DarkMagenta
            }
            (Theme::Default, Element::Timestamp) => Color::DarkBlue,
            (Theme::Default, Element::Username) => Color::Cyan,
            (Theme::Default, Element::Header) => Color::Yellow,
            (Theme::Default, Element::Command) => Color::Green,

            (Theme::Dark, Element::Category(Category::Chat)) => Color::White,
            (Theme::Dark, Element::Category(Category::System)) => Color::Blue,
            (Theme::Dark, Element::Category(Category::Error)) => Color::Red,
            (Theme::Dark, Element::Category(Category::Private | Category::PrivateSent)) => {
                Color::Magenta
            }
            (Theme::Dark, Element::Timestamp) => Color::DarkGrey,
            (Theme::Dark, Element::Username) => Color::Cyan,
            (Theme::Dark, Element::Header) => Color::Yellow,
            (Theme::Dark, Element::Command) => Color::Green,
        }
    }

    /// Render one message as a colored terminal line
    pub fn render(self, msg: &Message, show_timestamps: bool) -> String {
        let color = self.color(Element::Category(msg.category));
        let body = match msg.category {
            Category::Chat => format!(
                "{}: {}",
                style(&msg.sender).with(self.color(Element::Username)).bold(),
                style(&msg.content).with(color)
            ),
            _ => {
                // Everything but chat already reads well in wire form
                style(msg.encode()).with(color).to_string()
            }
        };

        if show_timestamps {
            let stamp = format!("[{}]", msg.timestamp.format("%H:%M:%S"));
            format!("{} {}", style(stamp).with(self.color(Element::Timestamp)), body)
        } else {
            body
        }
    }

    /// Color arbitrary text with one palette entry
    pub fn paint(self, text: &str, element: Element) -> String {
        style(text).with(self.color(element)).to_string()
    }
}
