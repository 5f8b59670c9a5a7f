//! Console style roles for the host binary.
//!
//! Each logical role maps to an optional `colored::Color`. Colouring is applied
//! only when the `enabled` flag passed to `paint()` is true, so no global state
//! decides whether output is coloured.
//!
//! ```
//! use eventqueue::core::styles::StyleRole;
//! assert_eq!(StyleRole::Header.paint("Queues", false), "Queues");
//! let coloured = StyleRole::Header.paint("Queues", true);
//! assert!(coloured.starts_with("\x1b[") && coloured.ends_with("\x1b[0m"));
//! ```

use crate::queue::api::QueueState;
use clap::builder::styling::AnsiColor;
use colored::Color;

macro_rules! style {
    ( $( $variant:ident => $color:expr ),+ $(,)? ) => {
        #[derive(Copy, Clone, Debug, PartialEq, Eq)]
        pub enum StyleRole { $( $variant ),+ }

        impl StyleRole {
            pub fn color(self) -> Option<Color> {
                match self { $( StyleRole::$variant => $color ),+ }
            }
        }
    }
}

// Value => None (uncoloured)
style! {
    Header      => Some(Color::Yellow),
    Literal     => Some(Color::Cyan),
    Placeholder => Some(Color::Green),
    Running     => Some(Color::Green),
    Draining    => Some(Color::Yellow),
    Stopped     => Some(Color::BrightBlack),
    Error       => Some(Color::BrightRed),
    Key         => Some(Color::BrightGreen),
    Value       => None,
}

impl StyleRole {
    /// Role used to show a queue's lifecycle state
    pub fn for_state(state: QueueState) -> Self {
        match state {
            QueueState::Running => StyleRole::Running,
            QueueState::ShuttingDown => StyleRole::Draining,
            QueueState::Stopped => StyleRole::Stopped,
        }
    }

    pub fn paint(self, text: &str, enabled: bool) -> String {
        match self.color() {
            Some(color) if enabled => format!("\x1b[{}m{}\x1b[0m", color.to_fg_str(), text),
            _ => text.to_string(),
        }
    }
}

/// Render a `label: value` line for the operator console
pub fn key_value(label: &str, value: impl std::fmt::Display, enabled: bool) -> String {
    format!(
        "{}: {}",
        StyleRole::Key.paint(label, enabled),
        StyleRole::Value.paint(&value.to_string(), enabled)
    )
}

fn color_to_ansi(c: Color) -> Option<AnsiColor> {
    use self::AnsiColor as A;
    use Color::*;
    Some(match c {
        Black => A::Black,
        Red => A::Red,
        Green => A::Green,
        Yellow => A::Yellow,
        Blue => A::Blue,
        Magenta => A::Magenta,
        Cyan => A::Cyan,
        White => A::White,
        BrightBlack => A::BrightBlack,
        BrightRed => A::BrightRed,
        BrightGreen => A::BrightGreen,
        BrightYellow => A::BrightYellow,
        BrightBlue => A::BrightBlue,
        BrightMagenta => A::BrightMagenta,
        BrightCyan => A::BrightCyan,
        BrightWhite => A::BrightWhite,
        _ => return None,
    })
}

/// Build clap Styles for `--help` output from the same roles
pub fn palette_to_clap(enabled: bool) -> clap::builder::Styles {
    use clap::builder::styling::{Color as ClapColor, Style};
    if !enabled {
        return clap::builder::Styles::plain();
    }

    let style = |role: StyleRole, bold: bool| {
        let mut s = Style::new();
        if let Some(col) = role.color().and_then(color_to_ansi) {
            s = s.fg_color(Some(ClapColor::Ansi(col)));
        }
        if bold {
            s = s.bold();
        }
        s
    };

    clap::builder::Styles::styled()
        .header(style(StyleRole::Header, true))
        .usage(style(StyleRole::Header, true))
        .literal(style(StyleRole::Literal, false))
        .placeholder(style(StyleRole::Placeholder, false))
        .error(style(StyleRole::Error, true))
}
