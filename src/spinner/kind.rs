//! Predefined glyph sets for the spinner animation.

use std::time::Duration;

use serde::Deserialize;

/// A glyph sequence and the rate it is cycled at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Glyphs {
    pub frames: &'static [&'static str],
    pub fps: u32,
}

impl Glyphs {
    /// Time between two frames.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(1) / self.fps
    }
}

const LINE: Glyphs = Glyphs {
    frames: &["|", "/", "-", "\\"],
    fps: 10,
};

const DOTS: Glyphs = Glyphs {
    frames: &["⣾ ", "⣽ ", "⣻ ", "⢿ ", "⡿ ", "⣟ ", "⣯ ", "⣷ "],
    fps: 10,
};

/// Braille frames for a subtle loading animation
const MINI_DOT: Glyphs = Glyphs {
    frames: &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"],
    fps: 12,
};

const JUMP: Glyphs = Glyphs {
    frames: &["⢄", "⢂", "⢁", "⡁", "⡈", "⡐", "⡠"],
    fps: 10,
};

const POINTS: Glyphs = Glyphs {
    frames: &["∙∙∙", "●∙∙", "∙●∙", "∙∙●"],
    fps: 7,
};

const PULSE: Glyphs = Glyphs {
    frames: &["█", "▓", "▒", "░"],
    fps: 8,
};

const GLOBE: Glyphs = Glyphs {
    frames: &["🌍", "🌎", "🌏"],
    fps: 4,
};

const MOON: Glyphs = Glyphs {
    frames: &["🌑", "🌒", "🌓", "🌔", "🌕", "🌖", "🌗", "🌘"],
    fps: 8,
};

const MONKEY: Glyphs = Glyphs {
    frames: &["🙈", "🙉", "🙊"],
    fps: 3,
};

const METER: Glyphs = Glyphs {
    frames: &["▱▱▱", "▰▱▱", "▰▰▱", "▰▰▰", "▰▰▱", "▰▱▱", "▱▱▱"],
    fps: 7,
};

const HAMBURGER: Glyphs = Glyphs {
    frames: &["☱", "☲", "☴", "☲"],
    fps: 3,
};

// The empty first frame is intentional: the dots grow from nothing.
const ELLIPSIS: Glyphs = Glyphs {
    frames: &["", ".", "..", "..."],
    fps: 3,
};

/// Which predefined glyph sequence a spinner cycles through.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum SpinnerType {
    Line,
    #[default]
    Dots,
    MiniDot,
    Jump,
    Points,
    Pulse,
    Globe,
    Moon,
    Monkey,
    Meter,
    Hamburger,
    Ellipsis,
}

impl SpinnerType {
    pub const ALL: [SpinnerType; 12] = [
        SpinnerType::Line,
        SpinnerType::Dots,
        SpinnerType::MiniDot,
        SpinnerType::Jump,
        SpinnerType::Points,
        SpinnerType::Pulse,
        SpinnerType::Globe,
        SpinnerType::Moon,
        SpinnerType::Monkey,
        SpinnerType::Meter,
        SpinnerType::Hamburger,
        SpinnerType::Ellipsis,
    ];

    pub fn glyphs(self) -> Glyphs {
        match self {
            SpinnerType::Line => LINE,
            SpinnerType::Dots => DOTS,
            SpinnerType::MiniDot => MINI_DOT,
            SpinnerType::Jump => JUMP,
            SpinnerType::Points => POINTS,
            SpinnerType::Pulse => PULSE,
            SpinnerType::Globe => GLOBE,
            SpinnerType::Moon => MOON,
            SpinnerType::Monkey => MONKEY,
            SpinnerType::Meter => METER,
            SpinnerType::Hamburger => HAMBURGER,
            SpinnerType::Ellipsis => ELLIPSIS,
        }
    }
}
