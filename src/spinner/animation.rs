//! The glyph animation component.
//!
//! Each [`Animation`] owns a process-unique id so that several animations can
//! share one event loop, and a tag that invalidates ticks scheduled before the
//! most recent frame advance.

use std::sync::atomic::{AtomicU64, Ordering};

use console::Style;

use super::kind::{Glyphs, SpinnerType};
use crate::program::{Cmd, Msg, TickMsg};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone)]
pub struct Animation {
    kind: SpinnerType,
    glyphs: Glyphs,
    style: Style,
    frame: usize,
    id: u64,
    tag: u64,
}

impl Animation {
    pub fn new(kind: SpinnerType) -> Self {
        Self {
            kind,
            glyphs: kind.glyphs(),
            style: Style::new(),
            frame: 0,
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            tag: 0,
        }
    }

    pub fn kind(&self) -> SpinnerType {
        self.kind
    }

    pub fn glyphs(&self) -> Glyphs {
        self.glyphs
    }

    pub fn style(&self) -> &Style {
        &self.style
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn set_kind(&mut self, kind: SpinnerType) {
        self.kind = kind;
        self.glyphs = kind.glyphs();
        self.frame = 0;
    }

    pub fn set_style(&mut self, style: Style) {
        self.style = style;
    }

    /// Command that delivers the next tick for this animation.
    pub fn tick(&self) -> Cmd {
        Cmd::after(
            self.glyphs.interval(),
            Msg::Tick(TickMsg {
                id: self.id,
                tag: self.tag,
            }),
        )
    }

    /// Advance on a tick addressed to this animation.
    ///
    /// Unaddressed ticks (zero id) are accepted. Ticks for another animation or
    /// carrying an outdated tag are dropped without scheduling a new one.
    pub fn update(&mut self, tick: TickMsg) -> Option<Cmd> {
        if tick.id > 0 && tick.id != self.id {
            return None;
        }
        if tick.tag > 0 && tick.tag != self.tag {
            return None;
        }

        self.frame = (self.frame + 1) % self.glyphs.frames.len();
        self.tag += 1;
        Some(self.tick())
    }

    pub fn frame(&self) -> &'static str {
        self.glyphs.frames[self.frame]
    }

    pub fn view(&self) -> String {
        self.style.apply_to(self.frame()).to_string()
    }
}
