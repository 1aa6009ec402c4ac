//! Segment model
//!
//! A segment is one slot of the fixed-capacity segment table: an LED range plus
//! its own effect parameters. Slots are never removed; `stop == 0` marks an
//! unused slot.

use std::fmt;

use enumset::{EnumSet, EnumSetType};
use num_integer::Integer;
use serde::Serialize;

use crate::color::Rgbw;

mod merge;

pub use merge::wrap_offset;

/// Effect id of the solid-color effect, which does not redraw on its own.
pub const FX_MODE_STATIC: u8 = 0;

/// Longest segment name kept, in characters.
pub const MAX_NAME_LEN: usize = 32;

/// Default primary color of a fresh segment (warm orange).
pub const DEFAULT_COLOR: Rgbw = Rgbw::new(255, 160, 0, 0);

/// Boolean segment options.
#[derive(EnumSetType, Debug)]
pub enum SegmentOption {
    Selected,
    Reversed,
    On,
    Mirror,
    Freeze,
    Reversed2D,
    Rotated2D,
}

/// Categories of difference between two segments, used for change notification.
#[derive(EnumSetType, Debug)]
pub enum SegmentDiff {
    Brightness,
    Options,
    Colors,
    Effect,
    Bounds,
    /// Grouping, spacing or rotation offset
    Geometry,
    /// Only the selection flag differs
    Selection,
}

/// A display name of 1 to [`MAX_NAME_LEN`] printable characters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SegmentName(String);

impl SegmentName {
    /// Build a name, dropping control characters and truncating to [`MAX_NAME_LEN`].
    ///
    /// Returns `None` when nothing printable is left.
    #[must_use]
    pub fn new(text: &str) -> Option<Self> {
        let name: String = text
            .chars()
            .filter(|c| !c.is_control())
            .take(MAX_NAME_LEN)
            .collect();
        if name.is_empty() {
            None
        } else {
            Some(Self(name))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SegmentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// First LED (inclusive)
    pub start: u16,
    /// Last LED (exclusive); 0 = slot unused
    pub stop: u16,
    /// Rotation offset, always within `[0, length - 1]`
    pub offset: u16,
    pub grouping: u8,
    pub spacing: u8,
    /// Segment brightness (never stored as 0; "off" is the `On` option)
    pub opacity: u8,
    pub options: EnumSet<SegmentOption>,
    pub cct: u8,
    pub colors: [Rgbw; 3],
    pub mode: u8,
    pub speed: u8,
    pub intensity: u8,
    pub custom1: u8,
    pub custom2: u8,
    pub custom3: u8,
    pub palette: u8,
    pub name: Option<SegmentName>,
}

impl Default for Segment {
    fn default() -> Self {
        Self {
            start: 0,
            stop: 0,
            offset: 0,
            grouping: 1,
            spacing: 0,
            opacity: 255,
            options: EnumSet::only(SegmentOption::On),
            cct: 127,
            colors: [DEFAULT_COLOR, Rgbw::BLACK, Rgbw::BLACK],
            mode: FX_MODE_STATIC,
            speed: 128,
            intensity: 128,
            custom1: 128,
            custom2: 128,
            custom3: 128,
            palette: 0,
            name: None,
        }
    }
}

impl Segment {
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.stop > self.start
    }

    /// Number of physical LEDs covered (0 when inactive).
    #[must_use]
    pub const fn length(&self) -> u16 {
        self.stop.saturating_sub(self.start)
    }

    /// Number of addressable pixels after grouping, spacing and mirroring.
    #[must_use]
    pub fn virtual_length(&self) -> u16 {
        let group_len = u16::from(self.grouping) + u16::from(self.spacing);
        let mut vlen = Integer::div_ceil(&self.length(), &group_len.max(1));
        if self.option(SegmentOption::Mirror) {
            vlen = Integer::div_ceil(&vlen, &2);
        }
        vlen
    }

    #[must_use]
    pub fn option(&self, option: SegmentOption) -> bool {
        self.options.contains(option)
    }

    pub fn set_option(&mut self, option: SegmentOption, enabled: bool) {
        if enabled {
            self.options.insert(option);
        } else {
            self.options.remove(option);
        }
    }

    #[must_use]
    pub fn is_selected(&self) -> bool {
        self.option(SegmentOption::Selected)
    }

    /// Classify how `self` differs from `other`.
    ///
    /// Freeze is runtime-only and never counts as a difference.
    #[must_use]
    pub fn differs(&self, other: &Self) -> EnumSet<SegmentDiff> {
        let mut diff = EnumSet::new();
        if self.start != other.start || self.stop != other.stop {
            diff.insert(SegmentDiff::Bounds);
        }
        if self.offset != other.offset
            || self.grouping != other.grouping
            || self.spacing != other.spacing
        {
            diff.insert(SegmentDiff::Geometry);
        }
        if self.opacity != other.opacity {
            diff.insert(SegmentDiff::Brightness);
        }
        if self.mode != other.mode
            || self.speed != other.speed
            || self.intensity != other.intensity
            || self.custom1 != other.custom1
            || self.custom2 != other.custom2
            || self.custom3 != other.custom3
            || self.palette != other.palette
        {
            diff.insert(SegmentDiff::Effect);
        }
        if self.colors != other.colors || self.cct != other.cct {
            diff.insert(SegmentDiff::Colors);
        }

        let ignored = SegmentOption::Selected | SegmentOption::Freeze;
        if self.options - ignored != other.options - ignored {
            diff.insert(SegmentDiff::Options);
        }
        if self.is_selected() != other.is_selected() {
            diff.insert(SegmentDiff::Selection);
        }
        diff
    }
}
