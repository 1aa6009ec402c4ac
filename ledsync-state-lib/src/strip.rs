//! Fixed-capacity segment table
//!
//! All `max_segments` slots exist for the lifetime of the strip. Disabling a
//! segment sets its `stop` to 0; the slot itself is never removed.

use log::debug;

use crate::config::StripConfig;
use crate::host::Renderer;
use crate::segment::{Segment, SegmentOption};

/// Geometry committed to a segment in one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentBounds {
    pub start: u16,
    pub stop: u16,
    /// 0 keeps the current grouping and spacing
    pub grouping: u8,
    pub spacing: u8,
    pub offset: u16,
}

impl SegmentBounds {
    #[must_use]
    pub const fn of(segment: &Segment) -> Self {
        Self {
            start: segment.start,
            stop: segment.stop,
            grouping: segment.grouping,
            spacing: segment.spacing,
            offset: segment.offset,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Strip {
    config: StripConfig,
    segments: Vec<Segment>,
    main_segment: u8,
}

impl Strip {
    /// Create the table with slot 0 covering the whole strip.
    #[must_use]
    pub fn new(mut config: StripConfig) -> Self {
        config.validate();
        let mut segments = vec![Segment::default(); usize::from(config.max_segments)];
        if let Some(first) = segments.first_mut() {
            first.stop = config.total_leds;
            first.set_option(SegmentOption::Selected, true);
        }
        Self {
            config,
            segments,
            main_segment: 0,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &StripConfig {
        &self.config
    }

    #[must_use]
    pub const fn total_leds(&self) -> u16 {
        self.config.total_leds
    }

    /// Number of slots in the table.
    #[must_use]
    pub const fn max_segments(&self) -> u8 {
        self.config.max_segments
    }

    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    #[must_use]
    pub fn segment(&self, id: u8) -> Option<&Segment> {
        self.segments.get(usize::from(id))
    }

    pub fn segment_mut(&mut self, id: u8) -> Option<&mut Segment> {
        self.segments.get_mut(usize::from(id))
    }

    #[must_use]
    pub const fn main_segment_id(&self) -> u8 {
        self.main_segment
    }

    #[must_use]
    pub fn main_segment(&self) -> &Segment {
        &self.segments[usize::from(self.main_segment)]
    }

    pub fn main_segment_mut(&mut self) -> &mut Segment {
        &mut self.segments[usize::from(self.main_segment)]
    }

    /// Ids of active segments, in table order.
    pub fn active_ids(&self) -> impl Iterator<Item = u8> + '_ {
        (0..self.config.max_segments).filter(|&id| self.segments[usize::from(id)].is_active())
    }

    fn first_active(&self) -> Option<u8> {
        self.active_ids().next()
    }

    /// Make `id` the main segment if it is active, else the first active slot (or 0).
    pub fn set_main_segment(&mut self, id: u8) {
        self.main_segment = match self.segment(id) {
            Some(segment) if segment.is_active() => id,
            _ => self.first_active().unwrap_or(0),
        };
    }

    pub fn unfreeze_all(&mut self) {
        for segment in &mut self.segments {
            segment.set_option(SegmentOption::Freeze, false);
        }
    }

    /// Commit new geometry to segment `id`; returns whether anything changed.
    ///
    /// A `stop` at or below `start` disables the slot. `stop` is clamped to the
    /// strip length and a `start` beyond the strip is ignored.
    pub fn configure_segment(&mut self, id: u8, bounds: SegmentBounds, renderer: &mut dyn Renderer) -> bool {
        let total = self.config.total_leds;
        let Some(segment) = self.segments.get_mut(usize::from(id)) else {
            return false;
        };
        if SegmentBounds::of(segment) == bounds {
            return false;
        }
        let previous = (segment.start, segment.stop);

        if bounds.stop <= bounds.start {
            debug!("Disabling segment {id}");
            segment.stop = 0;
            segment.offset = 0;
            segment.name = None;
        } else {
            if bounds.start < total {
                segment.start = bounds.start;
            }
            segment.stop = bounds.stop.min(total);
            if bounds.grouping > 0 {
                segment.grouping = bounds.grouping;
                segment.spacing = bounds.spacing;
            }
            if segment.is_active() {
                segment.offset = bounds.offset.min(segment.length() - 1);
            } else {
                segment.stop = 0;
                segment.offset = 0;
                segment.name = None;
            }
        }

        let disabled = !segment.is_active();
        renderer.segment_changed(id, previous);
        if disabled && id == self.main_segment {
            self.main_segment = self.first_active().unwrap_or(0);
        }
        true
    }
}
