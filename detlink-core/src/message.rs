//! Detection message types.
//!
//! `DetectionMessage` is what the wire codec produces: records in the
//! sender's image space. `DetectionBatch` is what the renderer
//! consumes: boxes placed on the destination surface.

use std::sync::Arc;

use serde::Serialize;

// ── Extents ──────────────────────────────────────────────────────

/// The coordinate space the sender used for its detections.
///
/// Both dimensions are strictly positive, so it is always safe to
/// divide by them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ImageExtent {
    width: u32,
    height: u32,
}

impl ImageExtent {
    /// Returns `None` if either dimension is zero.
    pub fn new(width: u32, height: u32) -> Option<Self> {
        (width > 0 && height > 0).then_some(Self { width, height })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

/// Size of the surface boxes are drawn onto, in pixels.
///
/// Zero in either dimension means the surface has not been laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct SurfaceExtent {
    pub width: u32,
    pub height: u32,
}

impl SurfaceExtent {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_laid_out(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

// ── DetectionRecord ──────────────────────────────────────────────

/// One detection as sent on the wire, in source-image coordinates.
///
/// `x`/`y` is the box centre.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectionRecord {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
    /// Integer percentage, `0..=100`.
    pub confidence: u8,
    pub class_index: u32,
}

// ── DetectionMessage ─────────────────────────────────────────────

/// A fully decoded message: the sender's extent plus every record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionMessage {
    pub extent: ImageExtent,
    pub records: Vec<DetectionRecord>,
}

impl DetectionMessage {
    /// A message announcing "nothing detected in this frame".
    pub fn empty(extent: ImageExtent) -> Self {
        Self {
            extent,
            records: Vec::new(),
        }
    }
}

// ── PlacedBox ────────────────────────────────────────────────────

/// A detection rescaled into destination pixels.
///
/// `x`/`y` is the top-left corner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlacedBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub confidence: u8,
    pub class_index: u32,
    pub label: Arc<str>,
}

impl PlacedBox {
    /// A zero-size box has nothing to draw.
    pub fn is_degenerate(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

// ── DetectionBatch ───────────────────────────────────────────────

/// Every box produced from one message, in message order.
///
/// A batch always replaces the previously shown set; an empty batch
/// clears the overlay.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct DetectionBatch {
    boxes: Vec<PlacedBox>,
}

impl DetectionBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, placed: PlacedBox) {
        self.boxes.push(placed);
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    pub fn boxes(&self) -> &[PlacedBox] {
        &self.boxes
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PlacedBox> {
        self.boxes.iter()
    }
}

impl From<Vec<PlacedBox>> for DetectionBatch {
    fn from(boxes: Vec<PlacedBox>) -> Self {
        Self { boxes }
    }
}

impl FromIterator<PlacedBox> for DetectionBatch {
    fn from_iter<I: IntoIterator<Item = PlacedBox>>(iter: I) -> Self {
        Self {
            boxes: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for DetectionBatch {
    type Item = PlacedBox;
    type IntoIter = std::vec::IntoIter<PlacedBox>;

    fn into_iter(self) -> Self::IntoIter {
        self.boxes.into_iter()
    }
}

impl<'a> IntoIterator for &'a DetectionBatch {
    type Item = &'a PlacedBox;
    type IntoIter = std::slice::Iter<'a, PlacedBox>;

    fn into_iter(self) -> Self::IntoIter {
        self.boxes.iter()
    }
}
