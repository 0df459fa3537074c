//! Class-name lookup for detection records.

use std::sync::Arc;

/// The 80 COCO class names, in model output order.
pub const COCO_LABELS: [&str; 80] = [
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
    "traffic light", "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat", "dog",
    "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "backpack", "umbrella",
    "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard", "sports ball", "kite",
    "baseball bat", "baseball glove", "skateboard", "surfboard", "tennis racket", "bottle",
    "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple", "sandwich", "orange",
    "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "couch", "potted plant",
    "bed", "dining table", "toilet", "tv", "laptop", "mouse", "remote", "keyboard", "cell phone",
    "microwave", "oven", "toaster", "sink", "refrigerator", "book", "clock", "vase", "scissors",
    "teddy bear", "hair drier", "toothbrush",
];

/// An ordered, fixed-size table of class names indexed by
/// `class_index`.
///
/// Cloning is cheap; the names are shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelTable {
    names: Arc<[Arc<str>]>,
}

impl LabelTable {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            names: names.into_iter().map(|s| Arc::from(s.as_ref())).collect(),
        }
    }

    pub fn coco() -> Self {
        Self::new(COCO_LABELS)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, class_index: u32) -> bool {
        (class_index as usize) < self.names.len()
    }

    pub fn get(&self, class_index: u32) -> Option<&Arc<str>> {
        self.names.get(class_index as usize)
    }
}

impl Default for LabelTable {
    fn default() -> Self {
        Self::coco()
    }
}
