//! Source-image to destination-surface coordinate mapping.
//!
//! Each axis is scaled with truncating integer division,
//! `raw * dest / source`, and the box is then shifted from its centre to
//! its top-left corner using the scaled size.

use std::sync::Arc;

use crate::labels::LabelTable;
use crate::message::{DetectionBatch, DetectionMessage, DetectionRecord, ImageExtent, PlacedBox, SurfaceExtent};

/// Scale one coordinate. Saturates instead of overflowing when the
/// destination is much larger than the source.
fn scale(raw: i32, dest: u32, source: u32) -> i32 {
    let scaled = i64::from(raw) * i64::from(dest) / i64::from(source);
    scaled.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

/// Place one record on the destination surface.
///
/// If the surface has not been laid out (zero width or height) the
/// result is a zero-size box at the origin; check
/// [`PlacedBox::is_degenerate`] before drawing.
pub fn rescale(
    record: &DetectionRecord,
    source: ImageExtent,
    dest: SurfaceExtent,
    label: Arc<str>,
) -> PlacedBox {
    if !dest.is_laid_out() {
        return PlacedBox {
            x: 0,
            y: 0,
            width: 0,
            height: 0,
            confidence: record.confidence,
            class_index: record.class_index,
            label,
        };
    }

    let x = scale(record.x, dest.width, source.width());
    let y = scale(record.y, dest.height, source.height());
    let width = scale(record.w, dest.width, source.width());
    let height = scale(record.h, dest.height, source.height());

    PlacedBox {
        x: x.saturating_sub(width / 2),
        y: y.saturating_sub(height / 2),
        width,
        height,
        confidence: record.confidence,
        class_index: record.class_index,
        label,
    }
}

/// Place every record of `message`, skipping degenerate boxes.
///
/// Records whose class is missing from `labels` get an empty label;
/// decoding against the same table already rejects them.
pub fn rescale_all(
    message: &DetectionMessage,
    dest: SurfaceExtent,
    labels: &LabelTable,
) -> DetectionBatch {
    message
        .records
        .iter()
        .map(|record| {
            let label = labels
                .get(record.class_index)
                .cloned()
                .unwrap_or_else(|| Arc::from(""));
            rescale(record, message.extent, dest, label)
        })
        .filter(|placed| !placed.is_degenerate())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(x: i32, y: i32, w: i32, h: i32) -> DetectionRecord {
        DetectionRecord {
            x,
            y,
            w,
            h,
            confidence: 75,
            class_index: 2,
        }
    }

    fn label() -> Arc<str> {
        Arc::from("car")
    }

    #[test]
    fn doubles_and_centres() {
        let source = ImageExtent::new(640, 480).unwrap();
        let placed = rescale(
            &record(100, 100, 50, 50),
            source,
            SurfaceExtent::new(1280, 960),
            label(),
        );
        assert_eq!(
            (placed.x, placed.y, placed.width, placed.height),
            (150, 150, 100, 100)
        );
        assert_eq!(placed.confidence, 75);
        assert_eq!(&*placed.label, "car");
    }

    #[test]
    fn truncates_toward_zero() {
        let source = ImageExtent::new(3, 3).unwrap();
        let placed = rescale(&record(1, -1, 1, 1), source, SurfaceExtent::new(2, 2), label());
        // 1*2/3 = 0, -1*2/3 = 0, 1*2/3 = 0
        assert_eq!((placed.x, placed.y, placed.width), (0, 0, 0));

        let placed = rescale(&record(5, -5, 3, 3), source, SurfaceExtent::new(2, 2), label());
        // 10/3 = 3, -10/3 = -3, 6/3 = 2 -> centre shift of 1
        assert_eq!((placed.x, placed.y, placed.width, placed.height), (2, -4, 2, 2));
    }

    #[test]
    fn unlaid_surface_yields_degenerate_box() {
        let source = ImageExtent::new(640, 480).unwrap();
        for dest in [SurfaceExtent::new(0, 0), SurfaceExtent::new(0, 480), SurfaceExtent::new(640, 0)] {
            let placed = rescale(&record(100, 100, 50, 50), source, dest, label());
            assert!(placed.is_degenerate());
            assert_eq!((placed.x, placed.y), (0, 0));
        }
    }

    #[test]
    fn saturates_on_extreme_ratio() {
        let source = ImageExtent::new(1, 1).unwrap();
        let placed = rescale(
            &record(i32::MAX, i32::MIN, 2, 2),
            source,
            SurfaceExtent::new(u32::MAX, u32::MAX),
            label(),
        );
        assert_eq!(placed.width, i32::MAX);
        assert_eq!(placed.y, i32::MIN);
    }

    #[test]
    fn rescale_all_keeps_order_and_labels() {
        let labels = LabelTable::coco();
        let message = DetectionMessage {
            extent: ImageExtent::new(100, 100).unwrap(),
            records: vec![
                DetectionRecord { class_index: 0, ..record(10, 10, 4, 4) },
                DetectionRecord { class_index: 16, ..record(50, 50, 8, 8) },
            ],
        };
        let batch = rescale_all(&message, SurfaceExtent::new(200, 200), &labels);
        let names: Vec<&str> = batch.iter().map(|b| &*b.label).collect();
        assert_eq!(names, vec!["person", "dog"]);
        assert_eq!(batch.boxes()[1].x, 92);
    }

    #[test]
    fn rescale_all_drops_degenerate_boxes() {
        let message = DetectionMessage {
            extent: ImageExtent::new(100, 100).unwrap(),
            records: vec![record(10, 10, 4, 4)],
        };
        let batch = rescale_all(&message, SurfaceExtent::default(), &LabelTable::coco());
        assert!(batch.is_empty());
    }

    #[test]
    fn integer_scaling_stays_within_a_pixel_of_float() {
        let sources = [(640, 480), (1920, 1080), (416, 416), (7, 3)];
        let dests = [(1280, 960), (375, 812), (3840, 2160), (1, 1), (999, 333)];
        for (sw, sh) in sources {
            let source = ImageExtent::new(sw, sh).unwrap();
            for (dw, dh) in dests {
                for raw in [0, 1, 3, 17, 101, 479, 639, 1919] {
                    let placed = rescale(
                        &record(raw, raw, raw, raw),
                        source,
                        SurfaceExtent::new(dw, dh),
                        label(),
                    );
                    let exact_w = raw as f64 * dw as f64 / sw as f64;
                    let exact_h = raw as f64 * dh as f64 / sh as f64;
                    assert!((exact_w - placed.width as f64).abs() < 1.0);
                    assert!((exact_h - placed.height as f64).abs() < 1.0);

                    let exact_x = exact_w - exact_w / 2.0;
                    assert!((exact_x - placed.x as f64).abs() < 2.0);
                }
            }
        }
    }
}
