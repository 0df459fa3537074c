//! Text wire format for detection messages.
//!
//! ```text
//! message     := extent [ ':' detections ]
//! extent      := width ',' height
//! detections  := detection (';' detection)*
//! detection   := x ',' y ',' w ',' h ',' prob ',' classIndex
//! ```
//!
//! All fields are base-10 integers except `prob`, a decimal fraction in
//! `[0.0, 1.0]` carried into [`DetectionRecord::confidence`] as a
//! truncated percentage. A single bad record rejects the whole message.

use std::str::FromStr;

use bytes::BytesMut;

use crate::error::DecodeError;
use crate::labels::LabelTable;
use crate::message::{DetectionMessage, DetectionRecord, ImageExtent};

/// Absorbs binary representation error when scaling `prob` (0.29 * 100
/// is 28.999999999999996).
const PERCENT_EPSILON: f64 = 1e-6;

// ── Decoding ─────────────────────────────────────────────────────

/// Decode the first `length` bytes of `buf`.
///
/// `length` is the signed value a channel read returned; callers must
/// handle the negative sentinel themselves, a non-positive length is
/// reported as [`DecodeError::Empty`].
pub fn decode(
    buf: &[u8],
    length: i32,
    labels: &LabelTable,
) -> Result<DetectionMessage, DecodeError> {
    if length <= 0 {
        return Err(DecodeError::Empty);
    }
    let length = length as usize;
    if length > buf.len() {
        return Err(DecodeError::LengthOutOfBounds {
            length,
            capacity: buf.len(),
        });
    }
    decode_payload(&buf[..length], labels)
}

/// Decode one complete message.
pub fn decode_payload(
    payload: &[u8],
    labels: &LabelTable,
) -> Result<DetectionMessage, DecodeError> {
    let text = std::str::from_utf8(payload)
        .map_err(|_| DecodeError::malformed("payload is not valid UTF-8"))?;
    let text = text.trim_end_matches('\0').trim();
    if text.is_empty() {
        return Err(DecodeError::malformed("blank message"));
    }

    let mut segments = text.split(':');
    let extent = match segments.next() {
        Some(segment) => parse_extent(segment)?,
        None => return Err(DecodeError::malformed("missing extent")),
    };
    let detections = segments.next();
    if segments.next().is_some() {
        return Err(DecodeError::malformed("more than one ':' separator"));
    }

    let records = match detections {
        Some(segment) => segment
            .split(';')
            .map(|token| parse_record(token, labels))
            .collect::<Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };

    Ok(DetectionMessage { extent, records })
}

fn parse_extent(segment: &str) -> Result<ImageExtent, DecodeError> {
    let [width, height] = split_fields::<2>(segment, "extent")?;
    let width: u32 = parse_field(width, "width")?;
    let height: u32 = parse_field(height, "height")?;
    ImageExtent::new(width, height)
        .ok_or_else(|| DecodeError::malformed(format!("non-positive extent {width}x{height}")))
}

fn parse_record(token: &str, labels: &LabelTable) -> Result<DetectionRecord, DecodeError> {
    let [x, y, w, h, prob, class] = split_fields::<6>(token, "detection")?;
    let record = DetectionRecord {
        x: parse_field(x, "x")?,
        y: parse_field(y, "y")?,
        w: parse_field(w, "w")?,
        h: parse_field(h, "h")?,
        confidence: parse_confidence(prob)?,
        class_index: parse_field(class, "class index")?,
    };
    if !labels.contains(record.class_index) {
        return Err(DecodeError::UnknownClass(record.class_index));
    }
    Ok(record)
}

fn split_fields<'a, const N: usize>(
    token: &'a str,
    what: &str,
) -> Result<[&'a str; N], DecodeError> {
    let fields: Vec<&str> = token.split(',').collect();
    let count = fields.len();
    fields.try_into().map_err(|_| {
        DecodeError::malformed(format!("{what} has {count} fields, expected {N}: {token:?}"))
    })
}

fn parse_field<T: FromStr>(field: &str, name: &str) -> Result<T, DecodeError> {
    field
        .parse()
        .map_err(|_| DecodeError::malformed(format!("invalid {name}: {field:?}")))
}

fn parse_confidence(field: &str) -> Result<u8, DecodeError> {
    let prob: f64 = parse_field(field, "probability")?;
    if !prob.is_finite() || !(0.0..=1.0).contains(&prob) {
        return Err(DecodeError::malformed(format!(
            "probability out of range: {field:?}"
        )));
    }
    let percent = (prob * 100.0 + PERCENT_EPSILON).trunc();
    Ok(percent.min(100.0) as u8)
}

// ── Encoding ─────────────────────────────────────────────────────

/// Render a message in wire form. No terminator is appended.
pub fn encode(message: &DetectionMessage) -> String {
    let mut out = format!("{},{}", message.extent.width(), message.extent.height());
    if !message.records.is_empty() {
        let records: Vec<String> = message.records.iter().map(encode_record).collect();
        out.push(':');
        out.push_str(&records.join(";"));
    }
    out
}

/// Append the wire form of `message` to `dst`.
pub fn encode_into(message: &DetectionMessage, dst: &mut BytesMut) {
    dst.extend_from_slice(encode(message).as_bytes());
}

fn encode_record(record: &DetectionRecord) -> String {
    let confidence = record.confidence.min(100);
    format!(
        "{},{},{},{},{}.{:02},{}",
        record.x,
        record.y,
        record.w,
        record.h,
        confidence / 100,
        confidence % 100,
        record.class_index,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels() -> LabelTable {
        LabelTable::coco()
    }

    fn decode_str(text: &str) -> Result<DetectionMessage, DecodeError> {
        decode(text.as_bytes(), text.len() as i32, &labels())
    }

    #[test]
    fn extent_only_is_an_empty_message() {
        let msg = decode_str("640,480").unwrap();
        assert_eq!(msg.extent, ImageExtent::new(640, 480).unwrap());
        assert!(msg.records.is_empty());
    }

    #[test]
    fn single_record() {
        let msg = decode_str("640,480:100,100,50,50,0.75,2").unwrap();
        assert_eq!(
            msg.records,
            vec![DetectionRecord {
                x: 100,
                y: 100,
                w: 50,
                h: 50,
                confidence: 75,
                class_index: 2,
            }]
        );
    }

    #[test]
    fn multiple_records_keep_order() {
        let msg = decode_str("320,240:1,2,3,4,0.5,0;10,20,30,40,1.0,79;-5,6,7,8,0,1").unwrap();
        let classes: Vec<u32> = msg.records.iter().map(|r| r.class_index).collect();
        assert_eq!(classes, vec![0, 79, 1]);
        assert_eq!(msg.records[1].confidence, 100);
        assert_eq!(msg.records[2].x, -5);
        assert_eq!(msg.records[2].confidence, 0);
    }

    #[test]
    fn too_few_fields_rejects_whole_message() {
        let err = decode_str("640,480:1,2,3").unwrap_err();
        assert!(matches!(err, DecodeError::Malformed(_)));

        let err = decode_str("640,480:1,2,3,4,0.5,0;1,2,3").unwrap_err();
        assert!(matches!(err, DecodeError::Malformed(_)));
    }

    #[test]
    fn unknown_class_is_an_error() {
        let err = decode_str("640,480:1,2,3,4,0.5,80").unwrap_err();
        assert_eq!(err, DecodeError::UnknownClass(80));

        let small = LabelTable::new(["blight"]);
        let text = "640,480:1,2,3,4,0.5,1";
        let err = decode(text.as_bytes(), text.len() as i32, &small).unwrap_err();
        assert_eq!(err, DecodeError::UnknownClass(1));
    }

    #[test]
    fn bad_extents() {
        for text in ["0,480", "640,0", "640", "640,480,3", "a,b", "-640,480", " "] {
            let result = decode_str(text);
            assert!(
                matches!(result, Err(DecodeError::Malformed(_))),
                "{text:?} -> {result:?}"
            );
        }
    }

    #[test]
    fn too_many_segments() {
        assert!(matches!(
            decode_str("640,480:1,2,3,4,0.5,0:9"),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn empty_detection_segment_is_malformed() {
        assert!(matches!(
            decode_str("640,480:"),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn probability_bounds() {
        assert!(decode_str("640,480:1,2,3,4,1.01,0").is_err());
        assert!(decode_str("640,480:1,2,3,4,-0.1,0").is_err());
        assert!(decode_str("640,480:1,2,3,4,NaN,0").is_err());
        assert!(decode_str("640,480:1,2,3,4,inf,0").is_err());
    }

    #[test]
    fn probability_rounds_representation_error() {
        let msg = decode_str("640,480:1,2,3,4,0.999,0;1,2,3,4,0.29,0;1,2,3,4,0.011,0").unwrap();
        let confidences: Vec<u8> = msg.records.iter().map(|r| r.confidence).collect();
        assert_eq!(confidences, vec![99, 29, 1]);
    }

    #[test]
    fn non_positive_length_is_a_precondition() {
        let buf = b"640,480";
        assert_eq!(decode(buf, 0, &labels()), Err(DecodeError::Empty));
        assert_eq!(decode(buf, -1, &labels()), Err(DecodeError::Empty));
        assert!(decode(buf, 64, &labels()).unwrap_err().is_precondition());
    }

    #[test]
    fn only_length_bytes_are_read() {
        let mut buf = [0u8; 1024];
        let stale = b"640,480:1,2,3,4,0.5,0";
        buf[..stale.len()].copy_from_slice(stale);
        // A shorter message read into the same buffer.
        buf[..7].copy_from_slice(b"320,240");
        let msg = decode(&buf, 7, &labels()).unwrap();
        assert_eq!(msg.extent.width(), 320);
        assert!(msg.records.is_empty());
    }

    #[test]
    fn tolerates_padding_and_newline() {
        let text = b"640,480:1,2,3,4,0.5,0\n\0\0";
        let msg = decode(text, text.len() as i32, &labels()).unwrap();
        assert_eq!(msg.records.len(), 1);
    }

    #[test]
    fn invalid_utf8() {
        let bytes = [0xff, 0xfe, b',', b'1'];
        assert!(matches!(
            decode(&bytes, 4, &labels()),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn encode_matches_grammar() {
        let msg = DetectionMessage {
            extent: ImageExtent::new(640, 480).unwrap(),
            records: vec![
                DetectionRecord {
                    x: 100,
                    y: 100,
                    w: 50,
                    h: 50,
                    confidence: 75,
                    class_index: 2,
                },
                DetectionRecord {
                    x: -1,
                    y: 0,
                    w: 3,
                    h: 4,
                    confidence: 100,
                    class_index: 0,
                },
            ],
        };
        let text = encode(&msg);
        assert_eq!(text, "640,480:100,100,50,50,0.75,2;-1,0,3,4,1.00,0");
        assert_eq!(decode_str(&text).unwrap(), msg);

        assert_eq!(
            encode(&DetectionMessage::empty(ImageExtent::new(1, 2).unwrap())),
            "1,2"
        );
    }

    #[test]
    fn every_percentage_survives_encoding() {
        let extent = ImageExtent::new(640, 480).unwrap();
        for confidence in 0..=100u8 {
            let msg = DetectionMessage {
                extent,
                records: vec![DetectionRecord {
                    x: 1,
                    y: 1,
                    w: 1,
                    h: 1,
                    confidence,
                    class_index: 0,
                }],
            };
            let decoded = decode_str(&encode(&msg)).unwrap();
            assert_eq!(decoded.records[0].confidence, confidence);
        }
    }
}
