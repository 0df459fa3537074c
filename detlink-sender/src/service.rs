//! Synthetic detection sender.
//!
//! Generates a deterministic scene of boxes bouncing around the source
//! image and streams it to a viewer over UDP, one message per datagram.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::SinkExt;
use tokio::net::UdpSocket;
use tokio::time::MissedTickBehavior;
use tokio_util::udp::UdpFramed;
use tracing::{debug, info, warn};

use detlink_core::{DetectionCodec, DetectionMessage, DetectionRecord, ImageExtent};

use crate::config::SenderConfig;

// ── SyntheticScene ───────────────────────────────────────────────

/// Boxes moving in straight lines and bouncing off the image edges.
#[derive(Debug, Clone)]
pub struct SyntheticScene {
    extent: ImageExtent,
    boxes: usize,
    class_count: u32,
    blank_every: u64,
}

impl SyntheticScene {
    pub fn new(extent: ImageExtent, boxes: usize, class_count: u32) -> Self {
        Self {
            extent,
            boxes,
            class_count: class_count.max(1),
            blank_every: 0,
        }
    }

    /// Make every `n`th frame empty. Zero disables.
    pub fn with_blank_every(mut self, n: u64) -> Self {
        self.blank_every = n;
        self
    }

    /// The message for frame number `frame`.
    pub fn frame(&self, frame: u64) -> DetectionMessage {
        if self.blank_every > 0 && frame % self.blank_every == self.blank_every - 1 {
            return DetectionMessage::empty(self.extent);
        }

        let width = i64::from(self.extent.width());
        let height = i64::from(self.extent.height());
        let w = (width / 8).max(1);
        let h = (height / 8).max(1);

        let records = (0..self.boxes as u64)
            .map(|i| DetectionRecord {
                x: bounce(frame * 3 + i * 97, w / 2, width - w / 2),
                y: bounce(frame * 2 + i * 53, h / 2, height - h / 2),
                w: w as i32,
                h: h as i32,
                confidence: 50 + ((frame + i * 17) % 50) as u8,
                class_index: (i % u64::from(self.class_count)) as u32,
            })
            .collect();

        DetectionMessage {
            extent: self.extent,
            records,
        }
    }
}

/// Triangle wave over `[lo, hi]`.
fn bounce(t: u64, lo: i64, hi: i64) -> i32 {
    let span = hi - lo;
    if span <= 0 {
        return lo as i32;
    }
    let period = (2 * span) as u64;
    let p = (t % period) as i64;
    let offset = if p > span { 2 * span - p } else { p };
    (lo + offset) as i32
}

// ── SenderService ────────────────────────────────────────────────

/// Streams a [`SyntheticScene`] to the configured target until stopped.
pub struct SenderService {
    config: SenderConfig,
    running: Arc<AtomicBool>,
}

impl SenderService {
    pub fn new(config: SenderConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Handle another task can clear to stop the service.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Send one message per period until stopped.
    ///
    /// Send failures are logged and skipped; the viewer may simply not
    /// be listening yet.
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let extent = self
            .config
            .image_extent()
            .ok_or("image dimensions must be non-zero")?;
        let scene_cfg = &self.config.scene;
        let scene = SyntheticScene::new(extent, scene_cfg.boxes, scene_cfg.class_count)
            .with_blank_every(scene_cfg.blank_every);
        let target = self.config.target_addr()?;

        let socket = UdpSocket::bind(self.config.bind_addr()?).await?;
        info!("sending from {} to {target}", socket.local_addr()?);
        let mut framed = UdpFramed::new(socket, DetectionCodec::default());

        let mut ticker = tokio::time::interval(self.config.send_period());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        self.running.store(true, Ordering::SeqCst);
        let mut frame = 0u64;
        while self.running.load(Ordering::SeqCst) {
            ticker.tick().await;
            let message = scene.frame(frame);
            debug!("frame {frame}: {} boxes", message.records.len());
            if let Err(e) = framed.send((message, target)).await {
                warn!("send failed: {e}");
            }
            frame += 1;
        }

        info!("sender stopped after {frame} frames");
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use detlink_core::{LabelTable, codec};

    fn scene() -> SyntheticScene {
        SyntheticScene::new(ImageExtent::new(640, 480).unwrap(), 4, 3)
    }

    #[test]
    fn boxes_stay_inside_the_image() {
        let scene = scene();
        for frame in 0..2000 {
            for r in scene.frame(frame).records {
                assert!(r.x - r.w / 2 >= 0 && r.x + r.w / 2 <= 640, "{r:?}");
                assert!(r.y - r.h / 2 >= 0 && r.y + r.h / 2 <= 480, "{r:?}");
                assert!((50..100).contains(&r.confidence));
                assert!(r.class_index < 3);
            }
        }
    }

    #[test]
    fn frames_are_deterministic_and_move() {
        let scene = scene();
        assert_eq!(scene.frame(7), scene.frame(7));
        assert_ne!(scene.frame(7).records[0].x, scene.frame(8).records[0].x);
    }

    #[test]
    fn blank_frames() {
        let scene = scene().with_blank_every(3);
        assert_eq!(scene.frame(0).records.len(), 4);
        assert_eq!(scene.frame(1).records.len(), 4);
        assert!(scene.frame(2).records.is_empty());
        assert!(scene.frame(5).records.is_empty());
    }

    #[test]
    fn frames_decode_with_coco_labels() {
        let labels = LabelTable::coco();
        let scene = SyntheticScene::new(ImageExtent::new(320, 240).unwrap(), 5, 80);
        for frame in 0..50 {
            let message = scene.frame(frame);
            let decoded = codec::decode_payload(codec::encode(&message).as_bytes(), &labels);
            assert_eq!(decoded.unwrap(), message);
        }
    }

    #[test]
    fn bounce_reflects() {
        let seq: Vec<i32> = (0..8).map(|t| bounce(t, 10, 13)).collect();
        assert_eq!(seq, vec![10, 11, 12, 13, 12, 11, 10, 11]);
        assert_eq!(bounce(99, 5, 5), 5);
    }

    #[test]
    fn stop_handle_works() {
        let svc = SenderService::new(SenderConfig::default());
        assert!(!svc.is_running());
        let handle = svc.stop_handle();
        handle.store(true, Ordering::SeqCst);
        assert!(svc.is_running());
        svc.stop();
        assert!(!svc.is_running());
    }

    #[tokio::test]
    async fn sends_decodable_datagrams() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let mut config = SenderConfig::default();
        config.network.target_addr = receiver.local_addr().unwrap().to_string();
        config.network.bind_addr = "127.0.0.1:0".into();
        config.scene.rate_hz = 200;

        let svc = Arc::new(SenderService::new(config));
        let task = tokio::spawn({
            let svc = Arc::clone(&svc);
            async move { svc.run().await.map_err(|e| e.to_string()) }
        });

        let mut buf = [0u8; 1024];
        let (n, _) = tokio::time::timeout(Duration::from_secs(5), receiver.recv_from(&mut buf))
            .await
            .expect("timeout")
            .unwrap();
        let message = codec::decode_payload(&buf[..n], &LabelTable::coco()).unwrap();
        assert_eq!(message.extent.width(), 640);
        assert_eq!(message.records.len(), 3);

        svc.stop();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("sender did not stop")
            .unwrap()
            .unwrap();
    }
}
