//! Session Coordinator
//!
//! Runs one frame end to end: landmarks -> EAR -> drowsiness state machine
//! -> alert command on alarm edges -> telemetry poll -> statistics. Frames
//! never overlap; renderers read immutable snapshots taken at frame end.

use std::time::Instant;

use alert_link::{parse_telemetry, AlertCommand, DeviceLink, DeviceNotice, LinkStatus, SerialStream};
use dms::{ClosureState, DmsEvent, DrowsinessMonitor, EyePair, LandmarkFrame};
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::stats::{FpsMeter, ScreenshotRequest, SessionStats, TelemetryReading};

/// Everything a renderer needs to draw one frame's overlay
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SessionSnapshot {
    /// EAR of the last frame, `None` when no face was visible
    pub ear: Option<f32>,
    pub closure: ClosureState,
    pub stats: SessionStats,
    pub telemetry: TelemetryReading,
    /// Reading is at or above the configured alcohol limit
    pub alcohol_over_limit: bool,
    pub device_connected: bool,
    pub fps: f32,
    pub last_event: Option<DmsEvent>,
}

/// Per-frame driver of the drowsiness session
pub struct SessionCoordinator<T = SerialStream> {
    monitor: DrowsinessMonitor,
    link: DeviceLink<T>,
    stats: SessionStats,
    telemetry: TelemetryReading,
    alcohol_limit: i32,
    last_ear: Option<f32>,
    last_event: Option<DmsEvent>,
    fps: FpsMeter,
    screenshot: Option<ScreenshotRequest>,
    snapshots: watch::Sender<SessionSnapshot>,
}

impl<T: AsyncRead + AsyncWrite + Unpin> SessionCoordinator<T> {
    pub fn new(monitor: DrowsinessMonitor, link: DeviceLink<T>, alcohol_limit: i32) -> Self {
        let (snapshots, _) = watch::channel(SessionSnapshot::default());
        let coordinator = Self {
            monitor,
            link,
            stats: SessionStats::default(),
            telemetry: TelemetryReading::default(),
            alcohol_limit,
            last_ear: None,
            last_event: None,
            fps: FpsMeter::new(Instant::now()),
            screenshot: None,
            snapshots,
        };
        coordinator.publish();
        coordinator
    }

    /// Process one frame of landmark provider output.
    ///
    /// A landmark set too short for the eye indices is logged and treated
    /// as "no face" so the frame still counts.
    pub async fn process_landmarks(&mut self, frame: &LandmarkFrame) -> DmsEvent {
        let eyes = match frame.eyes() {
            Ok(eyes) => eyes,
            Err(e) => {
                warn!("Unusable landmarks, treating frame as no face: {}", e);
                None
            }
        };
        self.process_frame(eyes.as_ref()).await
    }

    /// Process one frame. `eyes` is `None` when no face was detected.
    pub async fn process_frame(&mut self, eyes: Option<&EyePair>) -> DmsEvent {
        let ear = eyes.map(EyePair::ear);
        let event = self.monitor.update(ear);

        match event {
            DmsEvent::AlarmRaised(_) => {
                metrics::counter!("dms_alarms_total").increment(1);
                self.dispatch(AlertCommand::Engage).await;
            }
            DmsEvent::AlarmCleared => self.dispatch(AlertCommand::Normal).await,
            DmsEvent::BlinkDetected => {
                self.stats.total_blinks += 1;
                metrics::counter!("dms_blinks_total").increment(1);
            }
            _ => {}
        }

        self.poll_telemetry().await;

        self.stats.frames_processed += 1;
        self.last_ear = ear;
        self.last_event = Some(event);
        self.fps.tick(Instant::now());

        metrics::counter!("dms_frames_processed_total").increment(1);
        if let Some(ear) = ear {
            metrics::gauge!("dms_ear").set(ear as f64);
        }

        self.publish();
        event
    }

    async fn dispatch(&mut self, command: AlertCommand) {
        if let Err(e) = self.link.send_command(command).await {
            metrics::counter!("dms_command_failures_total").increment(1);
            warn!("Alert command {:?} dropped: {}", command, e);
        }
    }

    async fn poll_telemetry(&mut self) {
        let Some(line) = self.link.poll_line().await else {
            return;
        };

        if let Some(notice) = DeviceNotice::classify(&line) {
            warn!(?notice, "Device: {}", line);
        }

        if self.telemetry.update(parse_telemetry(&line)) {
            metrics::gauge!("dms_alcohol_level").set(self.telemetry.alcohol_level as f64);
            debug!(level = self.telemetry.alcohol_level, "Alcohol reading");
            if self.telemetry.exceeds(self.alcohol_limit) {
                warn!(
                    level = self.telemetry.alcohol_level,
                    limit = self.alcohol_limit,
                    "Alcohol reading over limit"
                );
            }
        }
    }

    /// Send the "normal" command, close the link and report the session
    pub async fn shutdown(mut self) -> SessionStats {
        if self.link.is_connected() {
            self.dispatch(AlertCommand::Normal).await;
        }
        self.link.close().await;
        info!(
            total_blinks = self.stats.total_blinks,
            total_frames = self.stats.frames_processed,
            "Session finished"
        );
        self.stats
    }
}

impl<T> SessionCoordinator<T> {
    /// Immutable view of the state at the end of the last frame
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            ear: self.last_ear,
            closure: self.monitor.state(),
            stats: self.stats,
            telemetry: self.telemetry,
            alcohol_over_limit: self.telemetry.exceeds(self.alcohol_limit),
            device_connected: self.link.is_connected(),
            fps: self.fps.fps(),
            last_event: self.last_event,
        }
    }

    /// Snapshots published at the end of every frame
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.subscribe()
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.snapshot());
    }

    /// Zero the blink counter; nothing else is touched
    pub fn reset_blink_counter(&mut self) {
        self.stats.total_blinks = 0;
        info!("Blink counter reset");
        self.publish();
    }

    /// Ask the renderer to save the current frame
    pub fn request_screenshot(&mut self) {
        let request = ScreenshotRequest::new(self.stats.frames_processed);
        info!("Screenshot requested: {}", request.file_name);
        self.screenshot = Some(request);
    }

    /// Hand the pending screenshot request to the renderer, once
    pub fn take_screenshot_request(&mut self) -> Option<ScreenshotRequest> {
        self.screenshot.take()
    }

    pub fn closure_state(&self) -> ClosureState {
        self.monitor.state()
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn telemetry(&self) -> TelemetryReading {
        self.telemetry
    }

    pub fn last_ear(&self) -> Option<f32> {
        self.last_ear
    }

    pub fn link_status(&self) -> LinkStatus {
        self.link.status()
    }

    pub fn device_connected(&self) -> bool {
        self.link.is_connected()
    }

    pub fn fps(&self) -> f32 {
        self.fps.fps()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alert_link::LinkConfig;
    use dms::{EyeContour, FaceLandmarks, Point};
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};

    /// Both eyes 30px wide with the given lid gap: EAR = gap / 30
    fn eyes(gap: f32) -> EyePair {
        let h = gap / 2.0;
        let contour = EyeContour::new([
            Point::new(0.0, 0.0),
            Point::new(10.0, -h),
            Point::new(20.0, -h),
            Point::new(30.0, 0.0),
            Point::new(20.0, h),
            Point::new(10.0, h),
        ]);
        EyePair { left: contour, right: contour }
    }

    fn open() -> EyePair {
        eyes(9.0)
    }

    fn closed() -> EyePair {
        eyes(3.0)
    }

    async fn connected() -> (SessionCoordinator<DuplexStream>, DuplexStream) {
        let (ours, mut device) = duplex(1024);
        let mut link = DeviceLink::from_stream(ours, "mock", LinkConfig::default());
        device.write_all(b"SYSTEM_READY\n").await.unwrap();
        link.await_ready().await.unwrap();
        (SessionCoordinator::new(DrowsinessMonitor::default(), link, 400), device)
    }

    fn degraded() -> SessionCoordinator<DuplexStream> {
        SessionCoordinator::new(
            DrowsinessMonitor::default(),
            DeviceLink::absent(LinkConfig::default()),
            400,
        )
    }

    async fn run(
        coordinator: &mut SessionCoordinator<DuplexStream>,
        eyes: Option<EyePair>,
        frames: u32,
    ) -> Vec<DmsEvent> {
        let mut events = Vec::new();
        for _ in 0..frames {
            events.push(coordinator.process_frame(eyes.as_ref()).await);
        }
        events
    }

    #[tokio::test]
    async fn test_one_command_per_alarm_edge() {
        let (mut coordinator, mut device) = connected().await;

        let events = run(&mut coordinator, Some(closed()), 120).await;
        assert_eq!(events.iter().filter(|e| matches!(e, DmsEvent::AlarmRaised(_))).count(), 1);
        let events = run(&mut coordinator, Some(open()), 20).await;
        assert_eq!(events[0], DmsEvent::AlarmCleared);

        drop(coordinator);
        let mut written = Vec::new();
        device.read_to_end(&mut written).await.unwrap();
        assert_eq!(written, b"EN");
    }

    #[tokio::test]
    async fn test_no_face_disengages_alarm() {
        let (mut coordinator, mut device) = connected().await;
        run(&mut coordinator, Some(closed()), 50).await;
        assert!(coordinator.closure_state().alarm_active);

        assert_eq!(coordinator.process_frame(None).await, DmsEvent::AlarmCleared);
        assert_eq!(coordinator.closure_state().consecutive_closed_frames, 0);
        assert_eq!(coordinator.last_ear(), None);

        drop(coordinator);
        let mut written = Vec::new();
        device.read_to_end(&mut written).await.unwrap();
        assert_eq!(written, b"EN");
    }

    #[tokio::test]
    async fn test_degraded_mode_keeps_processing() {
        let mut coordinator = degraded();
        assert!(!coordinator.device_connected());

        let events = run(&mut coordinator, Some(closed()), 48).await;
        assert_eq!(events[47], DmsEvent::AlarmRaised(0.1));
        assert!(coordinator.closure_state().alarm_active);
        assert_eq!(coordinator.stats().frames_processed, 48);
    }

    #[tokio::test]
    async fn test_blinks_counted_and_reset() {
        let mut coordinator = degraded();
        for _ in 0..2 {
            run(&mut coordinator, Some(closed()), 6).await;
            run(&mut coordinator, Some(open()), 1).await;
        }
        // Too short to be a blink
        run(&mut coordinator, Some(closed()), 3).await;
        run(&mut coordinator, Some(open()), 1).await;

        assert_eq!(coordinator.stats().total_blinks, 2);
        assert_eq!(coordinator.stats().frames_processed, 18);

        coordinator.reset_blink_counter();
        assert_eq!(coordinator.stats().total_blinks, 0);
        assert_eq!(coordinator.stats().frames_processed, 18);
    }

    #[tokio::test]
    async fn test_telemetry_updates_and_survives_noise() {
        let (mut coordinator, mut device) = connected().await;
        assert_eq!(coordinator.telemetry().alcohol_level, 0);

        device.write_all(b"Alcohol Level = 137\r\n").await.unwrap();
        coordinator.process_frame(Some(&open())).await;
        assert_eq!(coordinator.telemetry().alcohol_level, 137);

        device.write_all(b"noise\r\n").await.unwrap();
        coordinator.process_frame(Some(&open())).await;
        assert_eq!(coordinator.telemetry().alcohol_level, 137);

        device.write_all(b"ALCOHOL DETECTED Level = 512\r\n").await.unwrap();
        coordinator.process_frame(Some(&open())).await;
        let snapshot = coordinator.snapshot();
        assert_eq!(snapshot.telemetry.alcohol_level, 512);
        assert!(snapshot.alcohol_over_limit);
    }

    #[tokio::test]
    async fn test_device_unplugged_mid_session() {
        let (mut coordinator, device) = connected().await;
        drop(device);

        coordinator.process_frame(Some(&open())).await;
        assert_eq!(coordinator.link_status(), LinkStatus::Disconnected);

        // Alarm logic is unaffected
        let events = run(&mut coordinator, Some(closed()), 48).await;
        assert_eq!(events[47], DmsEvent::AlarmRaised(0.1));
    }

    #[tokio::test]
    async fn test_snapshots_published_per_frame() {
        let mut coordinator = degraded();
        let mut rx = coordinator.subscribe();
        assert_eq!(rx.borrow_and_update().stats.frames_processed, 0);

        coordinator.process_frame(Some(&closed())).await;
        assert!(rx.has_changed().unwrap());
        let snapshot = *rx.borrow_and_update();
        assert_eq!(snapshot.stats.frames_processed, 1);
        assert_eq!(snapshot.closure.consecutive_closed_frames, 1);
        assert_eq!(snapshot.last_event, Some(DmsEvent::EyesClosed(1)));
        assert!((snapshot.ear.unwrap() - 0.1).abs() < 1e-6);
        assert!(!snapshot.device_connected);
    }

    #[tokio::test]
    async fn test_screenshot_request_taken_once() {
        let mut coordinator = degraded();
        assert!(coordinator.take_screenshot_request().is_none());
        coordinator.request_screenshot();
        assert!(coordinator.take_screenshot_request().is_some());
        assert!(coordinator.take_screenshot_request().is_none());
    }

    #[tokio::test]
    async fn test_short_landmark_set_counts_as_no_face() {
        let mut coordinator = degraded();
        let frame = LandmarkFrame {
            width: 640,
            height: 480,
            face: Some(FaceLandmarks::new(vec![(0.5, 0.5); 10])),
        };
        assert_eq!(coordinator.process_landmarks(&frame).await, DmsEvent::NoFace);
        assert_eq!(coordinator.stats().frames_processed, 1);
    }

    #[tokio::test]
    async fn test_shutdown_sends_normal() {
        let (mut coordinator, mut device) = connected().await;
        run(&mut coordinator, Some(open()), 3).await;

        let stats = coordinator.shutdown().await;
        assert_eq!(stats.frames_processed, 3);

        let mut written = Vec::new();
        device.read_to_end(&mut written).await.unwrap();
        assert_eq!(written, b"N");
    }
}
