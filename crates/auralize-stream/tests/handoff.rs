use auralize_core::Frame;
use auralize_stream::{
    ConcurrentSource, FrameOrigin, FramePoll, MemoryOrigin, ReadOutcome, SourceParams,
};
use std::thread;
use std::time::{Duration, Instant};

fn frame(value: u8) -> Frame {
    Frame::filled(16, 12, 3, value).expect("frame")
}

/// Origin producing a fixed number of frames with a delay before each.
struct Paced {
    next: u8,
    total: u8,
    delay: Duration,
}

impl FrameOrigin for Paced {
    fn read(&mut self) -> ReadOutcome {
        if self.next >= self.total {
            return ReadOutcome::Exhausted;
        }
        thread::sleep(self.delay);
        self.next += 1;
        ReadOutcome::Frame(frame(self.next))
    }
}

#[test]
fn consumer_sees_increasing_frames_ending_with_the_last() {
    let source = ConcurrentSource::spawn(
        MemoryOrigin::new((1..=10).map(frame)),
        &SourceParams::default(),
    )
    .expect("spawn");

    let deadline = Instant::now() + Duration::from_secs(10);
    let mut seen = Vec::new();
    loop {
        match source.poll() {
            FramePoll::Ready(f) => seen.push(f.data[0]),
            FramePoll::Empty => thread::sleep(Duration::from_millis(1)),
            FramePoll::Exhausted => break,
        }
        assert!(Instant::now() < deadline, "timed out, seen {seen:?}");
    }

    assert!(!seen.is_empty());
    assert!(seen.windows(2).all(|w| w[0] < w[1]), "seen {seen:?}");
    assert_eq!(Some(&10), seen.last());
}

#[test]
fn polling_does_not_wait_for_a_slow_producer() {
    let source = ConcurrentSource::spawn(
        Paced {
            next: 0,
            total: 3,
            delay: Duration::from_millis(200),
        },
        &SourceParams::default(),
    )
    .expect("spawn");

    let start = Instant::now();
    for _ in 0..100 {
        let _ = source.poll();
    }
    assert!(start.elapsed() < Duration::from_millis(150));
}

#[test]
fn slow_consumer_skips_stale_frames() {
    let source = ConcurrentSource::spawn(
        MemoryOrigin::new((1..=40).map(frame)),
        &SourceParams::default(),
    )
    .expect("spawn");

    // Let the producer run through everything before the first poll.
    thread::sleep(Duration::from_millis(200));
    match source.poll() {
        FramePoll::Ready(f) => assert_eq!(40, f.data[0]),
        other => panic!("expected the newest frame, got {other:?}"),
    }
    assert!(matches!(source.poll(), FramePoll::Exhausted));
}
