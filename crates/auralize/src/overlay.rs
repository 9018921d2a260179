use auralize_core::{BoundingBox, Frame};

/// Box outline color, RGB.
pub const BOX_COLOR: [u8; 3] = [255, 255, 0];

/// Copy of `frame` with a hollow rectangle drawn around `bbox`.
///
/// Single-channel frames get a white outline. The box is clipped to the frame.
pub fn draw_box(frame: &Frame, bbox: &BoundingBox, thickness: usize) -> Frame {
    let mut out = frame.clone();
    if frame.width == 0 || frame.height == 0 {
        return out;
    }
    let clip = |v: f32, max: usize| -> i64 { (v.round() as i64).clamp(-1, max as i64) };
    let left = clip(bbox.left, frame.width);
    let right = clip(bbox.right, frame.width) - 1;
    let top = clip(bbox.top, frame.height);
    let bottom = clip(bbox.bottom, frame.height) - 1;
    if right < left || bottom < top {
        return out;
    }

    let color: Vec<u8> = match frame.channels {
        1 => vec![255],
        c => BOX_COLOR.iter().copied().chain(std::iter::repeat(255)).take(c).collect(),
    };
    let mut put = |x: i64, y: i64| {
        if x < 0 || y < 0 || x >= frame.width as i64 || y >= frame.height as i64 {
            return;
        }
        let start = (y as usize * frame.width + x as usize) * frame.channels;
        out.data[start..start + frame.channels].copy_from_slice(&color);
    };
    for t in 0..thickness.max(1) as i64 {
        for x in left..=right {
            put(x, top + t);
            put(x, bottom - t);
        }
        for y in top..=bottom {
            put(left + t, y);
            put(right - t, y);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outline_only_touches_the_border() {
        let frame = Frame::filled(20, 20, 3, 0).expect("frame");
        let out = draw_box(&frame, &BoundingBox::new(5.0, 5.0, 15.0, 15.0), 1);
        assert_eq!(&BOX_COLOR, out.pixel(5, 5));
        assert_eq!(&BOX_COLOR, out.pixel(14, 10));
        assert_eq!(&[0, 0, 0], out.pixel(10, 10));
        assert_eq!(&[0, 0, 0], out.pixel(15, 15));
        // Source frame is untouched.
        assert!(frame.data.iter().all(|&v| v == 0));
    }

    #[test]
    fn box_outside_frame_draws_nothing() {
        let frame = Frame::filled(10, 10, 1, 0).expect("frame");
        let out = draw_box(&frame, &BoundingBox::new(20.0, 20.0, 30.0, 30.0), 2);
        assert_eq!(frame.data, out.data);
    }
}
