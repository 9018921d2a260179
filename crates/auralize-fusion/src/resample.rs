use auralize_core::DepthMap;

/// Map a destination pixel index to source coordinates with pixel centers
/// aligned, clamped to the valid source range.
#[inline]
fn source_coord(dst: usize, scale: f32, src_len: usize) -> f32 {
    ((dst as f32 + 0.5) * scale - 0.5).clamp(0.0, (src_len - 1) as f32)
}

/// Bilinear depth at the pixel `(x, y)` of a `width x height` target grid.
///
/// `depth` must not be empty and must hold `width * height` values.
#[inline]
pub fn sample_depth(depth: &DepthMap, x: usize, y: usize, width: usize, height: usize) -> f32 {
    if depth.width == width && depth.height == height {
        return depth.get(x, y);
    }
    let sx = source_coord(x, depth.width as f32 / width as f32, depth.width);
    let sy = source_coord(y, depth.height as f32 / height as f32, depth.height);
    let x0 = sx.floor() as usize;
    let y0 = sy.floor() as usize;
    let x1 = (x0 + 1).min(depth.width - 1);
    let y1 = (y0 + 1).min(depth.height - 1);
    let fx = sx - x0 as f32;
    let fy = sy - y0 as f32;

    let a = depth.get(x0, y0);
    let b = depth.get(x1, y0);
    let c = depth.get(x0, y1);
    let d = depth.get(x1, y1);
    let top = if a == b { a } else { a + fx * (b - a) };
    let bottom = if c == d { c } else { c + fx * (d - c) };
    if top == bottom {
        top
    } else {
        top + fy * (bottom - top)
    }
}

/// Resize a depth map to `width x height` with bilinear interpolation.
///
/// A map whose buffer does not hold `width * height` values resamples to zeros.
pub fn resample_depth(depth: &DepthMap, width: usize, height: usize) -> DepthMap {
    if depth.is_empty()
        || depth.data.len() != depth.width * depth.height
        || width == 0
        || height == 0
    {
        return DepthMap::constant(width, height, 0.0);
    }
    if depth.width == width && depth.height == height {
        return depth.clone();
    }
    let mut data = Vec::with_capacity(width * height);
    for y in 0..height {
        for x in 0..width {
            data.push(sample_depth(depth, x, y, width, height));
        }
    }
    DepthMap {
        width,
        height,
        data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_map_stays_constant() {
        let d = DepthMap::constant(7, 5, 0.37);
        let r = resample_depth(&d, 64, 48);
        assert_eq!((64, 48), (r.width, r.height));
        assert!(r.data.iter().all(|&v| v == 0.37));
    }

    #[test]
    fn upsampled_ramp_is_monotone_and_bounded() {
        let d = DepthMap::new(2, 1, vec![1.0, 3.0]).expect("depth");
        let r = resample_depth(&d, 8, 1);
        assert!(r.data.windows(2).all(|w| w[0] <= w[1]), "{:?}", r.data);
        assert_eq!(1.0, r.data[0]);
        assert_eq!(3.0, r.data[7]);
        // Pixel centres 3 and 4 straddle the middle of the source.
        assert!((r.data[3] + r.data[4] - 4.0).abs() < 1e-6);
    }

    #[test]
    fn downsampling_averages_neighbours() {
        let d = DepthMap::new(4, 1, vec![0.0, 2.0, 4.0, 6.0]).expect("depth");
        let r = resample_depth(&d, 2, 1);
        assert!((r.data[0] - 1.0).abs() < 1e-6);
        assert!((r.data[1] - 5.0).abs() < 1e-6);
    }

    #[test]
    fn mismatched_buffer_resamples_to_zeros() {
        let d = DepthMap {
            width: 10,
            height: 10,
            data: vec![1.0; 5],
        };
        let r = resample_depth(&d, 20, 20);
        assert_eq!(400, r.data.len());
        assert!(r.data.iter().all(|&v| v == 0.0));
    }
}
