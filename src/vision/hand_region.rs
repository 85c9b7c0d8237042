//! ランドマークからの手領域抽出
//!
//! ランドマークの最小・最大座標から外接矩形を求め、パディングと画像境界での
//! クランプを行ったうえで切り出します。フレーム間で状態は持ちません。

use image::{imageops, Rgb, RgbImage};
use serde::Serialize;

use crate::types::{HandDetection, Landmark};

/// 外接矩形に加えるパディング（ピクセル）
pub const DEFAULT_PADDING: u32 = 20;

/// 手領域の描画色（緑）
pub const REGION_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

/// 手領域の線幅（ピクセル）
pub const REGION_THICKNESS: u32 = 2;

/// 手領域（x_max, y_max は含まない）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HandRegion {
    pub x_min: u32,
    pub y_min: u32,
    pub x_max: u32,
    pub y_max: u32,
}

impl HandRegion {
    pub fn width(&self) -> u32 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> u32 {
        self.y_max - self.y_min
    }
}

/// ランドマーク列から手領域を計算
///
/// 座標は `trunc(比率 * 画像サイズ)` でピクセルに変換し、`padding` だけ広げてから
/// `[0, width] x [0, height]` にクランプする。非有限値の点は無視する。
/// 点が無い場合や、クランプ後に幅・高さが 0 以下になる場合は `None`。
pub fn region_from_landmarks(
    landmarks: &[Landmark],
    width: u32,
    height: u32,
    padding: u32,
) -> Option<HandRegion> {
    if width == 0 || height == 0 {
        return None;
    }

    let mut points = landmarks
        .iter()
        .filter(|l| l.x.is_finite() && l.y.is_finite());
    let first = points.next()?;

    let (mut min_x, mut max_x) = (first.x, first.x);
    let (mut min_y, mut max_y) = (first.y, first.y);
    for point in points {
        min_x = min_x.min(point.x);
        max_x = max_x.max(point.x);
        min_y = min_y.min(point.y);
        max_y = max_y.max(point.y);
    }

    let to_pixel = |ratio: f32, size: u32| (ratio as f64 * size as f64) as i64;
    let pad = padding as i64;

    let x_min = (to_pixel(min_x, width) - pad).max(0);
    let y_min = (to_pixel(min_y, height) - pad).max(0);
    let x_max = (to_pixel(max_x, width) + pad).min(width as i64);
    let y_max = (to_pixel(max_y, height) + pad).min(height as i64);

    if x_max <= x_min || y_max <= y_min {
        return None;
    }

    // ここまで来れば 0 <= min < max <= size
    Some(HandRegion {
        x_min: x_min as u32,
        y_min: y_min as u32,
        x_max: x_max as u32,
        y_max: y_max as u32,
    })
}

/// 検出結果から手領域を計算（手が無ければ `None`）
pub fn locate_hand(
    detection: &HandDetection,
    width: u32,
    height: u32,
    padding: u32,
) -> Option<HandRegion> {
    let landmarks = detection.landmarks()?;
    region_from_landmarks(landmarks, width, height, padding)
}

/// フレームから手領域を切り出す
pub fn crop_region(frame: &RgbImage, region: &HandRegion) -> RgbImage {
    imageops::crop_imm(
        frame,
        region.x_min,
        region.y_min,
        region.width(),
        region.height(),
    )
    .to_image()
}

/// 検出結果に従って手領域を切り出す
pub fn crop_hand(
    frame: &RgbImage,
    detection: &HandDetection,
    padding: u32,
) -> Option<(HandRegion, RgbImage)> {
    let region = locate_hand(detection, frame.width(), frame.height(), padding)?;
    Some((region, crop_region(frame, &region)))
}

/// 手領域の枠をフレームに描画（内側に向かって線幅分塗る）
pub fn draw_region(frame: &mut RgbImage, region: &HandRegion) {
    let (width, height) = frame.dimensions();
    if width == 0 || height == 0 {
        return;
    }

    let left = region.x_min.min(width - 1);
    let top = region.y_min.min(height - 1);
    let right = region.x_max.saturating_sub(1).min(width - 1);
    let bottom = region.y_max.saturating_sub(1).min(height - 1);

    for t in 0..REGION_THICKNESS {
        let (l, r) = (left + t, right.saturating_sub(t));
        let (tp, b) = (top + t, bottom.saturating_sub(t));
        if l > r || tp > b {
            break;
        }
        for x in l..=r {
            frame.put_pixel(x, tp, REGION_COLOR);
            frame.put_pixel(x, b, REGION_COLOR);
        }
        for y in tp..=b {
            frame.put_pixel(l, y, REGION_COLOR);
            frame.put_pixel(r, y, REGION_COLOR);
        }
    }
}
