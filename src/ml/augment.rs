//! 学習用データ拡張
//!
//! 左右反転、回転、ズーム、明るさ・コントラストの揺らぎをランダムに適用します。
//! 入出力のサイズは変わりません。

use image::{imageops, Rgb, RgbImage};
use rand::Rng;

/// データ拡張の設定
#[derive(Debug, Clone, PartialEq)]
pub struct AugmentConfig {
    /// 左右反転の確率
    pub flip_probability: f64,
    /// 最大回転量（1回転に対する割合。0.1なら±36度）
    pub max_rotation: f32,
    /// 最大ズーム量（0.1なら±10%の拡大・縮小）
    pub max_zoom: f32,
    /// 明るさの揺らぎ幅（画素値に対する割合）
    pub max_brightness: f32,
    /// コントラストの揺らぎ幅
    pub max_contrast: f32,
}

impl Default for AugmentConfig {
    fn default() -> Self {
        Self {
            flip_probability: 0.5,
            max_rotation: 0.1,
            max_zoom: 0.1,
            max_brightness: 0.2,
            max_contrast: 0.2,
        }
    }
}

impl AugmentConfig {
    /// ランダムなデータ拡張を適用
    pub fn apply<R: Rng>(&self, image: &RgbImage, rng: &mut R) -> RgbImage {
        let mut out = image.clone();

        if rng.gen_bool(self.flip_probability.clamp(0.0, 1.0)) {
            imageops::flip_horizontal_in_place(&mut out);
        }
        if self.max_rotation > 0.0 {
            let turns = rng.gen_range(-self.max_rotation..=self.max_rotation);
            out = rotate(&out, turns * std::f32::consts::TAU);
        }
        if self.max_zoom > 0.0 {
            let amount = rng.gen_range(-self.max_zoom..=self.max_zoom);
            out = zoom(&out, amount);
        }
        if self.max_brightness > 0.0 || self.max_contrast > 0.0 {
            let brightness = rng.gen_range(-self.max_brightness..=self.max_brightness);
            let contrast = 1.0 + rng.gen_range(-self.max_contrast..=self.max_contrast);
            adjust_brightness_contrast(&mut out, brightness, contrast);
        }

        out
    }
}

/// 中心回りの回転（最近傍補間、はみ出した部分は黒）
pub fn rotate(image: &RgbImage, radians: f32) -> RgbImage {
    let (width, height) = image.dimensions();
    let mut out = RgbImage::new(width, height);
    let (sin, cos) = radians.sin_cos();
    let cx = (width as f32 - 1.0) / 2.0;
    let cy = (height as f32 - 1.0) / 2.0;

    for (x, y, pixel) in out.enumerate_pixels_mut() {
        // 出力画素から入力画素への逆写像
        let dx = x as f32 - cx;
        let dy = y as f32 - cy;
        let sx = (cos * dx + sin * dy + cx).round();
        let sy = (-sin * dx + cos * dy + cy).round();

        if sx >= 0.0 && sy >= 0.0 && (sx as u32) < width && (sy as u32) < height {
            *pixel = *image.get_pixel(sx as u32, sy as u32);
        }
    }

    out
}

/// 中心基準のズーム（入出力サイズは同じ）
///
/// 正の値は中心を `1 / (1 + amount)` の範囲で切り出して拡大、負の値は
/// `1 + amount` 倍に縮小して中央に置く（余白は黒）。
pub fn zoom(image: &RgbImage, amount: f32) -> RgbImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 || amount == 0.0 || !amount.is_finite() {
        return image.clone();
    }

    let scale_to = |size: u32, scale: f32| ((size as f32 * scale).round() as u32).clamp(1, size);

    if amount > 0.0 {
        let scale = 1.0 / (1.0 + amount);
        let (crop_w, crop_h) = (scale_to(width, scale), scale_to(height, scale));
        if crop_w == width && crop_h == height {
            return image.clone();
        }
        let cropped = imageops::crop_imm(image, (width - crop_w) / 2, (height - crop_h) / 2, crop_w, crop_h)
            .to_image();
        imageops::resize(&cropped, width, height, imageops::FilterType::Triangle)
    } else {
        let scale = (1.0 + amount).max(0.05);
        let (small_w, small_h) = (scale_to(width, scale), scale_to(height, scale));
        if small_w == width && small_h == height {
            return image.clone();
        }
        let small = imageops::resize(image, small_w, small_h, imageops::FilterType::Triangle);
        let mut out = RgbImage::new(width, height);
        imageops::replace(
            &mut out,
            &small,
            ((width - small_w) / 2) as i64,
            ((height - small_h) / 2) as i64,
        );
        out
    }
}

/// 明るさ（加算）とコントラスト（中間値周りの乗算）を調整
pub fn adjust_brightness_contrast(image: &mut RgbImage, brightness: f32, contrast: f32) {
    let offset = brightness * 255.0;
    for pixel in image.pixels_mut() {
        let Rgb(channels) = *pixel;
        *pixel = Rgb(channels.map(|c| {
            let v = (c as f32 - 128.0) * contrast + 128.0 + offset;
            v.round().clamp(0.0, 255.0) as u8
        }));
    }
}
