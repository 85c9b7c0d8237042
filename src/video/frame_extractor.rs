//! GStreamer による動画フレームの抽出
//!
//! `filesrc → decodebin → videoconvert → appsink(RGB)` のパイプラインで
//! フレームを順にデコードし、指定間隔ごとにコールバックへ渡します。

use anyhow::{Context, Result};
use gstreamer::prelude::*;
use gstreamer::{self as gst, ElementFactory};
use gstreamer_app::AppSink;
use image::RgbImage;
use std::path::Path;

/// 行末パディング（stride）を含む RGB プレーンを連続したバイト列に詰め直す
pub fn plane_to_contiguous_rgb(width: usize, height: usize, stride: usize, src: &[u8]) -> Vec<u8> {
    let row_bytes = width * 3;
    if stride == row_bytes && src.len() >= row_bytes * height {
        return src[..row_bytes * height].to_vec();
    }

    let mut out = Vec::with_capacity(row_bytes * height);
    for row in 0..height {
        let start = row * stride;
        let end = start + row_bytes;
        if end <= src.len() {
            out.extend_from_slice(&src[start..end]);
        } else if start < src.len() {
            // 不足している場合は残りをコピーしてゼロ埋め
            out.extend_from_slice(&src[start..]);
            out.resize(out.len() + (end - src.len()), 0);
        } else {
            out.resize(out.len() + row_bytes, 0);
        }
    }

    out
}

/// 動画情報
#[derive(Debug, Clone, PartialEq)]
pub struct VideoStreamInfo {
    pub width: u32,
    pub height: u32,
    /// フレームレート（取得できない場合は 0.0）
    pub fps: f64,
    pub duration_sec: f64,
}

/// フレーム処理の集計
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameStats {
    /// デコードした総フレーム数
    pub total_frames: u32,
    /// コールバックに渡したフレーム数
    pub sampled_frames: u32,
}

/// フレーム抽出器
#[derive(Debug, Clone)]
pub struct FrameExtractor {
    /// フレーム抽出間隔（フレーム数）。1なら全フレーム
    frame_interval: u32,
}

impl FrameExtractor {
    pub fn new(frame_interval: u32) -> Self {
        Self {
            frame_interval: frame_interval.max(1),
        }
    }

    pub fn frame_interval(&self) -> u32 {
        self.frame_interval
    }

    /// GStreamerを初期化
    fn init_gstreamer() -> Result<()> {
        gst::init().context("GStreamerの初期化に失敗しました")?;
        Ok(())
    }

    /// 動画ファイルの情報を取得
    pub fn probe<P: AsRef<Path>>(video_path: P) -> Result<VideoStreamInfo> {
        Self::init_gstreamer()?;

        let video_path = video_path.as_ref();
        std::fs::metadata(video_path)
            .with_context(|| format!("動画ファイルにアクセスできません: {:?}", video_path))?;

        let canonical = video_path
            .canonicalize()
            .context("動画ファイルのパスを解決できませんでした")?;
        let uri = url::Url::from_file_path(&canonical)
            .map_err(|_| anyhow::anyhow!("ファイルパスからURIへの変換に失敗しました"))?
            .to_string();

        let discoverer = gstreamer_pbutils::Discoverer::new(gst::ClockTime::from_seconds(10))
            .context("Discovererの作成に失敗しました")?;
        let info = discoverer
            .discover_uri(&uri)
            .context("動画の解析に失敗しました")?;

        let video_streams = info.video_streams();
        let stream = video_streams
            .first()
            .ok_or_else(|| anyhow::anyhow!("動画ストリームが見つかりません"))?;

        let framerate = stream.framerate();
        let fps = if framerate.denom() > 0 {
            framerate.numer() as f64 / framerate.denom() as f64
        } else {
            0.0
        };

        Ok(VideoStreamInfo {
            width: stream.width(),
            height: stream.height(),
            fps,
            duration_sec: info
                .duration()
                .map(|d| d.nseconds() as f64 / 1e9)
                .unwrap_or(0.0),
        })
    }

    /// 動画をデコードし、`frame_interval` ごとにフレームをコールバックへ渡す
    ///
    /// コールバックがエラーを返した場合は処理を中断する。
    pub fn process_frames_sync<P, F>(&self, video_path: P, mut callback: F) -> Result<FrameStats>
    where
        P: AsRef<Path>,
        F: FnMut(RgbImage, u32) -> Result<()>,
    {
        Self::init_gstreamer()?;

        let video_path = video_path.as_ref();
        let location = video_path
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("動画パスがUTF-8ではありません: {:?}", video_path))?;
        tracing::debug!(path = %video_path.display(), interval = self.frame_interval, "decoding video");

        let pipeline = gst::Pipeline::new();

        let source = ElementFactory::make("filesrc")
            .name("source")
            .property("location", location)
            .build()
            .context("filesrcの作成に失敗しました")?;
        let decodebin = ElementFactory::make("decodebin")
            .name("decoder")
            .build()
            .context("decodebinの作成に失敗しました")?;
        let videoconvert = ElementFactory::make("videoconvert")
            .name("converter")
            .build()
            .context("videoconvertの作成に失敗しました")?;
        let appsink = ElementFactory::make("appsink")
            .name("sink")
            .build()
            .context("appsinkの作成に失敗しました")?
            .dynamic_cast::<AppSink>()
            .map_err(|_| anyhow::anyhow!("appsinkへのキャストに失敗しました"))?;

        appsink.set_caps(Some(
            &gst::Caps::builder("video/x-raw")
                .field("format", "RGB")
                .build(),
        ));
        appsink.set_property("emit-signals", false);
        appsink.set_property("sync", false);
        appsink.set_property("max-buffers", 1u32);

        pipeline
            .add_many([&source, &decodebin, &videoconvert, appsink.upcast_ref::<gst::Element>()])
            .context("エレメントの追加に失敗しました")?;
        source
            .link(&decodebin)
            .context("sourceとdecoderのリンクに失敗しました")?;
        videoconvert
            .link(appsink.upcast_ref::<gst::Element>())
            .context("converterとsinkのリンクに失敗しました")?;

        let videoconvert_clone = videoconvert.clone();
        decodebin.connect_pad_added(move |_src, src_pad| {
            let Some(sink_pad) = videoconvert_clone.static_pad("sink") else {
                tracing::error!("videoconvertのsinkパッドが見つかりません");
                return;
            };
            // 音声パッドはリンクに失敗するだけなので無視してよい
            if !sink_pad.is_linked() {
                if let Err(e) = src_pad.link(&sink_pad) {
                    tracing::debug!(error = ?e, "pad link skipped");
                }
            }
        });

        let bus = pipeline
            .bus()
            .ok_or_else(|| anyhow::anyhow!("パイプラインにバスがありません"))?;
        pipeline
            .set_state(gst::State::Playing)
            .context("パイプラインの開始に失敗しました")?;

        let result = self.pull_frames(&pipeline, &bus, &appsink, &mut callback);

        pipeline
            .set_state(gst::State::Null)
            .context("パイプラインの停止に失敗しました")?;

        let stats = result?;
        tracing::debug!(
            total_frames = stats.total_frames,
            sampled_frames = stats.sampled_frames,
            "video decoded"
        );
        Ok(stats)
    }

    fn pull_frames<F>(
        &self,
        pipeline: &gst::Pipeline,
        bus: &gst::Bus,
        appsink: &AppSink,
        callback: &mut F,
    ) -> Result<FrameStats>
    where
        F: FnMut(RgbImage, u32) -> Result<()>,
    {
        let mut stats = FrameStats::default();

        loop {
            while let Some(msg) = bus.pop() {
                use gst::MessageView;
                match msg.view() {
                    MessageView::Eos(..) => return Ok(stats),
                    MessageView::Error(err) => {
                        anyhow::bail!(
                            "動画のデコード中にエラーが発生しました: {} (デバッグ情報: {:?})",
                            err.error(),
                            err.debug()
                        );
                    }
                    _ => (),
                }
            }

            let Some(sample) = appsink.try_pull_sample(gst::ClockTime::from_mseconds(100)) else {
                if appsink.is_eos() {
                    return Ok(stats);
                }
                if pipeline.current_state() == gst::State::Null {
                    anyhow::bail!("パイプラインが停止しました");
                }
                continue;
            };

            let current_frame = stats.total_frames;
            stats.total_frames += 1;
            if current_frame % self.frame_interval != 0 {
                continue;
            }

            let buffer = sample.buffer().context("バッファの取得に失敗しました")?;
            let caps = sample.caps().context("capsの取得に失敗しました")?;
            let video_info = gstreamer_video::VideoInfo::from_caps(caps)
                .context("VideoInfoの作成に失敗しました")?;
            let map = buffer.map_readable().context("バッファのマップに失敗しました")?;

            let width = video_info.width();
            let height = video_info.height();
            let stride = video_info
                .stride()
                .first()
                .map(|s| *s as usize)
                .unwrap_or(width as usize * 3);

            let contiguous =
                plane_to_contiguous_rgb(width as usize, height as usize, stride, map.as_slice());
            let image = RgbImage::from_raw(width, height, contiguous)
                .context("RgbImageの作成に失敗しました")?;

            callback(image, current_frame)?;
            stats.sampled_frames += 1;
        }
    }
}
