//! 動画の診断: ストリーム情報とサンプリングされるフレーム数を表示する
//!
//! Usage: probe_video <video_path> [interval_secs]

use anyhow::Context;

use signlink::model::config::VideoSettings;
use signlink::video::sampler::{effective_fps, sample_interval, timestamp_sec};
use signlink::video::FrameExtractor;

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: probe_video <video_path> [interval_secs]");
        std::process::exit(2);
    }

    let video_path = &args[1];
    let mut settings = VideoSettings::default();
    if let Some(secs) = args.get(2) {
        settings.sample_interval_secs = secs
            .parse()
            .with_context(|| format!("invalid interval: {secs}"))?;
    }

    let info = FrameExtractor::probe(video_path)?;
    let fps = effective_fps(info.fps, settings.fallback_fps);
    let interval = sample_interval(fps, settings.sample_interval_secs);

    println!("Video: {}", video_path);
    println!("  resolution: {}x{}", info.width, info.height);
    println!("  fps: {:.3} (effective {:.3})", info.fps, fps);
    println!("  duration: {:.2}s", info.duration_sec);
    println!("  sample interval: every {} frames", interval);

    let extractor = FrameExtractor::new(interval);
    let mut last_sampled = None;
    let stats = extractor.process_frames_sync(video_path, |_frame, index| {
        last_sampled = Some(index);
        Ok(())
    })?;

    println!("  decoded frames: {}", stats.total_frames);
    println!("  sampled frames: {}", stats.sampled_frames);
    if let Some(index) = last_sampled {
        println!("  last sample: frame {} at {:.2}s", index, timestamp_sec(index, fps));
    }
    Ok(())
}
