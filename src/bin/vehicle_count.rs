use anyhow::{Context, Result};
use clap::Parser;
/// 视频车辆计数 - 逐帧检测、区域过滤、按类别计数并输出标注视频
///
/// 主程序入口: cargo run --release --bin vehicle-count -- -i frames/ -m detections.jsonl -o out/
use vehicle_counter::input::open_source;
use vehicle_counter::models::load_models;
use vehicle_counter::output::open_sink;
use vehicle_counter::pipeline::{PipelineDriver, ReportWriter, StopSignal};
use vehicle_counter::{Args, ClassRegistry, OverlayRenderer};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

const DEFAULT_FPS: f64 = vehicle_counter::config::DEFAULT_FPS;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = args.pipeline_config()?;
    config.log_summary();
    if let Some(path) = &args.save_config {
        config
            .save(path)
            .with_context(|| format!("failed to save config to {}", path.display()))?;
    }

    let registry = ClassRegistry::from_file(&args.names)?;
    log::info!("{} classes from {}", registry.len(), args.names.display());

    let workers = args.workers.max(1);
    let models = load_models(&args.model, args.input_size, workers)?;

    let renderer = match &args.font {
        Some(path) => OverlayRenderer::from_font_file(path)?,
        None => {
            log::warn!("no --font given, labels and counts will not be drawn");
            OverlayRenderer::default()
        }
    };

    let mut source = open_source(&args.input, args.fps)?;
    let fps = source.fps().unwrap_or(DEFAULT_FPS);
    let mut sink = open_sink(&args.output, fps)?;

    let mut driver = PipelineDriver::new(config, registry).with_renderer(renderer);
    if let Some(path) = &args.report {
        driver = driver.with_report(ReportWriter::create(path)?);
    }

    // Ctrl+C: 停止读帧, 已读入的帧处理完后正常收尾
    let stop = StopSignal::new();
    let handler = stop.clone();
    ctrlc::set_handler(move || {
        log::warn!("interrupt received, draining in-flight frames");
        handler.raise();
    })
    .context("failed to install Ctrl+C handler")?;

    let summary = driver
        .run_parallel(source.as_mut(), models, sink.as_mut(), &stop)
        .with_context(|| format!("run aborted at frame {}", driver.frame_index()))?;

    log::info!(
        "{:?}: {} frames{} written to {}",
        summary.final_state,
        summary.frames,
        if summary.stopped_early { " (stopped early)" } else { "" },
        args.output.display()
    );
    for (name, count) in summary.totals.iter() {
        log::info!("  {name}: {count} vehicle-frames");
    }
    Ok(())
}
