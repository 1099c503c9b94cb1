// 该文件是 IdCard Detect （证件检测） 项目的一部分。
// src/main.rs - 项目主程序
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::io::Write;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use idcard_detect::{
  FromUrl,
  config::Args,
  label::{IdCardLabel, WithLabel},
  model::{YoloOnnx, YoloOnnxBuilder},
  output::OutputWrapper,
  summary::write_performance_summary,
  task::{SampleScanTask, Task, install_interrupt_handler},
};

const INPUT_W: u32 = 640;
const INPUT_H: u32 = 640;

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .init();

  let args = Args::parse();

  info!("模型文件路径: {}", args.model.display());
  info!("样本图片目录: {}", args.images.display());
  info!("置信度阈值: {}", args.confidence);
  info!("NMS 阈值: {}", args.iou);

  let stdout = std::io::stdout();
  let mut out = stdout.lock();

  write_performance_summary(&mut out)?;
  if args.summary_only {
    return Ok(());
  }
  writeln!(out)?;

  let model: YoloOnnx<INPUT_W, INPUT_H> = YoloOnnxBuilder::new(&args.model)
    .confidence(args.confidence)
    .iou(args.iou)
    .max_detections(args.max_detections)
    .intra_threads(args.threads)
    .class_count(IdCardLabel::all().len())
    .build()
    .with_context(|| format!("无法加载模型: {}", args.model.display()))?;

  let outputs = args
    .output
    .iter()
    .map(|url| OutputWrapper::from_url(url).with_context(|| format!("无法创建输出: {}", url)))
    .collect::<Result<Vec<_>>>()?;

  let stop = install_interrupt_handler()?;

  let report = SampleScanTask::<IdCardLabel, _>::new(&mut out, &args.model)
    .with_extensions(args.extensions.clone())
    .with_policy(args.unknown_class_policy())
    .with_input_size(model.input_size())
    .with_stop_signal(stop)
    .run_task(args.images.as_path(), model, outputs)?;

  info!(
    "处理完成: {} 张图片，{} 个目标",
    report.images_processed, report.detections
  );

  Ok(())
}
