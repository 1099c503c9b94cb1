// 该文件是 IdCard Detect （证件检测） 项目的一部分。
// src/task.rs - 样本图片检测任务
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
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::{thread, time::Duration};

use anyhow::Context;
use tracing::{info, warn};

use crate::{
  frame::ImageFrame,
  input::{DEFAULT_IMAGE_EXTENSIONS, ImageDirectoryInput, ImageDirectoryInputError},
  label::{UnknownClassPolicy, WithLabel, class_table_repr, resolve_labels},
  model::{DetectResult, Model},
  output::Render,
  summary::write_model_info,
};

pub trait Task<I, M, O>: Sized {
  type Output;
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<Self::Output, Self::Error>;
}

/// 一次扫描的统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
  pub directory_found: bool,
  pub images_found: usize,
  pub images_processed: usize,
  pub detections: usize,
  pub interrupted: bool,
}

/// 对目录中的样本图片逐张检测并打印类别与置信度，最后打印模型信息
pub struct SampleScanTask<'a, L, W> {
  out: &'a mut W,
  model_path: PathBuf,
  extensions: Vec<String>,
  policy: UnknownClassPolicy,
  input_size: (u32, u32),
  stop: Option<Receiver<()>>,
  _label: PhantomData<L>,
}

impl<'a, L: WithLabel, W: Write> SampleScanTask<'a, L, W> {
  pub fn new(out: &'a mut W, model_path: impl Into<PathBuf>) -> Self {
    SampleScanTask {
      out,
      model_path: model_path.into(),
      extensions: DEFAULT_IMAGE_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
      policy: UnknownClassPolicy::default(),
      input_size: (640, 640),
      stop: None,
      _label: PhantomData,
    }
  }

  pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
    self.extensions = extensions;
    self
  }

  pub fn with_policy(mut self, policy: UnknownClassPolicy) -> Self {
    self.policy = policy;
    self
  }

  pub fn with_input_size(mut self, input_size: (u32, u32)) -> Self {
    self.input_size = input_size;
    self
  }

  /// 收到信号后在当前图片处理完时停止扫描
  pub fn with_stop_signal(mut self, stop: Receiver<()>) -> Self {
    self.stop = Some(stop);
    self
  }

  fn stop_requested(&self) -> bool {
    self.stop.as_ref().is_some_and(|rx| rx.try_recv().is_ok())
  }

  fn write_detections(&mut self, result: &DetectResult<L>) -> std::io::Result<()> {
    if result.is_empty() {
      writeln!(self.out, "  未检测到目标")?;
    } else {
      writeln!(self.out, "  检测到 {} 个目标", result.len())?;
      for item in result.items.iter() {
        writeln!(
          self.out,
          "    - {}: {:.3}",
          item.kind.to_label_str(),
          item.score
        )?;
      }
    }
    Ok(())
  }
}

impl<'a, 'p, L, W, M, O, ME, RE> Task<&'p Path, M, O> for SampleScanTask<'a, L, W>
where
  L: WithLabel,
  W: Write,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  M: Model<Input = ImageFrame, Output = DetectResult<u32>, Error = ME>,
  O: Render<ImageFrame, DetectResult<L>, Error = RE>,
{
  type Output = ScanReport;
  type Error = anyhow::Error;

  fn run_task(mut self, directory: &'p Path, model: M, output: O) -> Result<ScanReport, Self::Error> {
    info!("开始任务...");
    let mut report = ScanReport::default();

    writeln!(self.out, "=== YOLO模型测试 ===")?;
    writeln!(self.out, "模型路径: {}", self.model_path.display())?;
    writeln!(self.out, "模型类别: {}", class_table_repr::<L>())?;
    writeln!(self.out)?;

    match ImageDirectoryInput::scan(directory, self.extensions.as_slice()) {
      Ok(input) => {
        report.directory_found = true;
        report.images_found = input.len();
        writeln!(self.out, "找到 {} 张测试图片", input.len())?;
        writeln!(self.out)?;

        for (i, frame) in input.frames().enumerate() {
          let frame = frame?;
          writeln!(self.out, "测试图片 {}: {}", i + 1, frame.file_name())?;

          let now = std::time::Instant::now();
          let raw = model
            .infer(&frame)
            .with_context(|| format!("推理失败: {}", frame.path.display()))?;
          info!("({})推理完成，耗时: {:.2?}", i + 1, now.elapsed());

          let result = resolve_labels::<L>(&raw, self.policy)
            .with_context(|| format!("无法识别图片 {} 的检测结果", frame.path.display()))?;
          self.write_detections(&result)?;
          writeln!(self.out)?;

          output.render_result(&frame, &result)?;
          report.images_processed += 1;
          report.detections += result.len();

          if self.stop_requested() {
            warn!("中断信号接收，退出任务循环");
            report.interrupted = true;
            break;
          }
        }
      }
      Err(ImageDirectoryInputError::NotFound(path)) => {
        warn!("测试目录不存在: {}", path.display());
        writeln!(self.out, "测试目录不存在，请先运行数据准备脚本")?;
      }
      Err(e) => return Err(e.into()),
    }

    write_model_info::<L, _>(self.out, self.input_size)?;

    info!(
      "任务完成: 处理 {} / {} 张图片，共 {} 个目标",
      report.images_processed, report.images_found, report.detections
    );
    Ok(report)
  }
}

/// 安装 Ctrl-C 处理函数，返回中断信号接收端
///
/// 第一次中断请求在当前图片完成后停止；30 秒内仍未退出则强制结束进程。
pub fn install_interrupt_handler() -> anyhow::Result<Receiver<()>> {
  let (tx, rx) = mpsc::channel();
  ctrlc::set_handler(move || {
    info!("收到中断信号，准备退出...");
    let _ = tx.send(());
    thread::spawn(|| {
      thread::sleep(Duration::from_secs(30));
      warn!("强制退出程序");
      std::process::exit(1);
    });
  })
  .context("无法设置 Ctrl-C 处理函数")?;
  Ok(rx)
}
