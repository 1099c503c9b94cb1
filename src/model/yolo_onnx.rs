// 该文件是 IdCard Detect （证件检测） 项目的一部分。
// src/model/yolo_onnx.rs - 基于 ONNX Runtime 的 YOLO 检测模型
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

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use ndarray::ArrayView4;
use ort::logging::LogLevel;
use ort::session::Session;
use ort::value::TensorRef;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
  frame::{ImageFrame, LetterboxFrame},
  model::{
    DetectResult, Model, class_count_mismatch, decode_yolo_output, non_max_suppression,
    yolo_output_layout,
  },
};

const YOLO_NUM_INPUTS: usize = 1;

pub const DEFAULT_CONFIDENCE: f32 = 0.25;
pub const DEFAULT_IOU: f32 = 0.7;
pub const DEFAULT_MAX_DETECTIONS: usize = 300;

#[derive(Error, Debug)]
pub enum YoloOnnxError {
  #[error("模型加载错误 {0}: {1}")]
  ModelLoadError(PathBuf, std::io::Error),
  #[error("模型无效: {0}")]
  ModelInvalid(String),
  #[error("ONNX Runtime 错误: {0}")]
  OrtError(#[from] ort::Error),
  #[error("输入张量形状错误: {0}")]
  ShapeError(#[from] ndarray::ShapeError),
  #[error("输出张量形状错误: {0:?}")]
  UnexpectedOutputShape(Vec<i64>),
  #[error("推理会话锁已损坏")]
  SessionPoisoned,
}

pub struct YoloOnnxBuilder {
  model_path: PathBuf,
  confidence: f32,
  iou: f32,
  max_detections: usize,
  intra_threads: Option<usize>,
  class_count: Option<usize>,
}

impl YoloOnnxBuilder {
  pub fn new(model_path: impl AsRef<Path>) -> Self {
    YoloOnnxBuilder {
      model_path: model_path.as_ref().to_path_buf(),
      confidence: DEFAULT_CONFIDENCE,
      iou: DEFAULT_IOU,
      max_detections: DEFAULT_MAX_DETECTIONS,
      intra_threads: None,
      class_count: None,
    }
  }

  pub fn confidence(mut self, confidence: f32) -> Self {
    self.confidence = confidence;
    self
  }

  pub fn iou(mut self, iou: f32) -> Self {
    self.iou = iou;
    self
  }

  pub fn max_detections(mut self, max_detections: usize) -> Self {
    self.max_detections = max_detections;
    self
  }

  pub fn intra_threads(mut self, threads: Option<usize>) -> Self {
    self.intra_threads = threads;
    self
  }

  /// 标签表中的类别数量，用于核对模型输出
  pub fn class_count(mut self, class_count: usize) -> Self {
    self.class_count = Some(class_count);
    self
  }

  pub fn build<const W: u32, const H: u32>(self) -> Result<YoloOnnx<W, H>, YoloOnnxError> {
    info!("加载模型文件: {}", self.model_path.display());
    let model_data = std::fs::read(&self.model_path)
      .map_err(|e| YoloOnnxError::ModelLoadError(self.model_path.clone(), e))?;
    debug!(
      "模型文件大小: {:.2} MB",
      model_data.len() as f64 / (1024.0 * 1024.0)
    );

    info!("创建 ONNX Runtime 推理会话");
    let mut builder = Session::builder()?.with_log_level(LogLevel::Error)?;
    if let Some(threads) = self.intra_threads {
      builder = builder.with_intra_threads(threads)?;
    }
    let session = builder.commit_from_memory(&model_data)?;

    if session.inputs.len() != YOLO_NUM_INPUTS {
      error!(
        "预期模型输入数量为 {}, 实际为 {}",
        YOLO_NUM_INPUTS,
        session.inputs.len()
      );
      return Err(YoloOnnxError::ModelInvalid(format!(
        "预期模型输入数量为 {}, 实际为 {}",
        YOLO_NUM_INPUTS,
        session.inputs.len()
      )));
    }

    let input_name = session.inputs[0].name.clone();
    let output_name = session
      .outputs
      .first()
      .map(|o| o.name.clone())
      .ok_or_else(|| YoloOnnxError::ModelInvalid("模型没有输出".to_string()))?;
    debug!("模型输入: {}, 模型输出: {}", input_name, output_name);
    info!("模型加载完成");

    Ok(YoloOnnx {
      session: Mutex::new(session),
      input_name,
      output_name,
      confidence: self.confidence,
      iou: self.iou,
      max_detections: self.max_detections,
      class_count: self.class_count,
      class_count_checked: AtomicBool::new(false),
    })
  }
}

/// 输入为 W x H 的 YOLO 检测模型，输出 [1, 4 + nc, N]
pub struct YoloOnnx<const W: u32, const H: u32> {
  session: Mutex<Session>,
  input_name: String,
  output_name: String,
  confidence: f32,
  iou: f32,
  max_detections: usize,
  class_count: Option<usize>,
  class_count_checked: AtomicBool,
}

impl<const W: u32, const H: u32> YoloOnnx<W, H> {
  pub fn input_size(&self) -> (u32, u32) {
    (W, H)
  }

  fn check_class_count(&self, channels: usize) {
    if self.class_count_checked.swap(true, Ordering::Relaxed) {
      return;
    }
    match class_count_mismatch(channels, self.class_count) {
      Some(model_classes) => warn!(
        "模型输出 {} 个类别，标签表有 {} 个类别，检测结果可能被错误标注",
        model_classes,
        self.class_count.unwrap_or_default()
      ),
      None => debug!("模型输出通道数: {}", channels),
    }
  }
}

impl<const W: u32, const H: u32> Model for YoloOnnx<W, H> {
  type Input = ImageFrame;
  type Output = DetectResult<u32>;
  type Error = YoloOnnxError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    debug!("预处理图像: {}", input.path.display());
    let frame = LetterboxFrame::<W, H>::from_image(&input.image);
    let [n, c, h, w] = frame.shape();
    let view = ArrayView4::from_shape((n, c, h, w), frame.as_nchw())?;
    let tensor = TensorRef::from_array_view(view)?;

    let mut session = self
      .session
      .lock()
      .map_err(|_| YoloOnnxError::SessionPoisoned)?;

    debug!("执行模型推理");
    let outputs = session.run(ort::inputs![self.input_name.as_str() => tensor])?;
    let (shape, data) = outputs[self.output_name.as_str()].try_extract_tensor::<f32>()?;
    let dims: Vec<i64> = shape.iter().copied().collect();
    debug!("模型输出形状: {:?}", dims);

    let (channels, anchors) =
      yolo_output_layout(&dims).ok_or_else(|| YoloOnnxError::UnexpectedOutputShape(dims.clone()))?;
    self.check_class_count(channels);

    let candidates = decode_yolo_output(channels, anchors, data, self.confidence, |cx, cy, w, h| {
      frame.to_source_bbox(cx, cy, w, h)
    });
    debug!("置信度过滤后候选框: {}", candidates.len());

    let items = non_max_suppression(candidates, self.iou, self.max_detections);
    debug!("检测到 {} 个物体", items.len());

    Ok(DetectResult {
      items: items.into_boxed_slice(),
    })
  }
}
