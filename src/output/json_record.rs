// 该文件是 IdCard Detect （证件检测） 项目的一部分。
// src/output/json_record.rs - JSON Lines 检测记录
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

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{SecondsFormat, Utc};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::debug;

use crate::{
  FromUrl, FromUrlWithScheme, frame::ImageFrame, label::WithLabel, model::DetectResult,
  output::Render, output::url_path,
};

#[derive(Error, Debug)]
pub enum JsonRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("URI 路径无法解码: {0}")]
  PathDecodeError(#[from] std::string::FromUtf8Error),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 序列化错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("记录文件锁已损坏")]
  Poisoned,
}

/// `jsonl:///path/report.jsonl`，每张图片追加一行 JSON
pub struct JsonRecordOutput {
  path: PathBuf,
  file: Mutex<File>,
}

impl FromUrlWithScheme for JsonRecordOutput {
  const SCHEME: &'static str = "jsonl";
}

impl FromUrl for JsonRecordOutput {
  type Error = JsonRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(JsonRecordOutputError::SchemeMismatch);
    }

    let path = url_path(uri)?;
    if let Some(parent) = path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(&path)?;

    Ok(JsonRecordOutput {
      path,
      file: Mutex::new(file),
    })
  }
}

/// 以 f32 的最短十进制表示写入，避免扩成 f64 后出现 0.8700000047683716
fn json_f32(value: f32) -> Value {
  value
    .to_string()
    .parse::<f64>()
    .map(Value::from)
    .unwrap_or(Value::Null)
}

pub fn detection_record<T: WithLabel>(frame: &ImageFrame, result: &DetectResult<T>) -> Value {
  let detections = result
    .items
    .iter()
    .map(|item| {
      json!({
        "class_id": item.kind.to_label_id(),
        "class_name": item.kind.to_label_str(),
        "confidence": json_f32(item.score),
        "bbox": item.bbox.map(json_f32),
      })
    })
    .collect::<Vec<_>>();

  json!({
    "image": frame.path.display().to_string(),
    "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    "detections": detections,
  })
}

impl<T: WithLabel> Render<ImageFrame, DetectResult<T>> for JsonRecordOutput {
  type Error = JsonRecordOutputError;

  fn render_result(&self, frame: &ImageFrame, result: &DetectResult<T>) -> Result<(), Self::Error> {
    let line = serde_json::to_string(&detection_record(frame, result))?;
    let mut file = self
      .file
      .lock()
      .map_err(|_| JsonRecordOutputError::Poisoned)?;
    writeln!(file, "{}", line)?;
    file.flush()?;
    debug!("写入检测记录: {}", self.path.display());
    Ok(())
  }
}
