// 该文件是 IdCard Detect （证件检测） 项目的一部分。
// src/config.rs - 项目参数配置
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

use std::path::PathBuf;

use clap::Parser;
use url::Url;

use crate::label::UnknownClassPolicy;

/// 身份证正反面检测：在样本图片目录上运行 ONNX 模型并打印结果
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// ONNX 模型文件路径
  #[arg(
    long,
    env = "IDCARD_MODEL",
    default_value = "models/id_card_detection.onnx",
    value_name = "FILE"
  )]
  pub model: PathBuf,

  /// 样本图片目录（不递归）
  #[arg(long, env = "IDCARD_IMAGES", default_value = "pictures", value_name = "DIR")]
  pub images: PathBuf,

  /// 置信度阈值 (0.0 - 1.0)
  #[arg(
    long,
    env = "IDCARD_CONFIDENCE",
    default_value = "0.25",
    value_parser = parse_unit_interval,
    value_name = "THRESHOLD"
  )]
  pub confidence: f32,

  /// NMS IOU 阈值 (0.0 - 1.0)
  #[arg(
    long,
    env = "IDCARD_IOU",
    default_value = "0.7",
    value_parser = parse_unit_interval,
    value_name = "THRESHOLD"
  )]
  pub iou: f32,

  /// 每张图片最多保留的检测数
  #[arg(long, default_value = "300", value_name = "COUNT")]
  pub max_detections: usize,

  /// 参与扫描的图片扩展名
  #[arg(long, default_value = "jpg,png", value_delimiter = ',', value_name = "EXT")]
  pub extensions: Vec<String>,

  /// 跳过标签表之外的类别编号（默认报错退出）
  #[arg(long)]
  pub skip_unknown: bool,

  /// 检测记录输出，可重复
  /// 支持格式:
  /// - folder:///dir[?record=name|id][&always]
  /// - jsonl:///path/report.jsonl
  #[arg(long, value_name = "OUTPUT")]
  pub output: Vec<Url>,

  /// 只打印模型性能摘要，不加载模型
  #[arg(long)]
  pub summary_only: bool,

  /// ONNX Runtime 算子内线程数
  #[arg(long, value_name = "COUNT")]
  pub threads: Option<usize>,
}

impl Args {
  pub fn unknown_class_policy(&self) -> UnknownClassPolicy {
    if self.skip_unknown {
      UnknownClassPolicy::Skip
    } else {
      UnknownClassPolicy::Fail
    }
  }
}

fn parse_unit_interval(s: &str) -> Result<f32, String> {
  let value: f32 = s.parse().map_err(|e| format!("{}: {}", s, e))?;
  if (0.0..=1.0).contains(&value) {
    Ok(value)
  } else {
    Err(format!("{} 不在 0.0 - 1.0 之间", value))
  }
}
