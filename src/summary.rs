// 该文件是 IdCard Detect （证件检测） 项目的一部分。
// src/summary.rs - 模型性能摘要与模型信息
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

use std::io::{self, Write};

use crate::label::{WithLabel, class_names_repr};

/// 单项训练指标
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Metric {
  pub name: &'static str,
  /// 百分比
  pub value: f32,
  pub remark: &'static str,
}

/// 训练时记录下来的验证集指标，不由本程序计算
pub const RECORDED_METRICS: [Metric; 4] = [
  Metric {
    name: "mAP50",
    value: 98.59,
    remark: "非常优秀",
  },
  Metric {
    name: "mAP50-95",
    value: 98.44,
    remark: "表现极佳",
  },
  Metric {
    name: "Precision",
    value: 99.50,
    remark: "精确率很高",
  },
  Metric {
    name: "Recall",
    value: 91.15,
    remark: "召回率很好",
  },
];

pub fn write_performance_summary<W: Write>(out: &mut W) -> io::Result<()> {
  writeln!(out, "=== 模型性能摘要 ===")?;
  writeln!(out, "根据训练结果，您的模型表现：")?;
  for Metric {
    name,
    value,
    remark,
  } in RECORDED_METRICS.iter()
  {
    writeln!(out, "✅ {}: {:.2}% - {}", name, value, remark)?;
  }
  writeln!(out)?;
  writeln!(out, "这个模型已经可以用于生产环境！")
}

pub fn write_model_info<L: WithLabel, W: Write>(
  out: &mut W,
  input_size: (u32, u32),
) -> io::Result<()> {
  writeln!(out, "=== 模型信息 ===")?;
  writeln!(out, "输入尺寸: {}x{}", input_size.0, input_size.1)?;
  writeln!(out, "类别数量: {}", L::all().len())?;
  writeln!(out, "类别名称: {}", class_names_repr::<L>())
}
