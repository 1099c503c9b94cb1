// 该文件是 IdCard Detect （证件检测） 项目的一部分。
// src/model/postprocess.rs - YOLO 输出解码与非极大值抑制
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

use tracing::debug;

use crate::model::DetectItem;

const CXYWH_OFFSET: usize = 4;

/// 解码形如 [4 + nc, N] 的检测头输出（按特征优先存储）
///
/// 每个锚点取最高的类别分数作为置信度，低于 `confidence` 的丢弃；
/// `to_bbox` 负责把模型坐标 (cx, cy, w, h) 映射为归一化的原图框。
pub fn decode_yolo_output<F>(
  channels: usize,
  anchors: usize,
  data: &[f32],
  confidence: f32,
  to_bbox: F,
) -> Vec<DetectItem<u32>>
where
  F: Fn(f32, f32, f32, f32) -> [f32; 4],
{
  if channels <= CXYWH_OFFSET || data.len() < channels * anchors {
    debug!(
      "输出张量大小不符: channels={}, anchors={}, len={}",
      channels,
      anchors,
      data.len()
    );
    return Vec::new();
  }

  let at = |feature: usize, anchor: usize| data[feature * anchors + anchor];
  let mut items = Vec::new();

  for i in 0..anchors {
    let (class_id, score) = (CXYWH_OFFSET..channels)
      .map(|f| (f - CXYWH_OFFSET, at(f, i)))
      .fold((0usize, f32::MIN), |best, cur| {
        if cur.1 > best.1 { cur } else { best }
      });

    if score < confidence {
      continue;
    }

    let bbox = to_bbox(at(0, i), at(1, i), at(2, i), at(3, i));
    items.push(DetectItem {
      kind: class_id as u32,
      score,
      bbox,
    });
  }

  items
}

/// 检查检测头输出形状是否为 [1, 4 + nc, N]（nc >= 1），返回 (通道数, 锚点数)
pub fn yolo_output_layout(dims: &[i64]) -> Option<(usize, usize)> {
  match *dims {
    [1, channels, anchors] if channels > CXYWH_OFFSET as i64 && anchors >= 0 => {
      Some((channels as usize, anchors as usize))
    }
    _ => None,
  }
}

/// 模型类别数与标签表不一致时返回模型的类别数
pub fn class_count_mismatch(channels: usize, expected: Option<usize>) -> Option<usize> {
  let model_classes = channels.saturating_sub(CXYWH_OFFSET);
  match expected {
    Some(expected) if expected != model_classes => Some(model_classes),
    _ => None,
  }
}

/// 两个 [x_min, y_min, x_max, y_max] 框的交并比
pub fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
  let x1 = a[0].max(b[0]);
  let y1 = a[1].max(b[1]);
  let x2 = a[2].min(b[2]);
  let y2 = a[3].min(b[3]);

  let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
  let area_a = (a[2] - a[0]).max(0.0) * (a[3] - a[1]).max(0.0);
  let area_b = (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0);
  let union = area_a + area_b - inter;

  if union <= 0.0 { 0.0 } else { inter / union }
}

/// 按类别的贪心 NMS，结果按置信度降序，最多保留 `max_detections` 个
pub fn non_max_suppression<T: PartialEq>(
  mut items: Vec<DetectItem<T>>,
  iou_threshold: f32,
  max_detections: usize,
) -> Vec<DetectItem<T>> {
  items.sort_by(|a, b| b.score.total_cmp(&a.score));

  let mut kept: Vec<DetectItem<T>> = Vec::new();
  for item in items {
    if kept.len() >= max_detections {
      break;
    }
    let suppressed = kept
      .iter()
      .any(|k| k.kind == item.kind && iou(&k.bbox, &item.bbox) > iou_threshold);
    if !suppressed {
      kept.push(item);
    }
  }

  kept
}
