// 该文件是 IdCard Detect （证件检测） 项目的一部分。
// src/output/draw.rs - 目标检测结果可视化
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

use image::{Rgb, RgbImage};
use imageproc::{drawing::draw_hollow_rect_mut, rect::Rect};

use crate::{
  label::WithLabel,
  model::{DetectItem, DetectResult},
};

const BOX_THICKNESS: u32 = 2;
const BOX_PALETTE: [[u8; 3]; 6] = [
  [0, 0, 255],   // 蓝色
  [0, 255, 0],   // 绿色
  [255, 0, 0],   // 红色
  [255, 255, 0], // 黄色
  [255, 0, 255], // 品红
  [0, 255, 255], // 青色
];

pub struct Draw {
  thickness: u32,
  palette: &'static [[u8; 3]],
}

impl Default for Draw {
  fn default() -> Self {
    Self {
      thickness: BOX_THICKNESS,
      palette: &BOX_PALETTE,
    }
  }
}

impl Draw {
  fn color_of<T: WithLabel>(&self, kind: &T) -> Rgb<u8> {
    Rgb(self.palette[kind.to_label_id() as usize % self.palette.len()])
  }

  // bbox 为归一化坐标 [x_min, y_min, x_max, y_max]
  fn draw_bbox(&self, image: &mut RgbImage, bbox: &[f32; 4], color: Rgb<u8>) {
    let (w, h) = (image.width() as f32, image.height() as f32);
    if w < 1.0 || h < 1.0 {
      return;
    }

    let x_min = (bbox[0] * w).floor().clamp(0.0, w - 1.0) as i32;
    let y_min = (bbox[1] * h).floor().clamp(0.0, h - 1.0) as i32;
    let x_max = (bbox[2] * w).ceil().clamp(0.0, w - 1.0) as i32;
    let y_max = (bbox[3] * h).ceil().clamp(0.0, h - 1.0) as i32;

    for t in 0..self.thickness as i32 {
      let width = x_max - x_min - 2 * t + 1;
      let height = y_max - y_min - 2 * t + 1;
      if width <= 0 || height <= 0 {
        break;
      }
      let rect = Rect::at(x_min + t, y_min + t).of_size(width as u32, height as u32);
      draw_hollow_rect_mut(image, rect, color);
    }
  }

  pub fn draw_detections_on_image<T: WithLabel>(
    &self,
    image: &mut RgbImage,
    result: &DetectResult<T>,
  ) {
    for DetectItem { kind, bbox, .. } in result.items.iter() {
      self.draw_bbox(image, bbox, self.color_of(kind));
    }
  }

  pub fn draw_detection<T: WithLabel>(&self, image: &RgbImage, result: &DetectResult<T>) -> RgbImage {
    let mut image = image.clone();
    self.draw_detections_on_image(&mut image, result);
    image
  }
}

/// 以文本形式记录检测结果
pub struct Record {
  pub label_with_name: bool,
}

impl Record {
  pub fn format<T: WithLabel>(&self, result: &DetectResult<T>) -> String {
    result
      .items
      .iter()
      .map(|item| {
        let name = if self.label_with_name {
          item.kind.to_label_str()
        } else {
          item.kind.to_label_id().to_string()
        };
        format!(
          "{}, {:.4}, {:.4}, {:.4}, {:.4}, {:.4}",
          name, item.score, item.bbox[0], item.bbox[1], item.bbox[2], item.bbox[3]
        )
      })
      .collect::<Vec<_>>()
      .join("\n")
  }

  pub fn record<T: WithLabel>(
    &self,
    result: &DetectResult<T>,
    path: &std::path::Path,
  ) -> Result<(), std::io::Error> {
    std::fs::write(path.with_extension("txt"), self.format(result))
  }
}
