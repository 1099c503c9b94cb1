// 该文件是 IdCard Detect （证件检测） 项目的一部分。
// src/frame.rs - 图像帧与 letterbox 张量
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

use image::{Rgb, RgbImage, imageops::FilterType};

const RGB_CHANNELS: usize = 3;
const LETTERBOX_PAD_VALUE: u8 = 114;

/// 从文件读入的一张图片
#[derive(Debug, Clone)]
pub struct ImageFrame {
  pub path: PathBuf,
  pub image: RgbImage,
}

impl ImageFrame {
  pub fn new(path: impl Into<PathBuf>, image: RgbImage) -> Self {
    Self {
      path: path.into(),
      image,
    }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn file_name(&self) -> String {
    self
      .path
      .file_name()
      .map(|n| n.to_string_lossy().into_owned())
      .unwrap_or_else(|| self.path.display().to_string())
  }
}

/// 按比例缩放并居中填充到 W x H 的 NCHW 浮点张量
#[derive(Debug, Clone)]
pub struct LetterboxFrame<const W: u32, const H: u32> {
  data: Box<[f32]>,
  scale: f32,
  pad_x: f32,
  pad_y: f32,
  source_width: f32,
  source_height: f32,
}

impl<const W: u32, const H: u32> LetterboxFrame<W, H> {
  pub fn from_image(image: &RgbImage) -> Self {
    let (w0, h0) = image.dimensions();
    let scale = (W as f32 / w0.max(1) as f32).min(H as f32 / h0.max(1) as f32);
    let new_w = ((w0 as f32 * scale).round() as u32).clamp(1, W);
    let new_h = ((h0 as f32 * scale).round() as u32).clamp(1, H);
    let pad_x = (W - new_w) / 2;
    let pad_y = (H - new_h) / 2;

    let resized = image::imageops::resize(image, new_w, new_h, FilterType::Triangle);
    let mut canvas = RgbImage::from_pixel(W, H, Rgb([LETTERBOX_PAD_VALUE; 3]));
    image::imageops::replace(&mut canvas, &resized, pad_x as i64, pad_y as i64);

    let plane = (W as usize) * (H as usize);
    let mut data = vec![0f32; RGB_CHANNELS * plane];
    for (x, y, pixel) in canvas.enumerate_pixels() {
      let idx = (y as usize) * (W as usize) + (x as usize);
      for c in 0..RGB_CHANNELS {
        data[c * plane + idx] = pixel[c] as f32 / 255.0;
      }
    }

    Self {
      data: data.into_boxed_slice(),
      scale,
      pad_x: pad_x as f32,
      pad_y: pad_y as f32,
      source_width: w0 as f32,
      source_height: h0 as f32,
    }
  }

  pub fn shape(&self) -> [usize; 4] {
    [1, RGB_CHANNELS, H as usize, W as usize]
  }

  pub fn as_nchw(&self) -> &[f32] {
    &self.data
  }

  /// 把模型输入坐标系下的 (cx, cy, w, h) 映射回原图，并归一化为
  /// [x_min, y_min, x_max, y_max]
  pub fn to_source_bbox(&self, cx: f32, cy: f32, w: f32, h: f32) -> [f32; 4] {
    let (sw, sh) = (self.source_width.max(1.0), self.source_height.max(1.0));
    let unmap = |v: f32, pad: f32, limit: f32| ((v - pad) / self.scale).clamp(0.0, limit);

    let x_min = unmap(cx - w / 2.0, self.pad_x, sw);
    let y_min = unmap(cy - h / 2.0, self.pad_y, sh);
    let x_max = unmap(cx + w / 2.0, self.pad_x, sw);
    let y_max = unmap(cy + h / 2.0, self.pad_y, sh);

    [x_min / sw, y_min / sh, x_max / sw, y_max / sh]
  }
}
