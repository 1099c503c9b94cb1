// 该文件是 IdCard Detect （证件检测） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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

use thiserror::Error;
use tracing::debug;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::ImageFrame,
  label::WithLabel,
  model::DetectResult,
  output::{
    Render,
    draw::{Draw, Record},
    url_path,
  },
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("URI 路径无法解码: {0}")]
  PathDecodeError(#[from] std::string::FromUtf8Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

pub enum DrawWrapper {
  Draw(Draw),
  Record(Record),
}

impl DrawWrapper {
  pub fn save_result<T: WithLabel>(
    &self,
    path: &Path,
    frame: &ImageFrame,
    result: &DetectResult<T>,
  ) -> Result<(), DirectoryRecordOutputError> {
    match self {
      DrawWrapper::Draw(draw) => {
        let image = draw.draw_detection(&frame.image, result);
        image.save(path)?;
      }
      DrawWrapper::Record(record) => {
        frame.image.save(path)?;
        record.record(result, path)?;
      }
    };

    Ok(())
  }

  pub fn with(kind: &str) -> Self {
    match kind {
      "record-name" => DrawWrapper::Record(Record {
        label_with_name: true,
      }),
      "record-id" => DrawWrapper::Record(Record {
        label_with_name: false,
      }),
      _ => DrawWrapper::Draw(Draw::default()),
    }
  }
}

/// `folder:///dir[?record=name|id][&always]`
///
/// 默认保存画好检测框的图片；`record` 时保存原图并写同名 `.txt` 记录。
/// 文件名为源文件名加 `.png`（记录为 `.txt`）。
/// 没有检测结果的图片只在 `always` 时保存。
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  draw: DrawWrapper,
  always: bool,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let kind = uri
      .query_pairs()
      .find(|(k, _)| k == "record")
      .map(|(_, v)| if v == "id" { "record-id" } else { "record-name" })
      .unwrap_or("draw");

    let always = uri.query_pairs().any(|(k, _)| k == "always");

    let directory = url_path(uri)?;
    std::fs::create_dir_all(&directory)?;

    Ok(DirectoryRecordOutput {
      directory,
      draw: DrawWrapper::with(kind),
      always,
    })
  }
}

impl DirectoryRecordOutput {
  /// 保留源文件扩展名，`card.jpg` 与 `card.png` 分别写为
  /// `card.jpg.png` 与 `card.png.png`
  fn frame_path(&self, frame: &ImageFrame) -> PathBuf {
    let name = frame
      .path
      .file_name()
      .map(|s| s.to_string_lossy().into_owned())
      .unwrap_or_else(|| "frame".to_string());
    self.directory.join(format!("{}.png", name))
  }
}

impl<T: WithLabel> Render<ImageFrame, DetectResult<T>> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(&self, frame: &ImageFrame, result: &DetectResult<T>) -> Result<(), Self::Error> {
    if self.always || !result.is_empty() {
      let path = self.frame_path(frame);
      debug!("保存检测结果到: {}", path.display());
      self.draw.save_result(&path, frame, result)?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::label::IdCardLabel;
  use crate::model::DetectItem;
  use image::RgbImage;
  use url::Url;

  fn folder_url(dir: &Path, query: &str) -> Url {
    Url::parse(&format!("folder://{}{}", dir.display(), query)).unwrap()
  }

  fn frame() -> ImageFrame {
    ImageFrame::new("/pictures/front.jpg", RgbImage::new(8, 8))
  }

  fn detected() -> DetectResult<IdCardLabel> {
    DetectResult {
      items: Box::new([DetectItem {
        kind: IdCardLabel::Front,
        score: 0.87,
        bbox: [0.1, 0.1, 0.9, 0.9],
      }]),
    }
  }

  #[test]
  fn saves_drawn_image_named_after_source() {
    let dir = tempfile::tempdir().unwrap();
    let output = DirectoryRecordOutput::from_url(&folder_url(dir.path(), "")).unwrap();

    output.render_result(&frame(), &detected()).unwrap();
    assert!(dir.path().join("front.jpg.png").is_file());
    assert!(!dir.path().join("front.jpg.txt").exists());
  }

  #[test]
  fn record_mode_writes_text_sidecar() {
    let dir = tempfile::tempdir().unwrap();
    let output = DirectoryRecordOutput::from_url(&folder_url(dir.path(), "?record=name")).unwrap();

    output.render_result(&frame(), &detected()).unwrap();
    let text = std::fs::read_to_string(dir.path().join("front.jpg.txt")).unwrap();
    assert!(text.starts_with("id_card_front, 0.8700"));
  }

  #[test]
  fn empty_results_are_skipped_unless_always() {
    let dir = tempfile::tempdir().unwrap();
    let empty = DetectResult::<IdCardLabel>::empty();

    let output = DirectoryRecordOutput::from_url(&folder_url(dir.path(), "")).unwrap();
    output.render_result(&frame(), &empty).unwrap();
    assert!(!dir.path().join("front.jpg.png").exists());

    let output = DirectoryRecordOutput::from_url(&folder_url(dir.path(), "?always")).unwrap();
    output.render_result(&frame(), &empty).unwrap();
    assert!(dir.path().join("front.jpg.png").exists());
  }

  #[test]
  fn same_stem_frames_keep_separate_records() {
    let dir = tempfile::tempdir().unwrap();
    let output = DirectoryRecordOutput::from_url(&folder_url(dir.path(), "?record=name")).unwrap();

    let back = DetectResult {
      items: Box::new([DetectItem {
        kind: IdCardLabel::Back,
        score: 0.9,
        bbox: [0.2, 0.2, 0.8, 0.8],
      }]),
    };
    output
      .render_result(&ImageFrame::new("/pics/card.jpg", RgbImage::new(8, 8)), &detected())
      .unwrap();
    output
      .render_result(&ImageFrame::new("/pics/card.png", RgbImage::new(8, 8)), &back)
      .unwrap();

    let mut files: Vec<_> = std::fs::read_dir(dir.path())
      .unwrap()
      .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
      .collect();
    files.sort();
    assert_eq!(
      files,
      vec!["card.jpg.png", "card.jpg.txt", "card.png.png", "card.png.txt"]
    );

    let front = std::fs::read_to_string(dir.path().join("card.jpg.txt")).unwrap();
    let back = std::fs::read_to_string(dir.path().join("card.png.txt")).unwrap();
    assert!(front.starts_with("id_card_front, 0.8700"));
    assert!(back.starts_with("id_card_back, 0.9000"));
  }
}
