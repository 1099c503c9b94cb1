// 该文件是 IdCard Detect （证件检测） 项目的一部分。
// src/input/image_directory.rs - 图像目录输入
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
use tracing::{debug, info};

use crate::frame::ImageFrame;
use crate::input::{ImageFileInputError, read_image_file};

pub const DEFAULT_IMAGE_EXTENSIONS: [&str; 2] = ["jpg", "png"];

#[derive(Error, Debug)]
pub enum ImageDirectoryInputError {
  #[error("目录不存在: {0}")]
  NotFound(PathBuf),
  #[error("读取目录 {0} 时发生 I/O 错误: {1}")]
  IoError(PathBuf, std::io::Error),
}

/// 目录下（不递归）扩展名匹配的图片
///
/// 按扩展名列表的顺序分组，组内按文件名排序；扩展名不区分大小写。
#[derive(Debug, Clone)]
pub struct ImageDirectoryInput {
  paths: Vec<PathBuf>,
}

impl ImageDirectoryInput {
  pub fn scan<S: AsRef<str>>(
    directory: impl AsRef<Path>,
    extensions: &[S],
  ) -> Result<Self, ImageDirectoryInputError> {
    let directory = directory.as_ref().to_path_buf();
    if !directory.exists() {
      return Err(ImageDirectoryInputError::NotFound(directory));
    }
    if !directory.is_dir() {
      info!("{} 不是目录，没有可扫描的图片", directory.display());
      return Ok(ImageDirectoryInput { paths: Vec::new() });
    }

    let io_err = |e| ImageDirectoryInputError::IoError(directory.clone(), e);
    let mut files = Vec::new();
    for entry in std::fs::read_dir(&directory).map_err(io_err)? {
      let path = entry.map_err(io_err)?.path();
      if path.is_file() {
        files.push(path);
      }
    }

    let mut paths: Vec<PathBuf> = Vec::new();
    for ext in extensions {
      let ext = ext.as_ref().trim_start_matches('.');
      let mut group: Vec<PathBuf> = files
        .iter()
        .filter(|p| has_extension(p, ext) && !paths.contains(p))
        .cloned()
        .collect();
      group.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
      debug!("扩展名 .{} 匹配 {} 个文件", ext, group.len());
      paths.extend(group);
    }

    info!("在 {} 中找到 {} 张图片", directory.display(), paths.len());
    Ok(ImageDirectoryInput { paths })
  }

  pub fn paths(&self) -> &[PathBuf] {
    &self.paths
  }

  pub fn len(&self) -> usize {
    self.paths.len()
  }

  pub fn is_empty(&self) -> bool {
    self.paths.is_empty()
  }

  /// 按顺序逐张解码
  pub fn frames(self) -> ImageDirectoryFrames {
    ImageDirectoryFrames {
      paths: self.paths.into_iter(),
    }
  }
}

fn has_extension(path: &Path, ext: &str) -> bool {
  path
    .extension()
    .and_then(|e| e.to_str())
    .map(|e| e.eq_ignore_ascii_case(ext))
    .unwrap_or(false)
}

pub struct ImageDirectoryFrames {
  paths: std::vec::IntoIter<PathBuf>,
}

impl Iterator for ImageDirectoryFrames {
  type Item = Result<ImageFrame, ImageFileInputError>;

  fn next(&mut self) -> Option<Self::Item> {
    self.paths.next().map(read_image_file)
  }

  fn size_hint(&self) -> (usize, Option<usize>) {
    self.paths.size_hint()
  }
}
