// 该文件是 IdCard Detect （证件检测） 项目的一部分。
// src/label.rs - 类别标签表
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

use thiserror::Error;
use tracing::warn;

use crate::model::{DetectItem, DetectResult};

/// 类别标签
///
/// ONNX 导出的模型不携带类别元数据，标签编号必须与训练时一致。
pub trait WithLabel: Sized + Copy + std::fmt::Debug + 'static {
  fn to_label_str(&self) -> String;
  fn to_label_id(&self) -> u32;
  fn from_label_id(id: u32) -> Option<Self>;
  /// 按编号升序排列的全部标签
  fn all() -> &'static [Self];
}

/// 身份证检测模型的类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdCardLabel {
  /// 身份证正面
  Front,
  /// 身份证背面
  Back,
}

const ID_CARD_LABELS: [IdCardLabel; 2] = [IdCardLabel::Front, IdCardLabel::Back];

impl WithLabel for IdCardLabel {
  fn to_label_str(&self) -> String {
    match self {
      IdCardLabel::Front => "id_card_front",
      IdCardLabel::Back => "id_card_back",
    }
    .to_string()
  }

  fn to_label_id(&self) -> u32 {
    match self {
      IdCardLabel::Front => 0,
      IdCardLabel::Back => 1,
    }
  }

  fn from_label_id(id: u32) -> Option<Self> {
    match id {
      0 => Some(IdCardLabel::Front),
      1 => Some(IdCardLabel::Back),
      _ => None,
    }
  }

  fn all() -> &'static [Self] {
    &ID_CARD_LABELS
  }
}

#[derive(Error, Debug, PartialEq)]
pub enum LabelError {
  #[error("未知类别编号 {class_id} (置信度 {score:.3})")]
  UnknownClass { class_id: u32, score: f32 },
}

/// 遇到标签表之外的类别编号时的处理方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnknownClassPolicy {
  /// 报错并终止
  #[default]
  Fail,
  /// 记录警告并丢弃该检测
  Skip,
}

/// 将模型输出的类别编号映射为标签
pub fn resolve_labels<L: WithLabel>(
  result: &DetectResult<u32>,
  policy: UnknownClassPolicy,
) -> Result<DetectResult<L>, LabelError> {
  let mut items = Vec::with_capacity(result.items.len());
  for item in result.items.iter() {
    match L::from_label_id(item.kind) {
      Some(kind) => items.push(DetectItem {
        kind,
        score: item.score,
        bbox: item.bbox,
      }),
      None => match policy {
        UnknownClassPolicy::Fail => {
          return Err(LabelError::UnknownClass {
            class_id: item.kind,
            score: item.score,
          });
        }
        UnknownClassPolicy::Skip => {
          warn!(
            "跳过未知类别编号 {} (置信度 {:.3})",
            item.kind, item.score
          );
        }
      },
    }
  }

  Ok(DetectResult {
    items: items.into_boxed_slice(),
  })
}

/// 以 `{0: 'a', 1: 'b'}` 的形式输出标签表
pub fn class_table_repr<L: WithLabel>() -> String {
  let entries = L::all()
    .iter()
    .map(|l| format!("{}: '{}'", l.to_label_id(), l.to_label_str()))
    .collect::<Vec<_>>();
  format!("{{{}}}", entries.join(", "))
}

/// 以 `['a', 'b']` 的形式输出类别名称
pub fn class_names_repr<L: WithLabel>() -> String {
  let names = L::all()
    .iter()
    .map(|l| format!("'{}'", l.to_label_str()))
    .collect::<Vec<_>>();
  format!("[{}]", names.join(", "))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn raw(items: &[(u32, f32)]) -> DetectResult<u32> {
    DetectResult {
      items: items
        .iter()
        .map(|&(kind, score)| DetectItem {
          kind,
          score,
          bbox: [0.1, 0.1, 0.5, 0.5],
        })
        .collect(),
    }
  }

  #[test]
  fn label_ids_round_trip_through_table() {
    for label in IdCardLabel::all() {
      assert_eq!(IdCardLabel::from_label_id(label.to_label_id()), Some(*label));
    }
    assert_eq!(IdCardLabel::from_label_id(2), None);
  }

  #[test]
  fn renders_python_style_table_and_names() {
    assert_eq!(
      class_table_repr::<IdCardLabel>(),
      "{0: 'id_card_front', 1: 'id_card_back'}"
    );
    assert_eq!(
      class_names_repr::<IdCardLabel>(),
      "['id_card_front', 'id_card_back']"
    );
  }

  #[test]
  fn unknown_class_fails_by_default() {
    let err = resolve_labels::<IdCardLabel>(&raw(&[(0, 0.9), (5, 0.4)]), UnknownClassPolicy::default())
      .unwrap_err();
    assert_eq!(
      err,
      LabelError::UnknownClass {
        class_id: 5,
        score: 0.4
      }
    );
  }

  #[test]
  fn unknown_class_is_dropped_when_skipping() {
    let resolved =
      resolve_labels::<IdCardLabel>(&raw(&[(1, 0.8), (7, 0.6), (0, 0.5)]), UnknownClassPolicy::Skip)
        .unwrap();
    let kinds: Vec<_> = resolved.items.iter().map(|i| i.kind).collect();
    assert_eq!(kinds, vec![IdCardLabel::Back, IdCardLabel::Front]);
  }
}
