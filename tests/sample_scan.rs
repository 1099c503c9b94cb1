use std::cell::RefCell;
use std::collections::HashMap;
use std::convert::Infallible;
use std::path::Path;

use image::{Rgb, RgbImage};

use idcard_detect::{
  frame::ImageFrame,
  label::{IdCardLabel, LabelError, UnknownClassPolicy},
  model::{DetectItem, DetectResult, Model},
  output::Render,
  summary::write_performance_summary,
  task::{SampleScanTask, ScanReport, Task},
};

const MODEL_INFO: &str = "=== 模型信息 ===\n\
                          输入尺寸: 640x640\n\
                          类别数量: 2\n\
                          类别名称: ['id_card_front', 'id_card_back']\n";

/// 按文件名返回预设检测结果的模型
#[derive(Default)]
struct FakeModel {
  detections: HashMap<String, Vec<(u32, f32)>>,
  calls: RefCell<Vec<String>>,
}

impl FakeModel {
  fn with(mut self, file: &str, detections: &[(u32, f32)]) -> Self {
    self.detections.insert(file.to_string(), detections.to_vec());
    self
  }
}

impl Model for &FakeModel {
  type Input = ImageFrame;
  type Output = DetectResult<u32>;
  type Error = Infallible;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    let name = input.file_name();
    self.calls.borrow_mut().push(name.clone());
    let items = self
      .detections
      .get(&name)
      .map(|d| {
        d.iter()
          .map(|&(kind, score)| DetectItem {
            kind,
            score,
            bbox: [0.1, 0.1, 0.9, 0.9],
          })
          .collect()
      })
      .unwrap_or_default();
    Ok(DetectResult { items })
  }
}

/// 记录渲染过的结果
#[derive(Default)]
struct Collect {
  seen: RefCell<Vec<(String, usize)>>,
}

impl Render<ImageFrame, DetectResult<IdCardLabel>> for &Collect {
  type Error = Infallible;

  fn render_result(
    &self,
    frame: &ImageFrame,
    result: &DetectResult<IdCardLabel>,
  ) -> Result<(), Self::Error> {
    self.seen.borrow_mut().push((frame.file_name(), result.len()));
    Ok(())
  }
}

fn write_image(dir: &Path, name: &str) {
  RgbImage::from_pixel(8, 6, Rgb([200, 200, 200]))
    .save(dir.join(name))
    .unwrap();
}

fn run(
  dir: &Path,
  model: &FakeModel,
  policy: UnknownClassPolicy,
) -> (anyhow::Result<ScanReport>, String) {
  let mut out = Vec::new();
  let collect = Collect::default();
  let result = SampleScanTask::<IdCardLabel, _>::new(&mut out, "models/id_card_detection.onnx")
    .with_policy(policy)
    .run_task(dir, model, &collect);
  (result, String::from_utf8(out).unwrap())
}

#[test]
fn reports_single_front_detection() {
  let dir = tempfile::tempdir().unwrap();
  write_image(dir.path(), "card.jpg");
  let model = FakeModel::default().with("card.jpg", &[(0, 0.87)]);

  let (report, out) = run(dir.path(), &model, UnknownClassPolicy::Fail);
  let report = report.unwrap();

  assert!(out.contains("找到 1 张测试图片\n"));
  assert!(out.contains("测试图片 1: card.jpg\n  检测到 1 个目标\n    - id_card_front: 0.870\n"));
  assert!(out.ends_with(MODEL_INFO));
  assert_eq!(
    report,
    ScanReport {
      directory_found: true,
      images_found: 1,
      images_processed: 1,
      detections: 1,
      interrupted: false,
    }
  );
}

#[test]
fn prints_header_with_model_path_and_class_table() {
  let dir = tempfile::tempdir().unwrap();
  let model = FakeModel::default();

  let (_, out) = run(dir.path(), &model, UnknownClassPolicy::Fail);
  assert!(out.starts_with(
    "=== YOLO模型测试 ===\n\
     模型路径: models/id_card_detection.onnx\n\
     模型类别: {0: 'id_card_front', 1: 'id_card_back'}\n\n"
  ));
}

#[test]
fn empty_directory_still_prints_model_info() {
  let dir = tempfile::tempdir().unwrap();
  std::fs::write(dir.path().join("readme.txt"), b"no images here").unwrap();
  let model = FakeModel::default();

  let (report, out) = run(dir.path(), &model, UnknownClassPolicy::Fail);
  let report = report.unwrap();

  assert_eq!(report.images_found, 0);
  assert!(model.calls.borrow().is_empty());
  assert!(out.contains("找到 0 张测试图片\n\n=== 模型信息 ===\n"));
  assert!(out.ends_with(MODEL_INFO));
}

#[test]
fn missing_directory_prints_message_and_model_info() {
  let dir = tempfile::tempdir().unwrap();
  let missing = dir.path().join("pictures");
  let model = FakeModel::default();

  let (report, out) = run(&missing, &model, UnknownClassPolicy::Fail);
  let report = report.unwrap();

  assert!(!report.directory_found);
  assert!(out.contains("测试目录不存在，请先运行数据准备脚本\n=== 模型信息 ===\n"));
  assert!(out.ends_with(MODEL_INFO));
}

#[test]
fn existing_file_path_scans_to_zero_images() {
  let dir = tempfile::tempdir().unwrap();
  let not_a_dir = dir.path().join("pictures");
  std::fs::write(&not_a_dir, b"").unwrap();
  let model = FakeModel::default();

  let (report, out) = run(&not_a_dir, &model, UnknownClassPolicy::Fail);
  let report = report.unwrap();

  assert!(report.directory_found);
  assert_eq!(report.images_found, 0);
  assert!(!out.contains("测试目录不存在"));
  assert!(out.contains("找到 0 张测试图片\n\n=== 模型信息 ===\n"));
}

#[test]
fn images_without_detections_are_reported() {
  let dir = tempfile::tempdir().unwrap();
  write_image(dir.path(), "blank.png");
  let model = FakeModel::default();

  let (report, out) = run(dir.path(), &model, UnknownClassPolicy::Fail);
  assert_eq!(report.unwrap().detections, 0);
  assert!(out.contains("测试图片 1: blank.png\n  未检测到目标\n\n"));
}

#[test]
fn processes_jpg_before_png_in_name_order() {
  let dir = tempfile::tempdir().unwrap();
  for name in ["b.png", "a.png", "z.jpg", "m.jpg"] {
    write_image(dir.path(), name);
  }
  let model = FakeModel::default()
    .with("z.jpg", &[(1, 0.91), (0, 0.4)])
    .with("a.png", &[(1, 0.5)]);

  let (report, out) = run(dir.path(), &model, UnknownClassPolicy::Fail);
  assert_eq!(report.unwrap().detections, 3);
  assert_eq!(*model.calls.borrow(), vec!["m.jpg", "z.jpg", "a.png", "b.png"]);
  assert!(out.contains(
    "测试图片 2: z.jpg\n  检测到 2 个目标\n    - id_card_back: 0.910\n    - id_card_front: 0.400\n"
  ));
}

#[test]
fn unknown_class_aborts_by_default() {
  let dir = tempfile::tempdir().unwrap();
  write_image(dir.path(), "a.jpg");
  write_image(dir.path(), "b.jpg");
  let model = FakeModel::default().with("a.jpg", &[(2, 0.66)]);

  let (report, out) = run(dir.path(), &model, UnknownClassPolicy::Fail);
  let err = report.unwrap_err();

  assert_eq!(
    err.downcast_ref::<LabelError>(),
    Some(&LabelError::UnknownClass {
      class_id: 2,
      score: 0.66
    })
  );
  assert_eq!(*model.calls.borrow(), vec!["a.jpg"]);
  assert!(!out.contains("=== 模型信息 ==="));
}

#[test]
fn unknown_class_is_skipped_when_requested() {
  let dir = tempfile::tempdir().unwrap();
  write_image(dir.path(), "a.jpg");
  let model = FakeModel::default().with("a.jpg", &[(2, 0.66), (0, 0.8)]);

  let (report, out) = run(dir.path(), &model, UnknownClassPolicy::Skip);
  assert_eq!(report.unwrap().detections, 1);
  assert!(out.contains("  检测到 1 个目标\n    - id_card_front: 0.800\n"));
}

#[test]
fn outputs_receive_every_processed_image() {
  let dir = tempfile::tempdir().unwrap();
  write_image(dir.path(), "a.jpg");
  write_image(dir.path(), "b.png");
  let model = FakeModel::default().with("b.png", &[(0, 0.7), (1, 0.6)]);

  let mut out = Vec::new();
  let collect = Collect::default();
  SampleScanTask::<IdCardLabel, _>::new(&mut out, "model.onnx")
    .run_task(dir.path(), &model, &collect)
    .unwrap();

  assert_eq!(
    *collect.seen.borrow(),
    vec![("a.jpg".to_string(), 0), ("b.png".to_string(), 2)]
  );
}

#[test]
fn undecodable_image_aborts_the_run() {
  let dir = tempfile::tempdir().unwrap();
  std::fs::write(dir.path().join("broken.jpg"), b"not a jpeg").unwrap();
  let model = FakeModel::default();

  let (report, _) = run(dir.path(), &model, UnknownClassPolicy::Fail);
  assert!(report.is_err());
  assert!(model.calls.borrow().is_empty());
}

#[test]
fn stop_signal_ends_scan_after_current_image() {
  let dir = tempfile::tempdir().unwrap();
  write_image(dir.path(), "a.jpg");
  write_image(dir.path(), "b.jpg");
  let model = FakeModel::default();

  let (tx, rx) = std::sync::mpsc::channel();
  tx.send(()).unwrap();

  let mut out = Vec::new();
  let collect = Collect::default();
  let report = SampleScanTask::<IdCardLabel, _>::new(&mut out, "model.onnx")
    .with_stop_signal(rx)
    .run_task(dir.path(), &model, &collect)
    .unwrap();

  assert!(report.interrupted);
  assert_eq!(report.images_processed, 1);
  assert!(String::from_utf8(out).unwrap().ends_with(MODEL_INFO));
}

#[test]
fn performance_summary_needs_no_model_or_images() {
  let mut out = Vec::new();
  write_performance_summary(&mut out).unwrap();
  let text = String::from_utf8(out).unwrap();

  let metric_lines: Vec<_> = text.lines().skip(1).take(5).collect();
  assert_eq!(
    metric_lines,
    vec![
      "根据训练结果，您的模型表现：",
      "✅ mAP50: 98.59% - 非常优秀",
      "✅ mAP50-95: 98.44% - 表现极佳",
      "✅ Precision: 99.50% - 精确率很高",
      "✅ Recall: 91.15% - 召回率很好",
    ]
  );
}
