//! Integration tests for the engine contract: dataset loading and splits,
//! class truncation, training history/events, checkpoint round-trips, and
//! the single-run guard.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use image::{DynamicImage, GrayImage, Luma};

use doodle_brain::dataset::DataSet;
use doodle_brain::{Engine, EngineEvent, Error, Tensor};

/// Creates a unique empty fixture directory under the system temp dir.
fn fixture_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "doodle-brain-test-{}-{}",
        std::process::id(),
        name
    ));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

/// Writes `count` small PNGs into `root/class`, each with a per-class,
/// per-index pattern so samples are distinguishable.
fn write_class(root: &Path, class: &str, count: usize) {
    let dir = root.join(class);
    fs::create_dir_all(&dir).unwrap();
    let class_byte = class.bytes().next().unwrap_or(0);
    for i in 0..count {
        let img = GrayImage::from_fn(16, 16, |x, y| {
            Luma([(x as u8)
                .wrapping_mul(7)
                .wrapping_add((y as u8).wrapping_mul(13))
                .wrapping_add(class_byte)
                .wrapping_add(i as u8)])
        });
        img.save(dir.join(format!("sample_{}.png", i))).unwrap();
    }
}

fn sample_image() -> DynamicImage {
    DynamicImage::ImageLuma8(GrayImage::from_fn(32, 32, |x, y| {
        Luma([((x * 5 + y * 11) % 255) as u8])
    }))
}

#[test]
fn predict_returns_a_probability_distribution() {
    let engine = Engine::new(3);
    let probs = engine.predict(&sample_image());
    assert_eq!(probs.len(), 3);
    assert!(probs.iter().all(|&p| p >= 0.0));
    let sum: f64 = probs.iter().sum();
    assert!((sum - 1.0).abs() < 1e-9, "probabilities sum to {}", sum);
}

#[test]
fn load_dataset_splits_eighty_twenty() {
    let root = fixture_dir("split");
    write_class(&root, "circle", 5);
    write_class(&root, "square", 5);

    let mut engine = Engine::new(5);
    let events = engine.subscribe();
    let (train, val) = engine.load_dataset(&root).unwrap();

    assert_eq!(val.len(), 2); // floor(0.2 * 10)
    assert_eq!(train.len(), 8);
    assert_eq!(engine.labels(), vec!["circle", "square"]);

    match events.try_recv().unwrap() {
        EngineEvent::DatasetLabeled { classes } => {
            assert_eq!(classes, vec!["circle", "square"]);
        }
        other => panic!("expected DatasetLabeled, got {:?}", other),
    }

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn load_dataset_truncates_excess_classes() {
    let root = fixture_dir("truncate");
    write_class(&root, "a", 2);
    write_class(&root, "b", 3);
    write_class(&root, "c", 4);

    let mut engine = Engine::new(2);
    let (train, val) = engine.load_dataset(&root).unwrap();

    // Only the first two classes (sorted order) survive; class "c" and all
    // of its samples are gone from both subsets.
    assert_eq!(engine.labels(), vec!["a", "b"]);
    assert_eq!(train.len() + val.len(), 5);
    assert!(train.targets.iter().chain(val.targets.iter()).all(|&t| t < 2));

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn load_dataset_rejects_invalid_layouts_without_mutation() {
    let empty = fixture_dir("empty");
    let mut engine = Engine::new(4);
    let events = engine.subscribe();

    let err = engine.load_dataset(&empty).unwrap_err();
    assert!(matches!(err, Error::Dataset(_)));

    let with_file = fixture_dir("stray-file");
    write_class(&with_file, "ok", 1);
    fs::write(with_file.join("stray.txt"), b"not a class").unwrap();
    let err = engine.load_dataset(&with_file).unwrap_err();
    assert!(matches!(err, Error::Dataset(_)));

    // Failed loads leave no trace: no labels, no events.
    assert!(engine.labels().is_empty());
    assert!(events.try_recv().is_err());

    let _ = fs::remove_dir_all(&empty);
    let _ = fs::remove_dir_all(&with_file);
}

#[test]
fn label_merge_across_datasets_is_idempotent_and_ordered() {
    let first = fixture_dir("labels-first");
    write_class(&first, "circle", 1);
    write_class(&first, "square", 1);
    let second = fixture_dir("labels-second");
    write_class(&second, "square", 1);
    write_class(&second, "star", 1);

    let mut engine = Engine::new(3);
    engine.load_dataset(&first).unwrap();
    engine.load_dataset(&second).unwrap();
    assert_eq!(engine.labels(), vec!["circle", "square", "star"]);

    // Reloading contributes nothing new and reorders nothing.
    engine.load_dataset(&first).unwrap();
    assert_eq!(engine.labels(), vec!["circle", "square", "star"]);

    let _ = fs::remove_dir_all(&first);
    let _ = fs::remove_dir_all(&second);
}

#[test]
fn train_then_checkpoint_round_trip() {
    let root = fixture_dir("train");
    write_class(&root, "circle", 3);
    write_class(&root, "square", 2);

    let mut engine = Engine::new(2);
    engine.set_split_seed(Some(11));
    let events = engine.subscribe();
    let (train, val) = engine.load_dataset(&root).unwrap();
    assert_eq!(val.len(), 1);

    let epochs = 2;
    let handle = engine.train(train, val, epochs).unwrap();
    handle.wait();

    // History grew by exactly `epochs` entries of non-negative pairs.
    let history = engine.history();
    assert_eq!(history.len(), epochs);
    for [train_loss, eval_loss] in &history {
        assert!(*train_loss >= 0.0 && train_loss.is_finite());
        assert!(*eval_loss >= 0.0);
    }

    // Progress fired once per epoch with strictly increasing 1-based indices.
    let mut expected_epoch = 1;
    let mut finished = false;
    while let Ok(event) = events.recv_timeout(Duration::from_secs(5)) {
        match event {
            EngineEvent::DatasetLabeled { .. } => {}
            EngineEvent::EpochComplete { stats } => {
                assert_eq!(stats.epoch, expected_epoch);
                assert_eq!(stats.total_epochs, epochs);
                expected_epoch += 1;
            }
            EngineEvent::TrainingFinished { epochs_run } => {
                assert_eq!(epochs_run, epochs);
                finished = true;
                break;
            }
            EngineEvent::TrainingFailed { reason } => panic!("training failed: {}", reason),
        }
    }
    assert!(finished);
    assert_eq!(expected_epoch, epochs + 1);

    // Round trip: an engine restored from the checkpoint reproduces labels,
    // history, output width, and predictions.
    let ckpt = std::env::temp_dir().join(format!("doodle-brain-rt-{}.json", std::process::id()));
    engine.save(&ckpt).unwrap();

    let img = sample_image();
    let before = engine.predict(&img);

    let mut restored = Engine::new(7);
    restored.load(&ckpt).unwrap();
    assert_eq!(restored.output_width(), 2);
    assert_eq!(restored.labels(), engine.labels());
    assert_eq!(restored.history(), history);

    let after = restored.predict(&img);
    assert_eq!(before.len(), after.len());
    for (b, a) in before.iter().zip(after.iter()) {
        assert!((b - a).abs() < 1e-9, "prediction drifted: {} vs {}", b, a);
    }

    let _ = fs::remove_file(&ckpt);
    let _ = fs::remove_dir_all(&root);
}

#[test]
fn second_training_run_is_rejected_while_one_is_active() {
    let mut engine = Engine::new(2);

    let tiny = DataSet {
        images: vec![Tensor::zeros(1, 256, 256)],
        targets: vec![0],
    };
    let handle = engine.train(tiny.clone(), DataSet::default(), 2).unwrap();

    let err = engine.train(tiny.clone(), DataSet::default(), 1).unwrap_err();
    assert!(matches!(err, Error::ConcurrentTraining));

    handle.wait();

    // Once the run finishes the guard releases and training works again.
    let handle = engine.train(tiny, DataSet::default(), 1).unwrap();
    handle.wait();
}

#[test]
fn worker_failure_surfaces_as_an_event() {
    let mut engine = Engine::new(2);
    let events = engine.subscribe();

    // Target index beyond the output width trips the loss invariant inside
    // the worker; the failure must arrive as an event, not a crash.
    let bad = DataSet {
        images: vec![Tensor::zeros(1, 256, 256)],
        targets: vec![9],
    };
    let handle = engine.train(bad, DataSet::default(), 1).unwrap();
    handle.wait();

    let mut failed = false;
    while let Ok(event) = events.recv_timeout(Duration::from_secs(5)) {
        if let EngineEvent::TrainingFailed { .. } = event {
            failed = true;
            break;
        }
    }
    assert!(failed, "expected a TrainingFailed event");

    // The engine stays usable afterwards.
    let probs = engine.predict(&sample_image());
    assert_eq!(probs.len(), 2);
}

#[test]
fn save_to_unwritable_path_is_an_io_error() {
    let engine = Engine::new(2);
    let err = engine
        .save(Path::new("/nonexistent-dir/brain.json"))
        .unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}
