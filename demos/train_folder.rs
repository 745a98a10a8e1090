//! End-to-end demo standing in for the GUI layer: load a folder dataset,
//! train in the background with live epoch printouts, save a checkpoint,
//! and predict on one image.
//!
//! Usage:
//!   cargo run --example train_folder -- <dataset-dir> [epochs] [checkpoint.json]
//!
//! The dataset directory must contain one subdirectory per class, each
//! holding image files for that class.

use std::path::{Path, PathBuf};
use std::process;

use doodle_brain::{Engine, EngineEvent};

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let dataset_dir = match args.get(1) {
        Some(d) => PathBuf::from(d),
        None => {
            eprintln!("usage: train_folder <dataset-dir> [epochs] [checkpoint.json]");
            process::exit(2);
        }
    };
    let epochs: usize = args.get(2).and_then(|e| e.parse().ok()).unwrap_or(5);
    let checkpoint_path = args
        .get(3)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("brain_model.json"));

    let mut engine = Engine::new(10);
    println!("program use: {}", engine.device());

    let events = engine.subscribe();

    let (train_set, val_set) = match engine.load_dataset(&dataset_dir) {
        Ok(split) => split,
        Err(e) => {
            eprintln!("failed to load dataset: {}", e);
            process::exit(1);
        }
    };
    println!(
        "dataset: {} train / {} validation samples, labels {:?}",
        train_set.len(),
        val_set.len(),
        engine.labels()
    );

    let handle = engine
        .train(train_set, val_set, epochs)
        .expect("no other training run is active");

    for event in events {
        match event {
            EngineEvent::EpochComplete { stats } => {
                println!(
                    "epoch {}/{}  train loss {:.6}  eval loss {:.6}  ({} ms)",
                    stats.epoch, stats.total_epochs, stats.train_loss, stats.eval_loss, stats.elapsed_ms
                );
            }
            EngineEvent::TrainingFinished { epochs_run } => {
                println!("training finished after {} epochs", epochs_run);
                break;
            }
            EngineEvent::TrainingFailed { reason } => {
                eprintln!("training failed: {}", reason);
                process::exit(1);
            }
            EngineEvent::DatasetLabeled { .. } => {}
        }
    }
    handle.wait();

    if let Err(e) = engine.save(&checkpoint_path) {
        eprintln!("failed to save checkpoint: {}", e);
        process::exit(1);
    }
    println!("checkpoint saved to {}", checkpoint_path.display());

    if let Some(sample) = first_image_file(&dataset_dir) {
        let img = image::open(&sample).expect("sample image decodes");
        let probs = engine.predict(&img);
        println!("prediction for {}:", sample.display());
        for (label, p) in engine.labels().iter().zip(probs.iter()) {
            println!("  {:<16} {:>6.2}%", label, p * 100.0);
        }
    }
}

fn first_image_file(root: &Path) -> Option<PathBuf> {
    let mut class_dirs: Vec<PathBuf> = std::fs::read_dir(root)
        .ok()?
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    class_dirs.sort();
    for dir in class_dirs {
        let mut files: Vec<PathBuf> = std::fs::read_dir(&dir)
            .ok()?
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .collect();
        files.sort();
        if let Some(f) = files.into_iter().next() {
            return Some(f);
        }
    }
    None
}
