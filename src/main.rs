// This binary crate is intentionally minimal.
// All training/inference logic lives in the library (src/lib.rs and its modules).
// Run the end-to-end demo with:
//   cargo run --example train_folder -- <dataset-dir> <epochs> <checkpoint.json>
fn main() {
    println!("doodle-brain: training/inference core for a draw-a-symbol classifier.");
    println!("Run `cargo run --example train_folder` to train on a folder dataset.");
}
