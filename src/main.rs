// Run `bikeshare-train [config.json]`; without an argument the default configuration is used.

use bikeshare_model::config::Config;
use bikeshare_model::train_pipeline::run_training;
use std::error::Error;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_json_file(path)?,
        None => Config::default(),
    };

    println!("Training the model -->");
    let report = run_training(&config).await?;
    println!(
        "Trained on {} rows, tested on {} rows",
        report.n_train, report.n_test
    );
    println!("R2 score: {}", report.r2);
    println!("Mean squared error: {}", report.mse);
    println!("Pipeline saved to {}", report.artifact_path.display());
    Ok(())
}
