use std::sync::Arc;

use rfd_core::config::Config;

#[tokio::main]
async fn main() -> Result<(), rfd_core::Error> {
    rfd_core::logging::init("rfd")?;

    let cfg = Arc::new(Config::load()?);
    tracing::info!(
        data_dir = %cfg.data_dir.display(),
        digest = %cfg.digest_file.display(),
        "configuration loaded"
    );

    rfd_telegram::router::run_polling(cfg)
        .await
        .map_err(|e| rfd_core::Error::External(format!("telegram bot failed: {e}")))?;

    Ok(())
}
