use flow_backend::config::Config;
use flow_backend::error::ConfigurationError;
use tracing::Level;

#[rocket::main]
async fn main() -> anyhow::Result<()> {
    #[cfg(debug_assertions)]
    let level = Some(Level::DEBUG);
    #[cfg(not(debug_assertions))]
    let level = Some(Level::INFO);

    if dotenv::dotenv().is_err() {
        eprintln!("Unable to load .env file.");
    }

    let config = match Config::load() {
        Ok(c) => c,
        Err(ConfigurationError::NotFound(dir)) => {
            let c = Config::default();
            if c.save().is_err() {
                eprintln!("Unable to save generated configuration to {}.", dir.display());
            }
            c
        }
        Err(other) => return Err(other.into()),
    };

    let r = flow_backend::create(config, level).await?;
    if let Err(e) = r.launch().await {
        tracing::error!("Error launching server: {}", e);
        return Err(anyhow::anyhow!("server failed: {}", e));
    }

    Ok(())
}
