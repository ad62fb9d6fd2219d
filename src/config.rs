use std::path::{Path, PathBuf};
use std::{env, fmt};

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Server {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Model {
    pub emotion_path: PathBuf,
    pub detector_path: Option<PathBuf>,
    pub detector_score_threshold: f32,
    pub detector_iou_threshold: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Logger {
    pub level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: Server,
    pub model: Model,
    pub logger: Logger,
}

impl Settings {
    /// Reads `conf/default.toml`, `conf/{RUN_MODE}.toml` and `AURASENSE__*`
    /// environment variables, in that order.
    pub fn new() -> Result<Self, ConfigError> {
        Settings::load(Path::new("conf"))
    }

    pub fn load(conf_dir: &Path) -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let mut builder = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8000)?
            .set_default("server.max_upload_bytes", 10 * 1024 * 1024)?
            .set_default("model.emotion_path", "models/facial_expression.onnx")?
            .set_default("model.detector_score_threshold", 0.7)?
            .set_default("model.detector_iou_threshold", 0.3)?
            .set_default("logger.level", "info")?
            .add_source(File::from(conf_dir.join("default")).required(false))
            .add_source(File::from(conf_dir.join(&run_mode)).required(false))
            .add_source(
                Environment::with_prefix("AURASENSE")
                    .prefix_separator("__")
                    .separator("__"),
            );

        if let Ok(port) = env::var("PORT") {
            builder = builder.set_override("server.port", port)?;
        }

        builder.build()?.try_deserialize()
    }
}

impl fmt::Display for Server {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "http://{}:{}", self.host, self.port)
    }
}
