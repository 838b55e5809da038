use clap::Parser;
use std::path::PathBuf;

/// Student Academic Success Predictor dashboard
#[derive(Debug, Clone, Parser)]
#[command(name = "student-success-predictor", version, about)]
pub struct Config {
    /// Gradient boosted model saved in XGBoost JSON format
    #[arg(long, env = "STUDENT_MODEL_PATH", default_value = "student_performance_model.json")]
    pub model_path: PathBuf,

    /// Address the dashboard binds to
    #[arg(long, env = "STUDENT_HOST", default_value = "127.0.0.1")]
    pub host: String,

    #[arg(long, env = "STUDENT_PORT", default_value_t = 8080)]
    pub port: u16,

    /// HTTP worker threads (defaults to the number of CPU cores)
    #[arg(long, env = "STUDENT_WORKERS")]
    pub workers: Option<usize>,
}

impl Config {
    pub fn bind_address(&self) -> (String, u16) {
        (self.host.clone(), self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::try_parse_from(["student-success-predictor"]).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.workers, None);
        assert_eq!(config.bind_address().0, "127.0.0.1");
    }

    #[test]
    fn test_flags_override_defaults() {
        let config = Config::try_parse_from([
            "student-success-predictor",
            "--model-path",
            "models/xgb.json",
            "--port",
            "9000",
            "--workers",
            "2",
        ])
        .unwrap();
        assert_eq!(config.model_path, PathBuf::from("models/xgb.json"));
        assert_eq!(config.port, 9000);
        assert_eq!(config.workers, Some(2));
    }
}
