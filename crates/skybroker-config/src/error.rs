use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not determine the user configuration directory")]
    ConfigDirNotFound,

    #[error(
        "no configuration file found. Checked:\n\
        - current directory: skybroker.local.yaml, .skybroker.local.yaml, skybroker.yaml, .skybroker.yaml\n\
        - ./.skybroker/ directory\n\
        - ~/.config/skybroker/skybroker.yaml\n\
        or set SKYBROKER_CONFIG to point at a file directly"
    )]
    FileNotFound,

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
