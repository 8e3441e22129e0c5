use std::path::PathBuf;

use crate::backend::DEFAULT_API_URL;
use crate::cli::GlobalArgs;

pub const DEFAULT_DATA_DIR: &str = ".docsdk";
pub const DEFAULT_QUOTA_BYTES: usize = 5 * 1024 * 1024;
pub const MIN_QUOTA_BYTES: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub quota_bytes: usize,
    pub api_url: String,
}

impl AppConfig {
    /// Resolves each setting as flag, then `DOCSDK_*` environment variable, then default.
    pub fn resolve(args: &GlobalArgs) -> anyhow::Result<Self> {
        Self::resolve_with(args, |name| std::env::var(name).ok())
    }

    fn resolve_with(
        args: &GlobalArgs,
        env: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<Self> {
        let lookup = |name: &str| {
            env(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let data_dir = args
            .data_dir
            .clone()
            .or_else(|| lookup("DOCSDK_DATA_DIR").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));

        let quota_bytes = match args.quota_bytes {
            Some(value) => value,
            None => match lookup("DOCSDK_QUOTA_BYTES") {
                Some(raw) => raw.parse::<usize>().unwrap_or_else(|err| {
                    tracing::warn!(value = %raw, %err, "ignoring invalid DOCSDK_QUOTA_BYTES");
                    DEFAULT_QUOTA_BYTES
                }),
                None => DEFAULT_QUOTA_BYTES,
            },
        };
        if quota_bytes < MIN_QUOTA_BYTES {
            anyhow::bail!("quota must be at least {MIN_QUOTA_BYTES} bytes (got {quota_bytes})");
        }

        let api_url = args
            .api_url
            .clone()
            .or_else(|| lookup("DOCSDK_API_URL"))
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let parsed = url::Url::parse(&api_url)
            .map_err(|err| anyhow::anyhow!("invalid api url {api_url:?}: {err}"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            anyhow::bail!("api url must be http/https: {api_url}");
        }

        Ok(Self {
            data_dir,
            quota_bytes,
            api_url,
        })
    }
}
