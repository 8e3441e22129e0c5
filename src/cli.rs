use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Directory holding the local project storage [env: DOCSDK_DATA_DIR] [default: .docsdk].
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Storage capacity in bytes, keys and values combined [env: DOCSDK_QUOTA_BYTES] [default: 5 MiB].
    #[arg(long, global = true)]
    pub quota_bytes: Option<usize>,

    /// Base URL of the SDK generation backend [env: DOCSDK_API_URL].
    #[arg(long, global = true)]
    pub api_url: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    Generate(GenerateArgs),
    List,
    Show(ProjectArgs),
    Endpoints(ProjectArgs),
    Execute(ExecuteArgs),
    Stats,
    Clear,
    /// Projects registered on the backend rather than in local storage.
    Remote {
        #[command(subcommand)]
        command: RemoteCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum RemoteCommand {
    List,
    Show(ProjectArgs),
    Create(RemoteCreateArgs),
    Test(RemoteTestArgs),
}

#[derive(Debug, Args)]
pub struct RemoteCreateArgs {
    /// Project name.
    #[arg(long)]
    pub name: String,

    /// Documentation URL (must be http/https).
    #[arg(long)]
    pub url: String,

    /// Kind of documentation behind the URL.
    #[arg(long, default_value = crate::formats::DEFAULT_SOURCE_TYPE)]
    pub source_type: String,
}

#[derive(Debug, Args)]
pub struct RemoteTestArgs {
    /// Backend project id.
    pub id: String,

    /// Endpoint path template, e.g. `/pets/{petId}`.
    #[arg(long)]
    pub path: String,

    /// Parameter value as `name=value`; may be repeated.
    #[arg(long = "param", value_parser = parse_key_value)]
    pub params: Vec<(String, String)>,
}

#[derive(Debug, Args)]
pub struct GenerateArgs {
    /// Documentation URL (must be http/https).
    #[arg(long)]
    pub url: String,

    /// Project name (default: the name suggested by the backend).
    #[arg(long)]
    pub name: Option<String>,
}

#[derive(Debug, Args)]
pub struct ProjectArgs {
    /// Project id (as printed by `list`).
    pub id: String,
}

#[derive(Debug, Args)]
pub struct ExecuteArgs {
    /// Project id (as printed by `list`).
    pub id: String,

    /// Endpoint index (as printed by `endpoints`).
    #[arg(long)]
    pub endpoint: usize,

    /// Parameter value as `name=value`; may be repeated.
    #[arg(long = "param", value_parser = parse_key_value)]
    pub params: Vec<(String, String)>,

    /// Raw JSON body, used only for endpoints without declared parameters.
    #[arg(long)]
    pub body: Option<String>,

    /// Relay the request through the backend instead of calling the API directly.
    #[arg(long)]
    pub via_backend: bool,
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got `{raw}`"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("parameter name must not be empty: `{raw}`"));
    }
    Ok((key.to_string(), value.to_string()))
}
