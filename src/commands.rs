use std::collections::{BTreeMap, HashMap};
use std::io::Write as _;
use std::sync::Arc;

use anyhow::Context as _;
use url::Url;

use crate::backend::BackendClient;
use crate::cli::{
    Command, ExecuteArgs, GenerateArgs, ProjectArgs, RemoteCommand, RemoteCreateArgs,
    RemoteTestArgs,
};
use crate::config::AppConfig;
use crate::executor::{DirectTransport, Executor, PlaygroundTransport, Transport};
use crate::formats::{CreateProjectRequest, PlaygroundTestRequest, Project};
use crate::persistence::PersistenceManager;
use crate::projects::ProjectCatalog;
use crate::store::LocalFsStore;

pub struct App {
    catalog: ProjectCatalog,
    backend: BackendClient,
    http: reqwest::Client,
}

impl App {
    pub fn new(config: &AppConfig) -> anyhow::Result<Self> {
        let store = LocalFsStore::new(&config.data_dir, config.quota_bytes);
        let persistence = PersistenceManager::new(Arc::new(store));
        let http = reqwest::Client::builder()
            .user_agent(concat!("docsdk/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("build http client")?;
        Ok(Self {
            catalog: ProjectCatalog::new(persistence),
            backend: BackendClient::new(http.clone(), config.api_url.clone()),
            http,
        })
    }

    pub async fn run(&self, command: Command) -> anyhow::Result<()> {
        match command {
            Command::Generate(args) => self.generate(args).await.context("generate"),
            Command::List => self.list(),
            Command::Show(args) => self.show(args),
            Command::Endpoints(args) => self.endpoints(args),
            Command::Execute(args) => self.execute(args).await.context("execute"),
            Command::Stats => self.stats(),
            Command::Clear => {
                self.catalog.clear_all();
                println!("cleared all projects");
                Ok(())
            }
            Command::Remote { command } => self.remote(command).await.context("remote"),
        }
    }

    async fn remote(&self, command: RemoteCommand) -> anyhow::Result<()> {
        match command {
            RemoteCommand::List => {
                let projects = self.backend.list_projects().await?;
                let mut out = std::io::stdout().lock();
                for project in projects {
                    writeln!(
                        out,
                        "{}\t{}\t{}",
                        project.id,
                        project.name,
                        project.source_url.as_deref().unwrap_or("")
                    )?;
                }
                Ok(())
            }
            RemoteCommand::Show(args) => {
                let project = self.backend.get_project(&args.id).await?;
                let json = serde_json::to_string_pretty(&project).context("serialize project")?;
                println!("{json}");
                Ok(())
            }
            RemoteCommand::Create(args) => self.remote_create(args).await,
            RemoteCommand::Test(args) => self.remote_test(args).await,
        }
    }

    async fn remote_create(&self, args: RemoteCreateArgs) -> anyhow::Result<()> {
        let url = Url::parse(&args.url).with_context(|| format!("parse url: {}", args.url))?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!("url must be http/https: {url}");
        }
        let request = CreateProjectRequest {
            name: args.name,
            source_url: url.to_string(),
            source_type: args.source_type,
        };
        let project = self.backend.create_project(&request).await?;
        tracing::info!(project_id = %project.id, "registered backend project");
        println!("{}\t{}", project.id, project.name);
        Ok(())
    }

    async fn remote_test(&self, args: RemoteTestArgs) -> anyhow::Result<()> {
        let request = PlaygroundTestRequest {
            project_id: args.id,
            path: args.path,
            params: args.params.into_iter().collect::<BTreeMap<_, _>>(),
        };
        let tested = self.backend.playground_test(&request).await?;
        let json = serde_json::to_string_pretty(&tested.response).context("serialize response")?;
        println!("{json}");
        Ok(())
    }

    async fn generate(&self, args: GenerateArgs) -> anyhow::Result<()> {
        let url = Url::parse(&args.url).with_context(|| format!("parse url: {}", args.url))?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!("url must be http/https: {url}");
        }

        tracing::info!(source_url = %url, "requesting sdk generation");
        let generated = self
            .backend
            .generate(url.as_str())
            .await
            .context("request sdk generation")?;
        let (project, saved) = self
            .catalog
            .create(args.name.as_deref(), url.as_str(), generated);

        println!("{}\t{}", project.id, project.name);
        if !saved {
            eprintln!("warning: project could not be saved to local storage");
        }
        Ok(())
    }

    fn list(&self) -> anyhow::Result<()> {
        let mut out = std::io::stdout().lock();
        for project in self.catalog.list() {
            writeln!(
                out,
                "{}\t{}\t{}\t{}\t{} endpoints",
                project.id,
                project.name,
                project.source_url,
                project.created_at.format("%Y-%m-%d"),
                project.spec.endpoints.len()
            )?;
        }
        Ok(())
    }

    fn project(&self, id: &str) -> anyhow::Result<Project> {
        self.catalog
            .get(id)
            .ok_or_else(|| anyhow::anyhow!("project not found: {id}"))
    }

    fn show(&self, args: ProjectArgs) -> anyhow::Result<()> {
        let project = self.project(&args.id)?;
        let json = serde_json::to_string_pretty(&project).context("serialize project")?;
        println!("{json}");
        Ok(())
    }

    fn endpoints(&self, args: ProjectArgs) -> anyhow::Result<()> {
        let project = self.project(&args.id)?;
        let mut out = std::io::stdout().lock();
        for (index, endpoint) in project.spec.endpoints.iter().enumerate() {
            writeln!(
                out,
                "{index}\t{}\t{}\t{}",
                endpoint.method,
                endpoint.path,
                endpoint.summary.as_deref().unwrap_or("")
            )?;
        }
        if project.spec.truncated {
            writeln!(out, "(endpoint list truncated due to storage limits)")?;
        }
        Ok(())
    }

    async fn execute(&self, args: ExecuteArgs) -> anyhow::Result<()> {
        let project = self.project(&args.id)?;
        let endpoint = project.spec.endpoints.get(args.endpoint).ok_or_else(|| {
            anyhow::anyhow!(
                "endpoint index {} out of range ({} endpoints)",
                args.endpoint,
                project.spec.endpoints.len()
            )
        })?;

        let transport: Arc<dyn Transport> = if args.via_backend {
            Arc::new(PlaygroundTransport::new(self.backend.clone()))
        } else {
            Arc::new(DirectTransport::new(self.http.clone()))
        };
        let values: HashMap<String, String> = args.params.into_iter().collect();
        let outcome = Executor::new(transport)
            .execute(
                &project.spec.base_url,
                endpoint,
                &values,
                args.body.as_deref(),
            )
            .await;

        if outcome.is_success() {
            self.catalog.record_api_call();
        }
        let json = serde_json::to_string_pretty(&outcome).context("serialize outcome")?;
        println!("{json}");
        Ok(())
    }

    fn stats(&self) -> anyhow::Result<()> {
        let stats = self.catalog.stats();
        let mut out = std::io::stdout().lock();
        writeln!(out, "Active Projects: {}", stats.active_projects)?;
        writeln!(out, "Generated SDKs: {}", stats.generated_sdks)?;
        writeln!(out, "Total Endpoints: {}", stats.total_endpoints)?;
        writeln!(out, "API Calls: {}", stats.api_calls)?;
        for project in self.catalog.recent() {
            writeln!(out, "recent: {}\t{}", project.id, project.name)?;
        }
        Ok(())
    }
}
