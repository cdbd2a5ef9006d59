//! Ready-made agents and teams for Postgres data analytics.
//!
//! Every factory returns a freshly built [`Agent`]; nothing is shared between calls. External
//! collaborators (the reply generator, the database handle, the file emitter) are passed in
//! explicitly.
//!
//! Two teams are provided:
//!
//! | Team | Agents | Protocol |
//! |------|--------|----------|
//! | [`Team::DataEngineering`] (`data_eng`) | User_Proxy, Data_Engineer, Sr_Data_Analyst, Product_Manager | sequential |
//! | [`Team::DataVisualization`] (`data_viz`) | User_Proxy, Text/Json/Yml report analysts | broadcast |
//!
//! # Example
//!
//! ```rust,no_run
//! use agentrelay::files::FileEmitter;
//! use agentrelay::reply::ReplyFn;
//! use agentrelay::team::{build_team_orchestrator, SqlRunner, Team, TeamResources};
//! use agentrelay::AgentRelayConfig;
//! use async_trait::async_trait;
//! use std::sync::Arc;
//!
//! struct NoDb;
//!
//! #[async_trait]
//! impl SqlRunner for NoDb {
//!     async fn run_sql(
//!         &self,
//!         _sql: &str,
//!     ) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
//!         Ok("[]".to_string())
//!     }
//! }
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let resources = TeamResources {
//!     generator: Arc::new(ReplyFn::constant("APPROVED")),
//!     db: Arc::new(NoDb),
//!     files: Arc::new(FileEmitter::new("agent_results")),
//! };
//! let team: Team = "data_eng".parse()?;
//! let mut orchestrator = build_team_orchestrator(team, &resources, &AgentRelayConfig::default())?;
//! let result = orchestrator.sequential_conversation("How many users are there?").await;
//! println!("success: {}", result.success);
//!
//! // Appends this run's chats to agent_results/agent_chats_data_eng.jsonl
//! orchestrator.spy_on_agents().await?;
//! # Ok(())
//! # }
//! ```

use crate::agentrelay::agent::Agent;
use crate::agentrelay::config::AgentRelayConfig;
use crate::agentrelay::files::FileEmitter;
use crate::agentrelay::function_map::{
    string_arg, FunctionMap, FunctionParameter, FunctionSpec, ParameterType,
};
use crate::agentrelay::orchestrator::{Orchestrator, OrchestratorError};
use crate::agentrelay::reply::{DefaultAutoReply, ReplyGenerator};
use crate::agentrelay::sink::JsonlFileSink;
use async_trait::async_trait;
use std::error::Error;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

pub const COMPLETION_PROMPT: &str = "If everything looks good, respond with APPROVED";

pub const USER_PROXY_PROMPT: &str = "A human admin. Interact with the planner to discuss the plan. Plan execution needs to be approved by this admin.";
pub const DATA_ENGINEER_PROMPT: &str = "A Data Engineer. You follow an approved plan. Generate the initial SQL based on the requirements provided. Send it to the Sr Data Analyst for review.";
pub const SR_DATA_ANALYST_PROMPT: &str = "A Sr Data Analyst. You follow an approved plan. You run the SQL query and generate the response and send it to the product manager for final review.";
pub const PRODUCT_MANAGER_PROMPT: &str =
    "A Product Manager. You validate the response to make sure it's correct.";

pub const TEXT_REPORT_ANALYST_PROMPT: &str = "Text File Report Analyst. You exclusively use the write_file function on a summarized report.";
pub const JSON_REPORT_ANALYST_PROMPT: &str =
    "Json Report Analyst. You exclusively use the write_json_file function on the report.";
pub const YML_REPORT_ANALYST_PROMPT: &str =
    "Yaml Report Analyst. You exclusively use the write_yaml_file function on the report.";

/// Database handle the Sr Data Analyst runs queries through.
#[async_trait]
pub trait SqlRunner: Send + Sync {
    /// Run `sql` and return the rows rendered as text.
    async fn run_sql(&self, sql: &str) -> Result<String, Box<dyn Error + Send + Sync>>;
}

/// External collaborators shared by the agents of a team.
#[derive(Clone)]
pub struct TeamResources {
    pub generator: Arc<dyn ReplyGenerator>,
    pub db: Arc<dyn SqlRunner>,
    pub files: Arc<FileEmitter>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TeamError {
    UnknownTeam(String),
    Configuration(OrchestratorError),
}

impl fmt::Display for TeamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TeamError::UnknownTeam(name) => write!(f, "Unknown team: {}", name),
            TeamError::Configuration(e) => write!(f, "Team configuration failed: {}", e),
        }
    }
}

impl Error for TeamError {}

impl From<OrchestratorError> for TeamError {
    fn from(e: OrchestratorError) -> Self {
        TeamError::Configuration(e)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Team {
    DataEngineering,
    DataVisualization,
}

impl Team {
    /// Short name used on the command line and in chat log file names.
    pub fn as_str(&self) -> &'static str {
        match self {
            Team::DataEngineering => "data_eng",
            Team::DataVisualization => "data_viz",
        }
    }

    pub fn orchestrator_name(&self) -> &'static str {
        match self {
            Team::DataEngineering => {
                "Postgres Data Analytics Multi-Agent ::: Data Engineering Team"
            }
            Team::DataVisualization => "Postgres Data Analytics Multi-Agent ::: Data Viz Team",
        }
    }
}

impl FromStr for Team {
    type Err = TeamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "data_eng" => Ok(Team::DataEngineering),
            "data_viz" => Ok(Team::DataVisualization),
            other => Err(TeamError::UnknownTeam(other.to_string())),
        }
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn fname_parameter() -> FunctionParameter {
    FunctionParameter::new("fname", ParameterType::String)
        .with_description("The name of the file to write")
        .required()
}

fn content_parameter(name: &str) -> FunctionParameter {
    FunctionParameter::new(name, ParameterType::String)
        .with_description("The content of the file to write")
        .required()
}

/// Non-interactive admin that seeds the conversation. Replies with an empty string.
pub fn user_proxy() -> Agent {
    Agent::new("User_Proxy", Arc::new(DefaultAutoReply))
        .with_system_message(USER_PROXY_PROMPT)
        .with_default_termination()
}

/// Writes the initial SQL for the request.
pub fn data_engineer(generator: Arc<dyn ReplyGenerator>) -> Agent {
    Agent::new("Data_Engineer", generator)
        .with_system_message(DATA_ENGINEER_PROMPT)
        .with_default_termination()
}

/// Runs SQL through `db` via its `run_sql` function and reports the response.
pub fn sr_data_analyst(generator: Arc<dyn ReplyGenerator>, db: Arc<dyn SqlRunner>) -> Agent {
    let functions = FunctionMap::new().with_async_function(
        FunctionSpec::new("run_sql", "Run a SQL query against the postgres database")
            .with_parameter(
                FunctionParameter::new("sql", ParameterType::String)
                    .with_description("The SQL query to run")
                    .required(),
            ),
        Arc::new(move |args| {
            let db = Arc::clone(&db);
            Box::pin(async move {
                let sql = string_arg(&args, "sql")?;
                db.run_sql(sql).await
            })
        }),
    );

    Agent::new("Sr_Data_Analyst", generator)
        .with_system_message(SR_DATA_ANALYST_PROMPT)
        .with_function_map(functions)
}

/// Validates the response and answers `APPROVED` when it is correct.
pub fn product_manager(generator: Arc<dyn ReplyGenerator>) -> Agent {
    Agent::new("Product_Manager", generator)
        .with_system_message(format!("{}{}", PRODUCT_MANAGER_PROMPT, COMPLETION_PROMPT))
        .with_default_termination()
}

pub fn text_report_analyst(generator: Arc<dyn ReplyGenerator>, files: Arc<FileEmitter>) -> Agent {
    let functions = FunctionMap::new().with_async_function(
        FunctionSpec::new("write_file", "Write a file to the filesystem")
            .with_parameter(fname_parameter())
            .with_parameter(content_parameter("content")),
        Arc::new(move |args| {
            let files = Arc::clone(&files);
            Box::pin(async move {
                let fname = string_arg(&args, "fname")?;
                let content = string_arg(&args, "content")?;
                files
                    .write_file(fname, content)
                    .await
                    .map_err(|e| Box::new(e) as Box<dyn Error + Send + Sync>)
            })
        }),
    );

    Agent::new("Text_Report_Analyst", generator)
        .with_system_message(TEXT_REPORT_ANALYST_PROMPT)
        .with_function_map(functions)
}

pub fn json_report_analyst(generator: Arc<dyn ReplyGenerator>, files: Arc<FileEmitter>) -> Agent {
    let functions = FunctionMap::new().with_async_function(
        FunctionSpec::new("write_json_file", "Write a json file to the filesystem")
            .with_parameter(fname_parameter())
            .with_parameter(content_parameter("json_str")),
        Arc::new(move |args| {
            let files = Arc::clone(&files);
            Box::pin(async move {
                let fname = string_arg(&args, "fname")?;
                let json_str = string_arg(&args, "json_str")?;
                files
                    .write_json_file(fname, json_str)
                    .await
                    .map_err(|e| Box::new(e) as Box<dyn Error + Send + Sync>)
            })
        }),
    );

    Agent::new("Json_Report_Analyst", generator)
        .with_system_message(JSON_REPORT_ANALYST_PROMPT)
        .with_function_map(functions)
}

pub fn yaml_report_analyst(generator: Arc<dyn ReplyGenerator>, files: Arc<FileEmitter>) -> Agent {
    let functions = FunctionMap::new().with_async_function(
        FunctionSpec::new("write_yaml_file", "Write a Yaml file to the filesystem")
            .with_parameter(fname_parameter())
            .with_parameter(content_parameter("json_str")),
        Arc::new(move |args| {
            let files = Arc::clone(&files);
            Box::pin(async move {
                let fname = string_arg(&args, "fname")?;
                let json_str = string_arg(&args, "json_str")?;
                files
                    .write_yaml_file(fname, json_str)
                    .await
                    .map_err(|e| Box::new(e) as Box<dyn Error + Send + Sync>)
            })
        }),
    );

    Agent::new("Yml_Report_Analyst", generator)
        .with_system_message(YML_REPORT_ANALYST_PROMPT)
        .with_function_map(functions)
}

/// Assemble the agents of `team`, in protocol order, behind a new [`Orchestrator`].
///
/// The orchestrator uses `config` for pricing and spies into
/// `<chat_log_dir>/agent_chats_<team>.jsonl`.
pub fn build_team_orchestrator(
    team: Team,
    resources: &TeamResources,
    config: &AgentRelayConfig,
) -> Result<Orchestrator, TeamError> {
    let generator = &resources.generator;
    let agents = match team {
        Team::DataEngineering => vec![
            user_proxy(),
            data_engineer(Arc::clone(generator)),
            sr_data_analyst(Arc::clone(generator), Arc::clone(&resources.db)),
            product_manager(Arc::clone(generator)),
        ],
        Team::DataVisualization => vec![
            user_proxy(),
            text_report_analyst(Arc::clone(generator), Arc::clone(&resources.files)),
            json_report_analyst(Arc::clone(generator), Arc::clone(&resources.files)),
            yaml_report_analyst(Arc::clone(generator), Arc::clone(&resources.files)),
        ],
    };

    log::debug!("building team {} with {} agents", team, agents.len());
    let chat_log = JsonlFileSink::for_team(&config.chat_log_dir, team.as_str());
    let orchestrator = Orchestrator::new(
        team.orchestrator_name(),
        agents.into_iter().map(Arc::new).collect(),
    )?
    .with_config(config.clone())
    .with_sink(Arc::new(chat_log));
    Ok(orchestrator)
}
