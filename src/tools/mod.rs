pub mod assistant;
pub mod browse;
pub mod company_research;
pub mod executor;
pub mod registry;
pub mod research;
pub mod schema;
pub mod weather;

pub use assistant::{ManageEmailTool, ScheduleEventTool};
pub use browse::BrowsePageTool;
pub use company_research::{CompanyResearchTool, COMPANY_RESEARCH_TOOL};
pub use executor::ToolExecutor;
pub use registry::{decode_args, Tool, ToolError, ToolRegistry};
pub use research::{
    GenerateReportTool, IdentifyCompetitorsTool, IdentifySectorTool, ValidateCompanyTool,
};
pub use schema::{parameters_schema_for, ToolSignature};
pub use weather::WeatherTool;
