use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "coursemap")]
#[command(about = "Track study plan progress and see which courses open up next")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, global = true, default_value = "coursemap.toml")]
    pub config: String,
}

/// Which plan to operate on
#[derive(Args, Debug, Clone)]
pub struct PlanSelector {
    /// Document id of the plan
    #[arg(required_unless_present = "name")]
    pub doc_id: Option<String>,

    /// Look the plan up by its assigned name instead
    #[arg(short, long, conflicts_with = "doc_id")]
    pub name: Option<String>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Cards,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Upload a study plan PDF for extraction
    Upload {
        /// Path to the PDF
        file: String,
    },

    /// Import a plan from a JSON file
    Import {
        /// Path to the JSON file
        file: String,

        /// The file is raw document-analysis output rather than a plan
        #[arg(long)]
        analyzer: bool,
    },

    /// Show a plan with course states
    Show {
        #[command(flatten)]
        plan: PlanSelector,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// List the courses that can be taken next
    Eligible {
        #[command(flatten)]
        plan: PlanSelector,
    },

    /// Mark courses as passed
    Pass {
        /// Document id of the plan
        doc_id: String,

        /// Course codes
        #[arg(required = true)]
        codes: Vec<String>,
    },

    /// Mark courses as not passed
    Fail {
        /// Document id of the plan
        doc_id: String,

        /// Course codes
        #[arg(required = true)]
        codes: Vec<String>,
    },

    /// Flip the passed flag of one course
    Toggle {
        /// Document id of the plan
        doc_id: String,

        /// Course code
        code: String,
    },

    /// Assign a name to a plan
    Rename {
        /// Document id of the plan
        doc_id: String,

        /// New name
        name: String,
    },

    /// Show progress statistics for a plan
    Stats {
        #[command(flatten)]
        plan: PlanSelector,

        /// Output format: table or json
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Print the effective configuration
    Config,
}
