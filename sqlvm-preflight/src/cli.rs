//! CLI argument parsing for sqlvm-preflight
//!
//! This module contains only the clap derive structs.
//! Cross-field validation happens in validators.rs.

use clap::builder::PossibleValuesParser;
use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "sqlvm-preflight", author, version = env!("GIT_DESCRIBE"), about)]
pub struct Cli {
    /// Resource group of the SQL virtual machine
    #[clap(short = 'g', long)]
    pub resource_group: String,

    /// Name of the SQL virtual machine (the Azure VM shares this name)
    #[clap(short = 'n', long)]
    pub name: String,

    /// Subscription ID (falls back to AZURE_SUBSCRIPTION_ID)
    #[clap(long)]
    pub subscription: Option<String>,

    /// Name or resource ID of the SQL virtual machine group
    #[clap(long)]
    pub sql_vm_group: Option<String>,

    /// Names or resource IDs of the SQL virtual machines to add to a group
    #[clap(long, value_delimiter = ',', num_args = 1..)]
    pub sql_vms: Vec<String>,

    /// Name or resource ID of the load balancer
    #[clap(long)]
    pub load_balancer: Option<String>,

    /// Name or resource ID of the public IP address
    #[clap(long)]
    pub public_ip_address: Option<String>,

    /// Subnet resource ID, or a subnet name combined with --vnet-name
    #[clap(long)]
    pub subnet: Option<String>,

    /// Virtual network name (only with a subnet *name*)
    #[clap(long)]
    pub vnet_name: Option<String>,

    /// SQL Server management mode
    #[clap(long, value_parser = PossibleValuesParser::new(["Full", "LightWeight", "NoAgent"]))]
    pub sql_mgmt_type: Option<String>,

    /// SQL image SKU (required with --sql-mgmt-type NoAgent)
    #[clap(long)]
    pub image_sku: Option<String>,

    /// SQL image offer, e.g. SQL2022-WS2022 (required with --sql-mgmt-type NoAgent)
    #[clap(long)]
    pub image_offer: Option<String>,

    /// Least-privilege mode (requires --sql-mgmt-type Full)
    #[clap(long, value_parser = PossibleValuesParser::new(["Enabled", "NotSpecified"]))]
    pub least_privilege_mode: Option<String>,

    /// Response properties to expand; joined into one comma-separated string
    #[clap(long, value_delimiter = ',', num_args = 1..)]
    pub expand: Vec<String>,

    /// Enable SQL best-practices assessment (true|false)
    #[clap(long)]
    pub enable_assessment: Option<bool>,

    /// Enable the assessment schedule (true|false)
    #[clap(long)]
    pub enable_assessment_schedule: Option<bool>,

    /// Weekly interval for the assessment schedule (1-6)
    #[clap(long, value_parser = clap::value_parser!(u32).range(1..=6))]
    pub assessment_weekly_interval: Option<u32>,

    /// Monthly occurrence for the assessment schedule (1-5, or -1 for last)
    #[clap(long, allow_negative_numbers = true, value_parser = clap::value_parser!(i32).range(-1..=5))]
    pub assessment_monthly_occurrence: Option<i32>,

    /// Day of week the assessment runs
    #[clap(long, value_parser = PossibleValuesParser::new([
        "Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday", "Sunday",
    ]))]
    pub assessment_day_of_week: Option<String>,

    /// Local start time for the assessment, 24-hour HH:MM
    #[clap(long)]
    pub assessment_start_time_local: Option<String>,

    /// Enable Azure AD authentication on the SQL VM (true|false)
    #[clap(long)]
    pub enable_azure_ad_auth: Option<bool>,

    /// Client ID of the user-assigned managed identity to validate;
    /// omitted means the system-assigned identity
    #[clap(long)]
    pub msi_client_id: Option<String>,

    /// Skip the managed-identity validation steps
    #[clap(long)]
    pub skip_msi_validation: bool,
}
