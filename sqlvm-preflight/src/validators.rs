//! Namespace normalizers and argument-combination rules.
//!
//! Each rule is a standalone function over [`ArgumentNamespace`]; the
//! normalizers mutate the namespace in place (a bare name becomes a full
//! resource ID), the combination rules only read it. Rules are independent of
//! one another; the pipeline in `lib.rs` runs them in a fixed order and stops
//! at the first failure.

use chrono::NaiveTime;

use crate::cli::Cli;
use crate::error::{ValidationError, ValidationResult};
use crate::resource_id::{is_valid_resource_id, ResourceId};

const SUBNET_USAGE: &str = "incorrect usage: --subnet ID | --subnet NAME --vnet-name NAME";
const TIME_FORMAT: &str = "%H:%M";

/// The argument bag for one command invocation. Built from the parsed CLI,
/// normalized in place, discarded once the command completes.
#[derive(Debug, Clone, Default)]
pub struct ArgumentNamespace {
    pub resource_group_name: String,
    pub sql_virtual_machine_name: String,
    pub sql_virtual_machine_group_resource_id: Option<String>,
    pub sql_virtual_machine_instances: Vec<String>,
    pub load_balancer_resource_id: Option<String>,
    pub public_ip_address_resource_id: Option<String>,
    pub subnet_resource_id: Option<String>,
    pub vnet_name: Option<String>,
    pub sql_management_mode: Option<String>,
    pub sql_image_sku: Option<String>,
    pub sql_image_offer: Option<String>,
    pub least_privilege_mode: Option<String>,
    pub expand: Vec<String>,
    pub expand_query: Option<String>,
    pub enable_assessment: Option<bool>,
    pub enable_assessment_schedule: Option<bool>,
    pub assessment_weekly_interval: Option<u32>,
    pub assessment_monthly_occurrence: Option<i32>,
    pub assessment_day_of_week: Option<String>,
    pub assessment_start_time_local: Option<String>,
    pub enable_azure_ad_auth: Option<bool>,
    pub msi_client_id: Option<String>,
    pub skip_msi_validation: bool,
}

impl From<&Cli> for ArgumentNamespace {
    fn from(cli: &Cli) -> Self {
        Self {
            resource_group_name: cli.resource_group.clone(),
            sql_virtual_machine_name: cli.name.clone(),
            sql_virtual_machine_group_resource_id: cli.sql_vm_group.clone(),
            sql_virtual_machine_instances: cli.sql_vms.clone(),
            load_balancer_resource_id: cli.load_balancer.clone(),
            public_ip_address_resource_id: cli.public_ip_address.clone(),
            subnet_resource_id: cli.subnet.clone(),
            vnet_name: cli.vnet_name.clone(),
            sql_management_mode: cli.sql_mgmt_type.clone(),
            sql_image_sku: cli.image_sku.clone(),
            sql_image_offer: cli.image_offer.clone(),
            least_privilege_mode: cli.least_privilege_mode.clone(),
            expand: cli.expand.clone(),
            expand_query: None,
            enable_assessment: cli.enable_assessment,
            enable_assessment_schedule: cli.enable_assessment_schedule,
            assessment_weekly_interval: cli.assessment_weekly_interval,
            assessment_monthly_occurrence: cli.assessment_monthly_occurrence,
            assessment_day_of_week: cli.assessment_day_of_week.clone(),
            assessment_start_time_local: cli.assessment_start_time_local.clone(),
            enable_azure_ad_auth: cli.enable_azure_ad_auth,
            msi_client_id: cli.msi_client_id.clone(),
            skip_msi_validation: cli.skip_msi_validation,
        }
    }
}

/// If a bare group name was given, assume it lives in the command's resource
/// group and expand it to a full resource ID.
pub fn validate_sqlvm_group(ns: &mut ArgumentNamespace, subscription: &str) {
    if let Some(group) = &ns.sql_virtual_machine_group_resource_id {
        if !is_valid_resource_id(group) {
            ns.sql_virtual_machine_group_resource_id = Some(
                ResourceId::new(
                    subscription,
                    &ns.resource_group_name,
                    "Microsoft.SqlVirtualMachine",
                    "sqlVirtualMachineGroups",
                    group,
                )
                .to_string(),
            );
        }
    }
}

/// Expand every bare SQL VM name in the instance list, preserving order.
pub fn validate_sqlvm_list(ns: &mut ArgumentNamespace, subscription: &str) {
    for sqlvm in ns.sql_virtual_machine_instances.iter_mut() {
        if !is_valid_resource_id(sqlvm) {
            *sqlvm = ResourceId::new(
                subscription,
                &ns.resource_group_name,
                "Microsoft.SqlVirtualMachine",
                "sqlVirtualMachines",
                sqlvm,
            )
            .to_string();
        }
    }
}

pub fn validate_load_balancer(ns: &mut ArgumentNamespace, subscription: &str) {
    if let Some(lb) = &ns.load_balancer_resource_id {
        if !is_valid_resource_id(lb) {
            ns.load_balancer_resource_id = Some(
                ResourceId::new(
                    subscription,
                    &ns.resource_group_name,
                    "Microsoft.Network",
                    "loadBalancers",
                    lb,
                )
                .to_string(),
            );
        }
    }
}

pub fn validate_public_ip_address(ns: &mut ArgumentNamespace, subscription: &str) {
    if let Some(public_ip) = &ns.public_ip_address_resource_id {
        if !is_valid_resource_id(public_ip) {
            ns.public_ip_address_resource_id = Some(
                ResourceId::new(
                    subscription,
                    &ns.resource_group_name,
                    "Microsoft.Network",
                    "publicIPAddresses",
                    public_ip,
                )
                .to_string(),
            );
        }
    }
}

/// Exactly one of two shapes is accepted: `--subnet ID` alone, or
/// `--subnet NAME --vnet-name NAME` together (which synthesizes the child ID).
pub fn validate_subnet(ns: &mut ArgumentNamespace, subscription: &str) -> ValidationResult {
    if let Some(vnet) = &ns.vnet_name {
        if vnet.contains('/') {
            return Err(ValidationError::InvalidArgumentValue(SUBNET_USAGE.into()));
        }
    }

    let subnet = ns.subnet_resource_id.clone().unwrap_or_default();
    let subnet_is_id = is_valid_resource_id(&subnet);
    let has_vnet = ns.vnet_name.as_deref().is_some_and(|v| !v.is_empty());

    if (subnet_is_id && has_vnet) || (!subnet_is_id && !has_vnet) {
        return Err(ValidationError::MutuallyExclusiveArguments(
            SUBNET_USAGE.into(),
        ));
    }

    if !subnet_is_id {
        let vnet = ns.vnet_name.as_deref().unwrap_or_default();
        ns.subnet_resource_id = Some(
            ResourceId::new(
                subscription,
                &ns.resource_group_name,
                "Microsoft.Network",
                "virtualNetworks",
                vnet,
            )
            .with_child("subnets", &subnet)
            .to_string(),
        );
    }
    Ok(())
}

/// `NoAgent` management requires the image SKU and offer to be spelled out.
pub fn validate_sqlmanagement(ns: &ArgumentNamespace) -> ValidationResult {
    if ns.sql_management_mode.as_deref() == Some("NoAgent")
        && (ns.sql_image_sku.is_none() || ns.sql_image_offer.is_none())
    {
        return Err(ValidationError::RequiredArgumentMissing(
            "usage error: --sql-mgmt-type NoAgent --image-sku NAME --image-offer NAME".into(),
        ));
    }
    Ok(())
}

/// Least-privilege mode only works under full management.
pub fn validate_least_privilege_mode(ns: &ArgumentNamespace) -> ValidationResult {
    if ns.least_privilege_mode.as_deref() == Some("Enabled")
        && ns.sql_management_mode.as_deref() != Some("Full")
    {
        return Err(ValidationError::RequiredArgumentMissing(
            "usage error: --least-privilege-mode Enabled --sql-mgmt-type Full".into(),
        ));
    }
    Ok(())
}

/// `--expand` is accepted as repeated values; the service wants one
/// comma-separated string.
pub fn validate_expand(ns: &mut ArgumentNamespace) {
    if !ns.expand.is_empty() {
        ns.expand_query = Some(ns.expand.join(","));
    }
}

/// Cross-field rules for the assessment schedule group.
pub fn validate_assessment(ns: &ArgumentNamespace) -> ValidationResult {
    let schedule_provided = ns.assessment_weekly_interval.is_some()
        || ns.assessment_monthly_occurrence.is_some()
        || ns.assessment_day_of_week.is_some()
        || ns.assessment_start_time_local.is_some();

    if ns.enable_assessment_schedule == Some(false) && schedule_provided {
        return Err(ValidationError::InvalidArgumentValue(
            "Assessment schedule settings cannot be provided while enable-assessment-schedule is False".into(),
        ));
    }

    if ns.enable_assessment == Some(false) && schedule_provided {
        return Err(ValidationError::InvalidArgumentValue(
            "Assessment schedule settings cannot be provided while enable-assessment is False"
                .into(),
        ));
    }

    if schedule_provided {
        if ns.assessment_weekly_interval.is_some() && ns.assessment_monthly_occurrence.is_some() {
            return Err(ValidationError::MutuallyExclusiveArguments(
                "Both assessment-weekly-interval and assessment-montly-occurrence cannot be provided at the same time for Assessment schedule".into(),
            ));
        }
        if ns.assessment_weekly_interval.is_none() && ns.assessment_monthly_occurrence.is_none() {
            return Err(ValidationError::RequiredArgumentMissing(
                "Either assessment-weekly-interval or assessment-montly-occurrence must be provided for Assessment schedule".into(),
            ));
        }
        if ns.assessment_day_of_week.is_none() {
            return Err(ValidationError::RequiredArgumentMissing(
                "assessment-day-of-week must be provided for Assessment schedule".into(),
            ));
        }
        if ns.assessment_start_time_local.is_none() {
            return Err(ValidationError::RequiredArgumentMissing(
                "assessment-start-time-local must be provided for Assessment schedule".into(),
            ));
        }
    }
    Ok(())
}

/// The start time must be a 24-hour `HH:MM` literal.
pub fn validate_assessment_start_time_local(ns: &ArgumentNamespace) -> ValidationResult {
    if let Some(start_time) = &ns.assessment_start_time_local {
        if NaiveTime::parse_from_str(start_time, TIME_FORMAT).is_err() {
            return Err(ValidationError::InvalidArgumentValue(format!(
                "assessment-start-time-local input '{start_time}' is not valid time. Valid example: 19:30"
            )));
        }
    }
    Ok(())
}
