//! Text rendering for command results

use cf_dynamic_core::engine::{RecordOutcome, RecordReport};
use cf_dynamic_core::{DomainRegistration, IpVersion};
use prettytable::{Row, Table, format, row};

/// Empty `list` table, borderless with a line under the titles:
///
/// ```text
///  Domain           | IPv4    | IPv6
/// ------------------+---------+----------
///  home.example.com | Default | Disabled
/// ```
pub fn domain_table(show_ids: bool) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
    table.set_titles(if show_ids {
        row!["Domain", "IPv4", "ID4", "IPv6", "ID6"]
    } else {
        row!["Domain", "IPv4", "IPv6"]
    });
    table
}

/// `Domain | IPv4 | IPv6` cells of one registration
pub fn domain_row(registration: &DomainRegistration) -> Row {
    row![
        registration.domain,
        registration.describe(IpVersion::V4),
        registration.describe(IpVersion::V6)
    ]
}

/// The line printed by `update` for one record, if any
pub fn outcome_line(report: &RecordReport) -> Option<String> {
    let name = &report.record_name;
    match &report.outcome {
        RecordOutcome::Updated { previous, new_ip } => {
            Some(format!("{}: {} -> {}", name, previous, new_ip))
        }
        RecordOutcome::WouldUpdate { previous, new_ip } => {
            Some(format!("{}: {} -> {} (dry run)", name, previous, new_ip))
        }
        RecordOutcome::Unchanged { .. } => None,
        RecordOutcome::Missing { desired_ip } => Some(format!(
            "{}: No DNS Record Found (Update IP: {})",
            name, desired_ip
        )),
        RecordOutcome::Failed {
            desired_ip: Some(ip),
            ..
        } => Some(format!(
            "{}: Failed to update DNS Record (Update IP: {})",
            name, ip
        )),
        RecordOutcome::Failed {
            desired_ip: None,
            error,
        } => Some(format!("{}: Failed to update DNS Record ({})", name, error)),
    }
}
