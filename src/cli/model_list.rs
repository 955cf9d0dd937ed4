//! Plain-text output for the management subcommands.

use clap::Command;

use crate::manage::parameters::SETTING_KEYS;
use crate::manage::{HostListing, HostParameters, OperationReport};

pub fn format_listings(listings: &[HostListing]) -> String {
    let mut out = String::new();
    for listing in listings {
        out.push_str(&format!("{}:\n", listing.host));
        match &listing.models {
            Ok(models) if models.is_empty() => out.push_str("  (no models installed)\n"),
            Ok(models) => {
                for model in models {
                    let marker = if model.loaded { " (currently loaded)" } else { "" };
                    out.push_str(&format!("  >>> {}{marker}\n", model.name));
                }
            }
            Err(err) => out.push_str(&format!("  Error: {err}\n")),
        }
        out.push('\n');
    }
    out
}

pub fn print_listings(listings: &[HostListing]) {
    print!("{}", format_listings(listings));
}

pub fn format_parameters(hosts: &[HostParameters]) -> String {
    let mut out = String::new();
    for host in hosts {
        out.push_str(&format!("{}:\n", host.host));
        match &host.models {
            Ok(models) => {
                for model in models {
                    out.push_str(&format!("  >>> {}\n", model.model));
                    match &model.settings {
                        Ok(settings) => {
                            for key in SETTING_KEYS {
                                out.push_str(&format!("      {key}: {}\n", settings.get(key)));
                            }
                        }
                        Err(err) => out.push_str(&format!("      Error: {err}\n")),
                    }
                }
            }
            Err(err) => out.push_str(&format!("  Error: {err}\n")),
        }
        out.push('\n');
    }
    out
}

pub fn print_parameters(hosts: &[HostParameters]) {
    print!("{}", format_parameters(hosts));
}

pub fn print_reports(operation: &str, reports: &[OperationReport]) {
    for report in reports {
        println!("  -> {}", report.describe());
    }
    println!("All model {operation} commands have finished.");
}

/// Every subcommand path with its description, one per line.
pub fn format_command_tree(command: &Command) -> String {
    fn walk(command: &Command, prefix: &str, out: &mut String) {
        for sub in command.get_subcommands() {
            if sub.get_name() == "help" {
                continue;
            }
            let path = format!("{prefix} {}", sub.get_name());
            let about = sub.get_about().map(|a| a.to_string()).unwrap_or_default();
            if sub.has_subcommands() {
                if !about.is_empty() {
                    out.push_str(&format!("{path:<28} {about}\n"));
                }
                walk(sub, &path, out);
            } else {
                out.push_str(format!("{path:<28} {about}").trim_end());
                out.push('\n');
            }
        }
    }

    let mut out = String::new();
    walk(command, command.get_name(), &mut out);
    out
}

pub fn print_command_tree(command: &Command) {
    print!("{}", format_command_tree(command));
}
