//! Output formatting helpers.

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;

use questlog_core::Identity;

/// Print a success message.
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning.
pub fn warning(msg: &str) {
    eprintln!("{} {}", "!".yellow(), msg);
}

/// Print a labeled field.
pub fn field(label: &str, value: &str) {
    println!("{}: {}", label.dimmed(), value);
}

/// Print the fields of an identity.
pub fn identity(identity: &Identity) {
    field("User", &identity.display_name);
    field("ID", &identity.id);
    if !identity.roles.is_empty() {
        let roles: Vec<_> = identity.roles.iter().map(|r| r.as_str()).collect();
        field("Roles", &roles.join(", "));
    }
}

/// Print a value as pretty-printed JSON.
pub fn json_pretty<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}
