use serde_json::{json, Map, Value};

use crate::cli::OutputFormat;
use crate::database::Account;

/// Output a success message in the appropriate format
pub fn output_success(output_format: OutputFormat, message: &str, data: Option<Value>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = Map::new();
            response.insert("success".to_string(), json!(true));
            response.insert("message".to_string(), json!(message));
            if let Some(Value::Object(extra)) = data {
                response.extend(extra);
            }
            println!("{}", serde_json::to_string_pretty(&Value::Object(response))?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}

/// Fixed-width table of accounts for text output
pub fn print_account_table(accounts: &[Account]) {
    println!("{:<36} {:<20} {:<28} {:<10} {}", "ID", "NAME", "EMAIL", "ROLE", "STATUS");
    println!("{}", "-".repeat(104));
    for account in accounts {
        println!(
            "{:<36} {:<20} {:<28} {:<10} {}",
            account.id,
            truncate(&account.name, 20),
            truncate(&account.email, 28),
            account.role,
            account.status
        );
    }
}

fn truncate(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        value.to_string()
    } else {
        let kept: String = value.chars().take(width.saturating_sub(1)).collect();
        format!("{}…", kept)
    }
}
