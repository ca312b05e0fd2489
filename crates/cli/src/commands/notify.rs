//! Notification command.

use shopping_admin::notifications::{DeliveryStatus, token_hint};
use shopping_admin::state::AdminState;

use super::CommandResult;

/// Notify every registered device about `product_name` and print the outcome.
///
/// Individual delivery failures are printed but do not fail the command.
///
/// # Errors
///
/// Returns an error if the recipient list cannot be loaded.
pub async fn run(state: &AdminState, product_name: &str, image_url: &str) -> CommandResult {
    println!("notify: working...");
    let report = state
        .dispatcher()
        .notify_all_recipients(product_name, image_url)
        .await?;

    if report.is_empty() {
        println!("notify: no registered devices");
        return Ok(());
    }

    for outcome in &report.outcomes {
        if let DeliveryStatus::Failed { error } = &outcome.status {
            println!("  {}...: {error}", token_hint(&outcome.recipient));
        }
    }
    println!(
        "notify: {} delivered, {} failed",
        report.delivered(),
        report.failed()
    );

    Ok(())
}
