//! Category commands.

use std::path::PathBuf;

use shopping_admin::gateway::ImageSource;
use shopping_admin::state::AdminState;
use shopping_admin_core::CategoryRecord;

use super::{CommandResult, follow};

/// Create a category.
///
/// # Errors
///
/// Returns the backend's message if the insert fails.
pub async fn add(state: &AdminState, name: &str, image_url: &str) -> CommandResult {
    let message = follow(
        "add category",
        state
            .use_cases()
            .add_category(CategoryRecord::new(name, image_url)),
    )
    .await?;

    println!("{message}");
    Ok(())
}

/// Print every category, one per line.
///
/// # Errors
///
/// Returns the backend's message if the collection cannot be read.
pub async fn list(state: &AdminState) -> CommandResult {
    let categories = follow("list categories", state.use_cases().get_all_categories()).await?;

    if categories.is_empty() {
        println!("No categories");
        return Ok(());
    }

    for category in &categories {
        if category.image_url.is_empty() {
            println!("{}", category.name);
        } else {
            println!("{}\t{}", category.name, category.image_url);
        }
    }
    println!("{} categories", categories.len());

    Ok(())
}

/// Upload a category image and print its download URL.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the upload fails.
pub async fn image(state: &AdminState, path: Option<PathBuf>) -> CommandResult {
    let url = follow(
        "upload category image",
        state
            .use_cases()
            .add_category_image(path.map(ImageSource::File)),
    )
    .await?;

    println!("{url}");
    Ok(())
}
