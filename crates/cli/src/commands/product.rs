//! Product commands.

use std::path::PathBuf;

use clap::Args;
use shopping_admin::gateway::ImageSource;
use shopping_admin::state::AdminState;
use shopping_admin_core::ProductRecord;

use super::{CommandResult, follow, notify};

#[derive(Debug, Args)]
pub struct ProductArgs {
    /// Product name
    #[arg(short, long)]
    pub name: String,

    /// List price
    #[arg(long)]
    pub price: String,

    /// Price after discounts
    #[arg(long)]
    pub final_price: String,

    /// Product description
    #[arg(short, long)]
    pub description: String,

    /// Download URL of the product image
    #[arg(short, long, default_value = "")]
    pub image_url: String,

    /// Name of the product's category
    #[arg(short, long)]
    pub category: String,

    /// Units in stock
    #[arg(short, long, default_value_t = 0)]
    pub units: i32,

    /// Notify every registered device once the product is added
    #[arg(long)]
    pub notify: bool,
}

impl ProductArgs {
    fn into_record(self) -> ProductRecord {
        ProductRecord {
            name: self.name,
            price: self.price,
            final_price: self.final_price,
            description: self.description,
            image_url: self.image_url,
            category: self.category,
            available_units: self.units,
            ..Default::default()
        }
    }
}

/// Create a product, optionally notifying every device afterwards.
///
/// # Errors
///
/// Returns an error if a required detail is blank or the insert fails.
pub async fn add(state: &AdminState, args: ProductArgs) -> CommandResult {
    let notify_after = args.notify;
    let product = args.into_record();

    if product.has_missing_details() {
        return Err("Please enter all the details".into());
    }

    let name = product.name.clone();
    let image_url = product.image_url.clone();

    let message = follow("add product", state.use_cases().add_product(product)).await?;
    println!("{message}");

    if notify_after {
        notify::run(state, &name, &image_url).await?;
    }

    Ok(())
}

/// Upload a product image and print its download URL.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the upload fails.
pub async fn image(state: &AdminState, path: Option<PathBuf>) -> CommandResult {
    let url = follow(
        "upload product image",
        state
            .use_cases()
            .add_product_image(path.map(ImageSource::File)),
    )
    .await?;

    println!("{url}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> ProductArgs {
        ProductArgs {
            name: "Pen".to_string(),
            price: "10".to_string(),
            final_price: "8".to_string(),
            description: "Blue ink".to_string(),
            image_url: String::new(),
            category: "Stationery".to_string(),
            units: 5,
            notify: false,
        }
    }

    #[test]
    fn test_into_record() {
        let record = args().into_record();

        assert_eq!(record.name, "Pen");
        assert_eq!(record.final_price, "8");
        assert_eq!(record.available_units, 5);
        assert!(record.created_at_epoch_millis > 0);
        assert!(!record.has_missing_details());
    }

    #[test]
    fn test_blank_description_is_missing_detail() {
        let record = ProductArgs {
            description: "  ".to_string(),
            ..args()
        }
        .into_record();

        assert!(record.has_missing_details());
    }
}
