//! FCM HTTP v1 message payloads.

use serde::Serialize;

/// Notification title for new-product announcements.
pub const NEW_PRODUCT_TITLE: &str = "New product added";

/// Request body for `projects.messages.send`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendRequest {
    pub message: Message,
}

/// A message addressed to a single device token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub token: String,
    pub notification: Notification,
}

/// Display notification shown by the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub image: String,
}

impl SendRequest {
    /// Announce a new product to one device.
    #[must_use]
    pub fn new_product(token: &str, product_name: &str, image_url: &str) -> Self {
        Self {
            message: Message {
                token: token.to_string(),
                notification: Notification {
                    title: NEW_PRODUCT_TITLE.to_string(),
                    body: format!("Check out new product: {product_name}"),
                    image: image_url.to_string(),
                },
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_new_product_payload_shape() {
        let request = SendRequest::new_product("device-1", "Pen", "https://img/pen.png");

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "message": {
                    "token": "device-1",
                    "notification": {
                        "title": "New product added",
                        "body": "Check out new product: Pen",
                        "image": "https://img/pen.png"
                    }
                }
            })
        );
    }

    #[test]
    fn test_empty_image_is_kept() {
        let request = SendRequest::new_product("t", "Mug", "");
        assert_eq!(request.message.notification.image, "");
    }
}
