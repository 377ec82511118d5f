use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing when the channel is closed
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("{}", e);
        }
    }
}

// Events emitted by the wishlist flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    WishlistCreated(Uuid),
    WishlistLineUpdated {
        wishlist_token: Uuid,
        variant_id: Uuid,
        quantity: i32,
    },
    WishlistCleared(Uuid),
    WishlistAssigned {
        wishlist_token: Uuid,
        user_id: Uuid,
    },
    VoucherApplied {
        wishlist_token: Uuid,
        code: String,
        discount: Decimal,
    },
    VoucherRemoved(Uuid),
    GiftCardApplied {
        wishlist_token: Uuid,
        gift_card_id: Uuid,
    },
    OrderCreated(Uuid),
    OrderConfirmationRequested {
        order_id: Uuid,
        email: Option<String>,
    },
}

// Function to process incoming events and distribute them to handlers.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        info!("Received event: {:?}", event);

        match event {
            Event::OrderCreated(order_id) => {
                if let Err(e) = handle_order_created(order_id).await {
                    error!(
                        "Failed to handle order created event: order_id={}, error={}",
                        order_id, e
                    );
                }
            }
            Event::OrderConfirmationRequested { order_id, email } => {
                if let Err(e) = handle_order_confirmation(order_id, email.as_deref()).await {
                    error!(
                        "Failed to send order confirmation: order_id={}, error={}",
                        order_id, e
                    );
                }
            }
            Event::WishlistAssigned {
                wishlist_token,
                user_id,
            } => {
                info!("Wishlist {} assigned to user {}", wishlist_token, user_id);
            }
            Event::VoucherApplied {
                wishlist_token,
                code,
                discount,
            } => {
                info!(
                    "Voucher {} applied to wishlist {} (discount {})",
                    code, wishlist_token, discount
                );
            }
            _ => {
                info!("No specific handler for event: {:?}", event);
            }
        }
    }

    warn!("Event processing loop has ended");
}

async fn handle_order_created(order_id: Uuid) -> Result<(), String> {
    info!("Processing order created event for order {}", order_id);
    Ok(())
}

async fn handle_order_confirmation(order_id: Uuid, email: Option<&str>) -> Result<(), String> {
    let recipient = email.ok_or_else(|| format!("order {} has no customer e-mail", order_id))?;
    info!(
        "Queued order confirmation e-mail for order {} to {}",
        order_id, recipient
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_delivers_to_receiver() {
        let (tx, mut rx) = mpsc::channel(4);
        let sender = EventSender::new(tx);
        let token = Uuid::new_v4();

        sender.send(Event::WishlistCleared(token)).await.unwrap();

        match rx.recv().await {
            Some(Event::WishlistCleared(received)) => assert_eq!(received, token),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn send_fails_when_receiver_dropped() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);

        assert!(sender.send(Event::WishlistCreated(Uuid::new_v4())).await.is_err());
        // does not panic
        sender.send_or_log(Event::WishlistCreated(Uuid::new_v4())).await;
    }

    #[tokio::test]
    async fn confirmation_without_email_is_an_error() {
        assert!(handle_order_confirmation(Uuid::new_v4(), None).await.is_err());
        assert!(handle_order_confirmation(Uuid::new_v4(), Some("a@example.com"))
            .await
            .is_ok());
    }
}
