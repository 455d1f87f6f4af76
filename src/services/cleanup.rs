use std::sync::Arc;
use tracing::{error, info};

use crate::AppState;

/// Pending appointments are created when checkout starts; if the customer
/// never completes payment, the row would hold its slot forever. This task
/// cancels pending appointments that have outlived the checkout window.
pub struct CleanupService {
    state: Arc<AppState>,
}

/// How long a pending appointment holds its slot. The checkout session is
/// created with a matching `expires_at`, so payment cannot land after the
/// sweep releases the slot.
pub const CHECKOUT_WINDOW_MINUTES: i32 = 30;

impl CleanupService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    pub async fn run(&self) {
        let released: Vec<uuid::Uuid> = match sqlx::query_scalar(
            "UPDATE appointments
             SET status = 'cancelled'
             WHERE status = 'pending'
               AND created_at < NOW() - make_interval(mins => $1)
             RETURNING id",
        )
        .bind(CHECKOUT_WINDOW_MINUTES)
        .fetch_all(&self.state.db.pool)
        .await
        {
            Ok(ids) => ids,
            Err(e) => {
                error!("stale appointment cleanup failed: {:?}", e);
                return;
            }
        };

        if !released.is_empty() {
            info!(
                "cancelled {} stale pending appointments, slots released",
                released.len()
            );
        }
    }
}
