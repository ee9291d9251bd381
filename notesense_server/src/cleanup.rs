//! Periodic purge of blacklisted tokens that have expired on their own.

use std::time::Duration;

use chrono::Utc;
use diesel::{ExpressionMethods, QueryDsl};
use diesel_async::RunQueryDsl;

use crate::{schema, utils};

/// Delete blacklist rows whose token can no longer be used anyway.
pub async fn delete_expired_tokens(
    conn: &mut utils::Conn<'_>,
) -> Result<usize, diesel::result::Error> {
    diesel::delete(
        schema::token_blacklist::table.filter(schema::token_blacklist::expires_at.lt(Utc::now())),
    )
    .execute(conn)
    .await
}

/// Run [`delete_expired_tokens`] every `interval` for as long as the server runs.
pub async fn purge_expired_tokens(pool: utils::Pool, interval: Duration) {
    tracing::info!(
        interval_secs = interval.as_secs(),
        "token blacklist cleanup started"
    );
    let mut interval = tokio::time::interval(interval);
    loop {
        interval.tick().await;
        let mut conn = match pool.get().await {
            Ok(conn) => conn,
            Err(err) => {
                tracing::error!(error = %err, "token blacklist cleanup couldn't get a connection");
                continue;
            }
        };
        match delete_expired_tokens(&mut conn).await {
            Ok(0) => tracing::debug!("no expired tokens to purge"),
            Ok(deleted) => tracing::info!(deleted, "purged expired tokens"),
            Err(err) => tracing::error!(error = %err, "token blacklist cleanup failed"),
        }
    }
}
