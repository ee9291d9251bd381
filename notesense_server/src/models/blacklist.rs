use chrono::{DateTime, Utc};
use diesel::Insertable;
use uuid::Uuid;

#[derive(Insertable)]
#[diesel(table_name = crate::schema::token_blacklist)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewBlacklistedToken {
    pub user_id: Uuid,
    /// The token's `jti` claim.
    pub token_id: String,
    /// Same as the token's own expiry so the row can be purged afterwards.
    pub expires_at: DateTime<Utc>,
}
