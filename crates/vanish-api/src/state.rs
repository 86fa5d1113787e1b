use std::sync::Arc;

use vanish_db::Database;
use vanish_gateway::ChannelRegistry;
use vanish_vault::Vault;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub vault: Arc<Vault>,
    pub registry: ChannelRegistry,
    pub jwt_secret: String,
}
