//! Permission database: per-user allowed transports and unix user aliases.

use dashmap::DashMap;
use tracing::{debug, info};

use meshbus_core::config::permission::PermissionConfig;
use meshbus_core::error::AppError;
use meshbus_core::types::{TransportMask, UserId};

/// Per-user transport permissions.
#[derive(Debug)]
pub struct PermissionDb {
    /// Mask granted to users without an explicit entry.
    default_mask: TransportMask,
    /// User id → allowed transports.
    allowed: DashMap<UserId, TransportMask>,
    /// User id → user id whose permissions it assumes.
    aliases: DashMap<UserId, UserId>,
    /// Endpoint name → resolved mask.
    cache: DashMap<String, TransportMask>,
}

impl PermissionDb {
    /// Creates a database where every user may use every transport.
    pub fn new() -> Self {
        Self {
            default_mask: TransportMask::ANY,
            allowed: DashMap::new(),
            aliases: DashMap::new(),
            cache: DashMap::new(),
        }
    }

    /// Seeds the database from configuration.
    pub fn from_config(config: &PermissionConfig) -> Self {
        let mut db = Self::new();
        if !config.ip_allowed_by_default {
            db.default_mask = TransportMask::ANY.without(TransportMask::IP);
        }
        for uid in &config.ip_denied_users {
            db.allowed
                .insert(UserId(*uid), TransportMask::ANY.without(TransportMask::IP));
        }
        for uid in &config.all_denied_users {
            db.allowed.insert(UserId(*uid), TransportMask::NONE);
        }
        for (orig, alias) in &config.user_aliases {
            match orig.parse::<u32>() {
                Ok(orig) => {
                    db.aliases.insert(UserId(orig), UserId(*alias));
                }
                Err(_) => {
                    tracing::warn!(key = %orig, "Ignoring non-numeric user alias key");
                }
            }
        }
        info!(
            entries = db.allowed.len(),
            aliases = db.aliases.len(),
            "Permission database loaded"
        );
        db
    }

    /// Sets the transports a user may use.
    pub fn set_allowed(&self, user_id: UserId, mask: TransportMask) {
        self.allowed.insert(user_id, mask);
        self.cache.clear();
    }

    /// Returns the transports a user may use, following aliases.
    pub fn allowed_transports(&self, user_id: UserId) -> TransportMask {
        let effective = self.resolve_alias(user_id);
        self.allowed
            .get(&effective)
            .map(|entry| *entry.value())
            .unwrap_or(self.default_mask)
    }

    /// Whether a user may use IP transports.
    pub fn is_ip_allowed(&self, user_id: UserId) -> bool {
        self.allowed_transports(user_id)
            .intersects(TransportMask::IP)
    }

    /// Returns the cached mask for an endpoint, resolving it on first use.
    pub fn allowed_for_endpoint(&self, endpoint: &str, user_id: UserId) -> TransportMask {
        *self
            .cache
            .entry(endpoint.to_string())
            .or_insert_with(|| self.allowed_transports(user_id))
    }

    /// Treats `orig` as `alias` for permission decisions.
    pub fn add_alias_unix_user(&self, orig: UserId, alias: UserId) -> Result<(), AppError> {
        if !orig.is_valid() || !alias.is_valid() {
            return Err(AppError::invalid_argument(format!(
                "Invalid user id in alias: orig={orig} alias={alias}"
            )));
        }
        self.aliases.insert(orig, alias);
        self.cache.clear();
        debug!(orig = %orig, alias = %alias, "Unix user alias added");
        Ok(())
    }

    /// Drops the cached decision for a disconnected endpoint.
    pub fn clean_permission_cache(&self, endpoint: &str) {
        self.cache.remove(endpoint);
    }

    fn resolve_alias(&self, user_id: UserId) -> UserId {
        self.aliases
            .get(&user_id)
            .map(|entry| *entry.value())
            .unwrap_or(user_id)
    }
}

impl Default for PermissionDb {
    fn default() -> Self {
        Self::new()
    }
}
