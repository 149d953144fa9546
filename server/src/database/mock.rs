use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    BindingRepository, DailyMenu, DatabaseError, MenuImage, MenuRepository, MenuUpsert,
    TelegramBinding, Tenant, TenantConfig, TenantRepository, DEFAULT_MENU_TITLE,
};

// In-memory store for tests
#[derive(Default)]
pub struct MockDatabase {
    tenants: Arc<RwLock<HashMap<String, Tenant>>>,
    configs: Arc<RwLock<HashMap<String, TenantConfig>>>,
    menus: Arc<RwLock<HashMap<(String, String), DailyMenu>>>,
    images: Arc<RwLock<Vec<MenuImage>>>,
    bindings: Arc<RwLock<HashMap<i64, TelegramBinding>>>,
    forced_collisions: AtomicUsize,
}

impl MockDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `n` calls to `create_tenant` fail as short code collisions.
    pub fn fail_next_creates(&self, n: usize) {
        self.forced_collisions.store(n, Ordering::SeqCst);
    }

    pub async fn insert_tenant(&self, tenant: Tenant) {
        self.tenants.write().await.insert(tenant.id.clone(), tenant);
    }

    pub async fn images(&self) -> Vec<MenuImage> {
        self.images.read().await.clone()
    }
}

#[async_trait]
impl TenantRepository for MockDatabase {
    async fn get_by_code(&self, code: &str) -> Result<Option<Tenant>, DatabaseError> {
        Ok(self
            .tenants
            .read()
            .await
            .values()
            .find(|t| t.short_code == code)
            .cloned())
    }

    async fn get_by_id(&self, tenant_id: &str) -> Result<Option<Tenant>, DatabaseError> {
        Ok(self.tenants.read().await.get(tenant_id).cloned())
    }

    async fn create_tenant(&self, name: &str, code: &str) -> Result<Tenant, DatabaseError> {
        let forced = self
            .forced_collisions
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        let mut tenants = self.tenants.write().await;
        if forced || tenants.values().any(|t| t.short_code == code) {
            return Err(DatabaseError::DuplicateShortCode(code.to_string()));
        }

        let now = Utc::now();
        let tenant = Tenant {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            short_code: code.to_string(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        tenants.insert(tenant.id.clone(), tenant.clone());
        Ok(tenant)
    }

    async fn get_config(&self, tenant_id: &str) -> Result<Option<TenantConfig>, DatabaseError> {
        Ok(self.configs.read().await.get(tenant_id).cloned())
    }

    async fn save_config(&self, config: &TenantConfig) -> Result<TenantConfig, DatabaseError> {
        self.configs
            .write()
            .await
            .insert(config.tenant_id.clone(), config.clone());
        Ok(config.clone())
    }
}

#[async_trait]
impl MenuRepository for MockDatabase {
    async fn get_menu_for_date(
        &self,
        tenant_id: &str,
        date: &str,
    ) -> Result<Option<DailyMenu>, DatabaseError> {
        Ok(self
            .menus
            .read()
            .await
            .get(&(tenant_id.to_string(), date.to_string()))
            .cloned())
    }

    async fn upsert_menu(
        &self,
        tenant_id: &str,
        date: &str,
        menu: MenuUpsert,
    ) -> Result<DailyMenu, DatabaseError> {
        let now = Utc::now();
        let mut menus = self.menus.write().await;
        let entry = menus
            .entry((tenant_id.to_string(), date.to_string()))
            .or_insert_with(|| DailyMenu {
                id: Uuid::new_v4().to_string(),
                tenant_id: tenant_id.to_string(),
                valid_for_date: date.to_string(),
                title: DEFAULT_MENU_TITLE.to_string(),
                sections: None,
                text_raw: None,
                published_at: None,
                updated_at: now,
            });
        entry.title = menu.title;
        entry.text_raw = Some(menu.text_raw);
        entry.sections = menu.sections;
        entry.updated_at = now;
        Ok(entry.clone())
    }

    async fn publish_menu(&self, tenant_id: &str, date: &str) -> Result<DailyMenu, DatabaseError> {
        let now = Utc::now();
        let mut menus = self.menus.write().await;
        let entry = menus
            .entry((tenant_id.to_string(), date.to_string()))
            .or_insert_with(|| DailyMenu {
                id: Uuid::new_v4().to_string(),
                tenant_id: tenant_id.to_string(),
                valid_for_date: date.to_string(),
                title: DEFAULT_MENU_TITLE.to_string(),
                sections: None,
                text_raw: None,
                published_at: None,
                updated_at: now,
            });
        entry.published_at = Some(now);
        entry.updated_at = now;
        Ok(entry.clone())
    }

    async fn get_active_image(&self, tenant_id: &str) -> Result<Option<MenuImage>, DatabaseError> {
        Ok(self
            .images
            .read()
            .await
            .iter()
            .filter(|i| i.tenant_id == tenant_id && i.is_active)
            .max_by_key(|i| i.created_at)
            .cloned())
    }

    async fn upsert_image(
        &self,
        tenant_id: &str,
        url: &str,
        caption: Option<&str>,
    ) -> Result<MenuImage, DatabaseError> {
        let mut images = self.images.write().await;
        for image in images.iter_mut().filter(|i| i.tenant_id == tenant_id) {
            image.is_active = false;
        }
        let image = MenuImage {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            url: url.to_string(),
            caption: caption.map(str::to_string),
            is_active: true,
            created_at: Utc::now(),
        };
        images.push(image.clone());
        Ok(image)
    }
}

#[async_trait]
impl BindingRepository for MockDatabase {
    async fn get_by_chat_id(&self, chat_id: i64) -> Result<Option<TelegramBinding>, DatabaseError> {
        Ok(self.bindings.read().await.get(&chat_id).cloned())
    }

    async fn upsert_binding(
        &self,
        tenant_id: &str,
        chat_id: i64,
        username: Option<&str>,
    ) -> Result<TelegramBinding, DatabaseError> {
        let mut bindings = self.bindings.write().await;
        let id = bindings
            .get(&chat_id)
            .map(|b| b.id.clone())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let binding = TelegramBinding {
            id,
            tenant_id: tenant_id.to_string(),
            telegram_chat_id: chat_id,
            linked_at: Utc::now(),
            linked_by_username: username.map(str::to_string),
            is_active: true,
        };
        bindings.insert(chat_id, binding.clone());
        Ok(binding)
    }
}
