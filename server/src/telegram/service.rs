use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::commands::Command;
use super::types::{Message, PhotoSize, Update};
use super::{TelegramApi, TelegramError};
use crate::config::Config;
use crate::database::{BindingRepository, TelegramBinding, DEFAULT_MENU_TITLE};
use crate::menu::MenuService;
use crate::tenant::TenantService;

const LINK_FIRST: &str = "Please link this chat with /link <TENANT_CODE> first.";
const LINK_USAGE: &str = "Usage: /link <TENANT_CODE>";
const INVALID_CODE: &str = "Invalid tenant code.";
const ALREADY_LINKED: &str = "Already linked to this tenant.";
const LINKED_ELSEWHERE: &str = "This chat is already linked to another tenant.";
const MENU_USAGE: &str = "Send /menu <text> or just send a menu text message to update today.";
const MENU_UPDATED: &str = "📋 Menu updated ✅";
const NO_MENU: &str = "No menu published yet.";
const UNKNOWN_COMMAND: &str = "Unknown command.";
const IMAGE_TOO_LARGE: &str = "Image too large.";
const TENANT_NOT_FOUND: &str = "Tenant not found.";
const IMAGE_RECEIVED: &str = "🖼 Image received and will be displayed ✅";

const POLL_TIMEOUT_SECS: u64 = 10;
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

pub struct TelegramService {
    api: Arc<dyn TelegramApi>,
    tenants: TenantService,
    menus: MenuService,
    bindings: Arc<dyn BindingRepository>,
    allowed_updates: Vec<String>,
    max_image_bytes: usize,
    uploads_dir: PathBuf,
}

impl TelegramService {
    pub fn new(
        api: Arc<dyn TelegramApi>,
        tenants: TenantService,
        menus: MenuService,
        bindings: Arc<dyn BindingRepository>,
        config: &Config,
    ) -> Self {
        Self {
            api,
            tenants,
            menus,
            bindings,
            allowed_updates: config.telegram_allowed_update_types.clone(),
            max_image_bytes: config.telegram_max_image_bytes(),
            uploads_dir: config.telegram_uploads_dir.clone(),
        }
    }

    fn allows(&self, update_type: &str) -> bool {
        self.allowed_updates.iter().any(|t| t == update_type)
    }

    /// Routes one update. With `background_photos` set, photo downloads run
    /// on a spawned task so the caller can acknowledge right away.
    pub async fn handle_update(
        self: &Arc<Self>,
        update: Update,
        background_photos: bool,
    ) -> Result<(), TelegramError> {
        if update.message.is_some() && !self.allows("message") {
            return Ok(());
        }
        if update.edited_message.is_some() && !self.allows("edited_message") {
            return Ok(());
        }
        let Some(message) = update.message.or(update.edited_message) else {
            return Ok(());
        };

        let chat_id = message.chat.id;
        let binding = self.bindings.get_by_chat_id(chat_id).await?;
        let text = message
            .text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty());

        if let Some(text) = text {
            if let Command::Link(code) = Command::parse(text) {
                return self.handle_link(&message, code, binding.as_ref()).await;
            }
        }

        let binding = match binding {
            Some(binding) if binding.is_active => binding,
            _ => return self.reply(chat_id, LINK_FIRST).await,
        };

        if let Some(text) = text {
            return self.handle_text(chat_id, text, &binding).await;
        }

        if message.photo.as_ref().is_some_and(|p| !p.is_empty()) {
            if background_photos {
                let this = Arc::clone(self);
                tokio::spawn(async move {
                    if let Err(e) = this.handle_photo(&message, &binding).await {
                        tracing::error!(chat_id, error = %e, "failed to process photo");
                    }
                });
            } else {
                self.handle_photo(&message, &binding).await?;
            }
        }
        Ok(())
    }

    async fn reply(&self, chat_id: i64, text: &str) -> Result<(), TelegramError> {
        self.api.send_message(chat_id, text).await
    }

    async fn handle_link(
        &self,
        message: &Message,
        code: Option<String>,
        binding: Option<&TelegramBinding>,
    ) -> Result<(), TelegramError> {
        let chat_id = message.chat.id;
        let Some(code) = code else {
            return self.reply(chat_id, LINK_USAGE).await;
        };
        let Some((tenant, _)) = self.tenants.get_tenant_and_config(&code).await? else {
            return self.reply(chat_id, INVALID_CODE).await;
        };

        match binding {
            Some(b) if b.tenant_id == tenant.id => self.reply(chat_id, ALREADY_LINKED).await,
            Some(_) => self.reply(chat_id, LINKED_ELSEWHERE).await,
            None => {
                let username = message.sender.as_ref().and_then(|u| u.username.as_deref());
                self.bindings.upsert_binding(&tenant.id, chat_id, username).await?;
                tracing::info!(chat_id, tenant_id = %tenant.id, "chat linked");
                self.reply(
                    chat_id,
                    &format!("✅ Linked to tenant: {}. You can now update the menu.", tenant.name),
                )
                .await
            }
        }
    }

    async fn handle_text(
        &self,
        chat_id: i64,
        text: &str,
        binding: &TelegramBinding,
    ) -> Result<(), TelegramError> {
        let tenant_id = binding.tenant_id.as_str();
        let config = self.tenants.get_config_for_tenant(tenant_id).await?;
        let timezone = config.as_ref().and_then(|c| c.timezone.as_deref());

        match Command::parse(text) {
            Command::Menu("") => self.reply(chat_id, MENU_USAGE).await,
            Command::Menu(body) | Command::Text(body) => {
                self.menus
                    .update_menu_text(tenant_id, body, DEFAULT_MENU_TITLE, timezone)
                    .await?;
                self.reply(chat_id, MENU_UPDATED).await
            }
            Command::Publish => {
                self.menus.publish_today(tenant_id, timezone).await?;
                self.reply(chat_id, MENU_UPDATED).await
            }
            Command::Status => match self.menus.get_status(tenant_id, timezone).await? {
                Some(menu) => {
                    let status = format!(
                        "Current menu: {}. Last update: {}",
                        menu.title,
                        menu.updated_at.to_rfc3339()
                    );
                    self.reply(chat_id, &status).await
                }
                None => self.reply(chat_id, NO_MENU).await,
            },
            Command::Link(_) | Command::Unknown => self.reply(chat_id, UNKNOWN_COMMAND).await,
        }
    }

    async fn handle_photo(
        &self,
        message: &Message,
        binding: &TelegramBinding,
    ) -> Result<(), TelegramError> {
        let chat_id = message.chat.id;
        let Some(best) = message.photo.as_deref().and_then(largest_photo) else {
            return Ok(());
        };

        let file_path = self.api.get_file(&best.file_id).await?;
        let data = self.api.download_file(&file_path).await?;
        if data.len() > self.max_image_bytes {
            return self.reply(chat_id, IMAGE_TOO_LARGE).await;
        }

        let Some(tenant) = self.tenants.get_tenant_by_id(&binding.tenant_id).await? else {
            return self.reply(chat_id, TENANT_NOT_FOUND).await;
        };

        let dir = self.uploads_dir.join(&tenant.short_code);
        tokio::fs::create_dir_all(&dir).await?;
        let unique_id = best.file_unique_id.as_deref().unwrap_or(best.file_id.as_str());
        let filename = format!("{}_{}.jpg", message.message_id, unique_id);
        tokio::fs::write(dir.join(&filename), &data).await?;

        let url = format!("/uploads/{}/{}", tenant.short_code, filename);
        self.menus
            .update_featured_image(&tenant.id, &url, message.caption.as_deref())
            .await?;
        tracing::info!(tenant_id = %tenant.id, %url, bytes = data.len(), "featured image updated");
        self.reply(chat_id, IMAGE_RECEIVED).await
    }

    /// Long-polls `getUpdates` until `shutdown` fires. Transport errors back
    /// off exponentially and retry.
    pub async fn poll_updates(self: Arc<Self>, shutdown: CancellationToken) {
        let mut offset = 0i64;
        let mut backoff = INITIAL_BACKOFF;
        tracing::info!("telegram polling started");

        loop {
            let batch = tokio::select! {
                _ = shutdown.cancelled() => break,
                batch = self.api.get_updates(offset, POLL_TIMEOUT_SECS, &self.allowed_updates) => batch,
            };

            match batch {
                Ok(updates) => {
                    backoff = INITIAL_BACKOFF;
                    for raw in updates {
                        if let Some(next) = self.process_raw_update(raw).await {
                            offset = next;
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, retry_in = ?backoff, "getUpdates failed");
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(backoff) => {}
                    }
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
            }
        }

        tracing::info!("telegram polling stopped");
    }

    /// Handles one raw update and returns the next offset to request.
    async fn process_raw_update(self: &Arc<Self>, raw: Value) -> Option<i64> {
        let next = raw.get("update_id").and_then(Value::as_i64).map(|id| id + 1);
        match serde_json::from_value::<Update>(raw) {
            Ok(update) => {
                if let Err(e) = self.handle_update(update, false).await {
                    tracing::error!(error = %e, "failed to handle update");
                }
            }
            Err(e) => tracing::warn!(error = %e, "skipping malformed update"),
        }
        next
    }
}

fn largest_photo(photos: &[PhotoSize]) -> Option<&PhotoSize> {
    photos.iter().max_by_key(|p| p.file_size.unwrap_or(0))
}
