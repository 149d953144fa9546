use std::sync::Arc;

use chrono::{DateTime, Local, Utc};
use chrono_tz::Tz;

use crate::database::{DailyMenu, DatabaseError, MenuImage, MenuRepository, MenuUpsert};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Calendar date of `now` in the given IANA zone, or in the server's local
/// zone when none is configured. An unknown zone falls back to local time.
pub fn menu_date(now: DateTime<Utc>, timezone: Option<&str>) -> String {
    match timezone.map(|name| (name, name.parse::<Tz>())) {
        Some((_, Ok(tz))) => now.with_timezone(&tz).format(DATE_FORMAT).to_string(),
        Some((name, Err(_))) => {
            tracing::warn!(timezone = name, "unknown timezone, using server local date");
            now.with_timezone(&Local).format(DATE_FORMAT).to_string()
        }
        None => now.with_timezone(&Local).format(DATE_FORMAT).to_string(),
    }
}

#[derive(Clone)]
pub struct MenuService {
    repo: Arc<dyn MenuRepository>,
}

impl MenuService {
    pub fn new(repo: Arc<dyn MenuRepository>) -> Self {
        Self { repo }
    }

    fn today(&self, timezone: Option<&str>) -> String {
        menu_date(Utc::now(), timezone)
    }

    pub async fn get_menu_with_image(
        &self,
        tenant_id: &str,
        timezone: Option<&str>,
    ) -> Result<(Option<DailyMenu>, Option<MenuImage>), DatabaseError> {
        let date = self.today(timezone);
        let menu = self.repo.get_menu_for_date(tenant_id, &date).await?;
        let image = self.repo.get_active_image(tenant_id).await?;
        Ok((menu, image))
    }

    pub async fn update_menu_text(
        &self,
        tenant_id: &str,
        text_raw: &str,
        title: &str,
        timezone: Option<&str>,
    ) -> Result<DailyMenu, DatabaseError> {
        let date = self.today(timezone);
        self.repo
            .upsert_menu(
                tenant_id,
                &date,
                MenuUpsert {
                    title: title.to_string(),
                    text_raw: text_raw.to_string(),
                    sections: None,
                },
            )
            .await
    }

    pub async fn publish_today(
        &self,
        tenant_id: &str,
        timezone: Option<&str>,
    ) -> Result<DailyMenu, DatabaseError> {
        let date = self.today(timezone);
        self.repo.publish_menu(tenant_id, &date).await
    }

    pub async fn get_status(
        &self,
        tenant_id: &str,
        timezone: Option<&str>,
    ) -> Result<Option<DailyMenu>, DatabaseError> {
        let date = self.today(timezone);
        self.repo.get_menu_for_date(tenant_id, &date).await
    }

    pub async fn update_featured_image(
        &self,
        tenant_id: &str,
        url: &str,
        caption: Option<&str>,
    ) -> Result<MenuImage, DatabaseError> {
        self.repo.upsert_image(tenant_id, url, caption).await
    }
}
