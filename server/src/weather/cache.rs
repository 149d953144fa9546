use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tokio::time::Instant;

use super::{DisplayWeather, UpstreamUnavailable, WeatherConfig, WeatherLocation, WeatherUpstream};

/// Last successful reading for one tenant.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub weather: DisplayWeather,
    pub fetched_at: Instant,
    pub location: WeatherLocation,
}

pub type WeatherCache = Cache<String, CacheEntry>;

/// One entry per tenant, no size or age eviction.
pub fn init_cache() -> WeatherCache {
    Cache::builder().build()
}

/// Per-tenant weather cache in front of the upstream provider with a stale
/// fallback when the provider fails.
#[derive(Clone)]
pub struct WeatherService {
    upstream: Arc<dyn WeatherUpstream>,
    cache: WeatherCache,
    refresh_interval: Duration,
}

impl WeatherService {
    pub fn new(upstream: Arc<dyn WeatherUpstream>, refresh_interval: Duration) -> Self {
        Self {
            upstream,
            cache: init_cache(),
            refresh_interval,
        }
    }

    pub async fn get_weather(
        &self,
        tenant_key: &str,
        config: &WeatherConfig,
    ) -> Result<Option<DisplayWeather>, UpstreamUnavailable> {
        let location = match config {
            WeatherConfig::Disabled => return Ok(None),
            WeatherConfig::Enabled(location) => location,
        };

        let cached = self
            .cache
            .get(tenant_key)
            .await
            .filter(|entry| entry.location.matches(location));

        if let Some(entry) = &cached {
            if entry.fetched_at.elapsed() < self.refresh_interval {
                tracing::debug!(tenant = tenant_key, "weather cache hit");
                return Ok(Some(entry.weather.clone()));
            }
        }

        let started = Instant::now();
        match self
            .upstream
            .fetch(location.lat, location.lon, &location.lang)
            .await
        {
            Ok(response) => {
                let weather = DisplayWeather::from(&response);
                self.cache
                    .insert(
                        tenant_key.to_string(),
                        CacheEntry {
                            weather: weather.clone(),
                            fetched_at: started,
                            location: location.clone(),
                        },
                    )
                    .await;
                Ok(Some(weather))
            }
            Err(err) => match cached {
                Some(entry) => {
                    tracing::warn!(
                        tenant = tenant_key,
                        error = %err,
                        "weather upstream failed, serving stale reading"
                    );
                    Ok(Some(DisplayWeather {
                        stale: true,
                        ..entry.weather
                    }))
                }
                None => Err(err),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weather::display::tests::sample_response;
    use crate::weather::types::CurrentWeatherResponse;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct StubUpstream {
        calls: AtomicUsize,
        failing: AtomicBool,
        delay: Duration,
    }

    impl StubUpstream {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl WeatherUpstream for StubUpstream {
        async fn fetch(
            &self,
            lat: f64,
            lon: f64,
            _lang: &str,
        ) -> Result<CurrentWeatherResponse, UpstreamUnavailable> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) as i64;
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.failing.load(Ordering::SeqCst) {
                return Err(UpstreamUnavailable::new("stub failure"));
            }
            let mut response = sample_response();
            response.coord.lat = lat;
            response.coord.lon = lon;
            response.dt += call;
            Ok(response)
        }
    }

    fn madrid() -> WeatherConfig {
        WeatherConfig::Enabled(WeatherLocation { lat: 40.4, lon: -3.7, lang: "es".into() })
    }

    fn service(refresh: Duration) -> (Arc<StubUpstream>, WeatherService) {
        let upstream = Arc::new(StubUpstream::default());
        let service = WeatherService::new(upstream.clone(), refresh);
        (upstream, service)
    }

    #[tokio::test]
    async fn test_disabled_skips_upstream() {
        let (upstream, service) = service(Duration::from_secs(600));
        let result = service.get_weather("ABC234", &WeatherConfig::Disabled).await.unwrap();
        assert!(result.is_none());
        assert_eq!(upstream.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_call_within_window_is_cached() {
        let (upstream, service) = service(Duration::from_secs(600));
        let first = service.get_weather("ABC234", &madrid()).await.unwrap().unwrap();
        tokio::time::advance(Duration::from_secs(599)).await;
        let second = service.get_weather("ABC234", &madrid()).await.unwrap().unwrap();

        assert_eq!(first, second);
        assert_eq!(first.updated_at, second.updated_at);
        assert!(!second.stale);
        assert_eq!(upstream.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_refetches() {
        let (upstream, service) = service(Duration::from_secs(600));
        let first = service.get_weather("ABC234", &madrid()).await.unwrap().unwrap();
        tokio::time::advance(Duration::from_secs(600)).await;
        let second = service.get_weather("ABC234", &madrid()).await.unwrap().unwrap();

        assert_eq!(upstream.calls(), 2);
        assert_ne!(first.updated_at, second.updated_at);
    }

    #[tokio::test]
    async fn test_zero_interval_always_fetches() {
        let (upstream, service) = service(Duration::ZERO);
        for _ in 0..3 {
            service.get_weather("ABC234", &madrid()).await.unwrap();
        }
        assert_eq!(upstream.calls(), 3);
    }

    #[tokio::test]
    async fn test_failure_after_success_serves_stale() {
        let (upstream, service) = service(Duration::ZERO);
        let fresh = service.get_weather("ABC234", &madrid()).await.unwrap().unwrap();
        upstream.set_failing(true);
        let stale = service.get_weather("ABC234", &madrid()).await.unwrap().unwrap();

        assert!(stale.stale);
        assert_eq!(stale, DisplayWeather { stale: true, ..fresh });
    }

    #[tokio::test]
    async fn test_first_failure_propagates() {
        let (upstream, service) = service(Duration::from_secs(600));
        upstream.set_failing(true);
        let err = service.get_weather("ABC234", &madrid()).await.unwrap_err();
        assert!(err.to_string().contains("stub failure"));
    }

    #[tokio::test]
    async fn test_changed_location_has_no_fallback() {
        let (upstream, service) = service(Duration::from_secs(600));
        service.get_weather("ABC234", &madrid()).await.unwrap();
        upstream.set_failing(true);

        let moved = WeatherConfig::Enabled(WeatherLocation { lat: 41.4, lon: 2.17, lang: "es".into() });
        assert!(service.get_weather("ABC234", &moved).await.is_err());

        let english = WeatherConfig::Enabled(WeatherLocation { lat: 40.4, lon: -3.7, lang: "en".into() });
        assert!(service.get_weather("ABC234", &english).await.is_err());
        assert_eq!(upstream.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_location_replaces_entry() {
        let (upstream, service) = service(Duration::from_secs(600));
        service.get_weather("ABC234", &madrid()).await.unwrap();
        let moved = WeatherConfig::Enabled(WeatherLocation { lat: 41.4, lon: 2.17, lang: "es".into() });
        let fresh = service.get_weather("ABC234", &moved).await.unwrap().unwrap();
        assert_eq!(upstream.calls(), 2);

        upstream.set_failing(true);
        assert!(service.get_weather("ABC234", &madrid()).await.is_err());
        assert_eq!(upstream.calls(), 3);

        let hit = service.get_weather("ABC234", &moved).await.unwrap().unwrap();
        assert!(!hit.stale);
        assert_eq!(hit, fresh);
        assert_eq!(upstream.calls(), 3);

        tokio::time::advance(Duration::from_secs(601)).await;
        let stale = service.get_weather("ABC234", &moved).await.unwrap().unwrap();
        assert_eq!(stale, DisplayWeather { stale: true, ..fresh });
        assert_eq!(upstream.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_calls_for_one_tenant() {
        let upstream = Arc::new(StubUpstream { delay: Duration::from_millis(200), ..Default::default() });
        let service = WeatherService::new(upstream.clone(), Duration::from_secs(600));

        let (loc_a, loc_b) = (madrid(), madrid());
        let (a, b) = tokio::join!(
            service.get_weather("ABC234", &loc_a),
            service.get_weather("ABC234", &loc_b)
        );
        let a = a.unwrap().unwrap();
        let b = b.unwrap().unwrap();
        assert!(!a.stale);
        assert!(!b.stale);
        assert_eq!(a.temp_c, b.temp_c);
        assert!(upstream.calls() <= 2);

        let calls = upstream.calls();
        let third = service.get_weather("ABC234", &madrid()).await.unwrap().unwrap();
        assert!(!third.stale);
        assert!(third == a || third == b);
        assert_eq!(upstream.calls(), calls);
    }

    #[tokio::test]
    async fn test_tenants_are_isolated() {
        let (upstream, service) = service(Duration::from_secs(600));
        service.get_weather("ABC234", &madrid()).await.unwrap();
        service.get_weather("XYZ789", &madrid()).await.unwrap();
        assert_eq!(upstream.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_madrid_scenario() {
        let (upstream, service) = service(Duration::from_secs(600));

        let first = service.get_weather("ABC234", &madrid()).await.unwrap().unwrap();
        assert_eq!(first.temp_c, 17.8);
        assert!(!first.stale);

        tokio::time::advance(Duration::from_secs(60)).await;
        let second = service.get_weather("ABC234", &madrid()).await.unwrap().unwrap();
        assert_eq!(second.temp_c, 17.8);
        assert!(!second.stale);
        assert_eq!(upstream.calls(), 1);

        upstream.set_failing(true);
        tokio::time::advance(Duration::from_secs(601)).await;
        let third = service.get_weather("ABC234", &madrid()).await.unwrap().unwrap();
        assert_eq!(third.temp_c, 17.8);
        assert!(third.stale);
        assert_eq!(upstream.calls(), 2);
    }
}
