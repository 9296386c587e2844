//! Built-in dependencies.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use uuid::Uuid;

use super::DependencyKey;
use crate::component::BoxFuture;

/// Date provider.
#[derive(Clone)]
pub struct Now(Arc<dyn Fn() -> SystemTime + Send + Sync>);

impl Now {
    pub fn system() -> Self {
        Self(Arc::new(SystemTime::now))
    }

    pub fn constant(time: SystemTime) -> Self {
        Self(Arc::new(move || time))
    }

    pub fn now(&self) -> SystemTime {
        (self.0)()
    }
}

impl fmt::Debug for Now {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Now")
    }
}

impl DependencyKey for Now {
    type Value = Now;
    const NAME: &'static str = "now";

    fn live_value() -> Now {
        Now::system()
    }

    fn test_value() -> Now {
        Now::constant(SystemTime::UNIX_EPOCH)
    }
}

/// UUID generator.
#[derive(Clone)]
pub struct UuidGenerator(Arc<dyn Fn() -> Uuid + Send + Sync>);

impl UuidGenerator {
    pub fn random() -> Self {
        Self(Arc::new(Uuid::new_v4))
    }

    /// Yields `00000000-0000-0000-0000-000000000000`, `...0001`, ...
    pub fn incrementing() -> Self {
        let counter = Arc::new(AtomicU64::new(0));
        Self(Arc::new(move || {
            Uuid::from_u128(counter.fetch_add(1, Ordering::SeqCst) as u128)
        }))
    }

    pub fn constant(uuid: Uuid) -> Self {
        Self(Arc::new(move || uuid))
    }

    pub fn generate(&self) -> Uuid {
        (self.0)()
    }
}

impl fmt::Debug for UuidGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("UuidGenerator")
    }
}

impl DependencyKey for UuidGenerator {
    type Value = UuidGenerator;
    const NAME: &'static str = "uuid";

    fn live_value() -> UuidGenerator {
        UuidGenerator::random()
    }

    fn test_value() -> UuidGenerator {
        UuidGenerator::incrementing()
    }
}

/// Suspends work for a duration.
#[derive(Clone)]
pub struct Clock(Arc<dyn Fn(Duration) -> BoxFuture<'static, ()> + Send + Sync>);

impl Clock {
    pub fn tokio() -> Self {
        Self(Arc::new(|duration| Box::pin(tokio::time::sleep(duration))))
    }

    /// Returns immediately from every sleep.
    pub fn immediate() -> Self {
        Self(Arc::new(|_| Box::pin(async {})))
    }

    pub async fn sleep(&self, duration: Duration) {
        (self.0)(duration).await
    }
}

impl fmt::Debug for Clock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Clock")
    }
}

impl DependencyKey for Clock {
    type Value = Clock;
    const NAME: &'static str = "clock";

    fn live_value() -> Clock {
        Clock::tokio()
    }

    fn test_value() -> Clock {
        Clock::immediate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incrementing_uuids_are_sequential() {
        let generator = UuidGenerator::incrementing();
        assert_eq!(generator.generate(), Uuid::from_u128(0));
        assert_eq!(generator.generate(), Uuid::from_u128(1));
    }

    #[test]
    fn constant_now_never_moves() {
        let now = Now::constant(SystemTime::UNIX_EPOCH);
        assert_eq!(now.now(), SystemTime::UNIX_EPOCH);
        assert_eq!(now.now(), SystemTime::UNIX_EPOCH);
    }

    #[tokio::test]
    async fn immediate_clock_does_not_wait() {
        let started = std::time::Instant::now();
        Clock::immediate().sleep(Duration::from_secs(60)).await;
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
