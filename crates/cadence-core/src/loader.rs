//! The seam through which the cache obtains resources it does not have.

use async_trait::async_trait;
use std::future::Future;

/// Produces a resource for a key on a cache miss.
///
/// A load is all-or-nothing: on any problem (missing blob, malformed config,
/// I/O error) return `Err` and no partial resource. The cache wraps the error
/// in [`CoreError::LoadFailure`](crate::CoreError::LoadFailure) together with
/// the key. Implementations may suspend freely; the cache holds no map lock
/// while a load runs.
#[async_trait]
pub trait ResourceLoader<K, C, R>: Send + Sync {
    /// Load the resource identified by `key` using `config`
    async fn load(&self, key: &K, config: &C) -> anyhow::Result<R>;
}

/// Adapter turning an async closure into a [`ResourceLoader`]
#[derive(Debug, Clone)]
pub struct FnLoader<F> {
    f: F,
}

/// Wrap `f` so it can be handed to a cache as its loader
pub fn loader_fn<F>(f: F) -> FnLoader<F> {
    FnLoader { f }
}

#[async_trait]
impl<K, C, R, F, Fut> ResourceLoader<K, C, R> for FnLoader<F>
where
    K: Clone + Send + Sync + 'static,
    C: Clone + Send + Sync + 'static,
    R: Send + 'static,
    F: Fn(K, C) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<R>> + Send + 'static,
{
    async fn load(&self, key: &K, config: &C) -> anyhow::Result<R> {
        (self.f)(key.clone(), config.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fn_loader_passes_key_and_config() {
        let loader = loader_fn(|key: u64, scale: u64| async move { Ok::<_, anyhow::Error>(key * scale) });
        let value: u64 = loader.load(&6u64, &7u64).await.unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn test_fn_loader_propagates_errors() {
        let loader = loader_fn(|key: u64, _: ()| async move {
            Err::<u64, _>(anyhow::anyhow!("no model stored under id {key}"))
        });
        let err = loader.load(&3u64, &()).await.unwrap_err();
        assert_eq!(err.to_string(), "no model stored under id 3");
    }
}
