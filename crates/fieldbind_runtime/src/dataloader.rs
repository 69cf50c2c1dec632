//! Batch loading.
//!
//! Loaders are registered once per (key type, value type) pair in a
//! [`BatchLoaderRegistry`]. Every request gets its own set of loader queues:
//! keys requested while the request's resolution tree is making progress are
//! queued, and when the tree can make no further progress the queued keys are
//! flushed into a single batch function call per loader.

use crate::context::ExecutionContext;
use crate::error::{BatchLoadError, RegistrationError};
use futures::future::{BoxFuture, FutureExt, Shared};
use futures::stream::{BoxStream, Stream, StreamExt};
use futures::task::AtomicWaker;
use indexmap::IndexMap;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::Arc;
use std::task::Poll;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::debug;

type LoadResult<V> = Result<Option<V>, BatchLoadError>;
type SharedLoad<V> = Shared<BoxFuture<'static, LoadResult<V>>>;
type BatchFuture<V> = BoxFuture<'static, Result<Vec<Option<V>>, BatchLoadError>>;
type BatchFn<K, V> = Arc<dyn Fn(Vec<K>, BatchLoaderEnvironment) -> BatchFuture<V> + Send + Sync>;

/// Identifies a loader by its key and value types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoaderKey {
    key: TypeId,
    value: TypeId,
    pub(crate) key_name: &'static str,
    pub(crate) value_name: &'static str,
}

impl LoaderKey {
    pub fn of<K: 'static, V: 'static>() -> Self {
        Self {
            key: TypeId::of::<K>(),
            value: TypeId::of::<V>(),
            key_name: std::any::type_name::<K>(),
            value_name: std::any::type_name::<V>(),
        }
    }
}

/// What a batch function sees besides its keys.
#[derive(Debug, Clone)]
pub struct BatchLoaderEnvironment {
    context: ExecutionContext,
}

impl BatchLoaderEnvironment {
    /// The context of the request the batch belongs to.
    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }
}

trait LoaderFactory: Send + Sync {
    fn create(&self, scope: &LoaderScope) -> ActiveLoader;
}

trait Dispatch: Send + Sync {
    /// Flushes queued keys, returning the number of batch calls started.
    fn dispatch(&self) -> usize;
    fn pending(&self) -> usize;
}

#[derive(Clone)]
struct ActiveLoader {
    handle: Arc<dyn Any + Send + Sync>,
    dispatch: Arc<dyn Dispatch>,
}

struct TypedFactory<K, V> {
    batch_fn: BatchFn<K, V>,
    max_batch_size: Option<usize>,
}

impl<K, V> LoaderFactory for TypedFactory<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn create(&self, scope: &LoaderScope) -> ActiveLoader {
        let state = Arc::new(LoaderState {
            batch_fn: Arc::clone(&self.batch_fn),
            max_batch_size: self.max_batch_size.or(scope.max_batch_size),
            env: BatchLoaderEnvironment {
                context: scope.context.clone(),
            },
            cancel: scope.cancel.clone(),
            waker: Arc::clone(&scope.waker),
            key: LoaderKey::of::<K, V>(),
            queue: Mutex::new(LoaderQueue {
                cache: FxHashMap::default(),
                pending: Vec::new(),
            }),
        });
        ActiveLoader {
            handle: Arc::new(DataLoader {
                state: Arc::clone(&state),
            }),
            dispatch: state,
        }
    }
}

/// Registry of batch loaders, one per (key type, value type) pair.
#[derive(Default)]
pub struct BatchLoaderRegistry {
    factories: FxHashMap<LoaderKey, Arc<dyn LoaderFactory>>,
}

impl BatchLoaderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a registration for loading `V` values by `K` keys.
    pub fn for_type_pair<K, V>(&mut self) -> LoaderRegistration<'_, K, V>
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        LoaderRegistration {
            registry: self,
            max_batch_size: None,
            _marker: PhantomData,
        }
    }

    pub fn contains<K: 'static, V: 'static>(&self) -> bool {
        self.contains_key(LoaderKey::of::<K, V>())
    }

    pub(crate) fn contains_key(&self, key: LoaderKey) -> bool {
        self.factories.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    fn insert(&mut self, key: LoaderKey, factory: Arc<dyn LoaderFactory>) -> Result<(), RegistrationError> {
        if self.factories.contains_key(&key) {
            return Err(RegistrationError::DuplicateLoader {
                key: key.key_name,
                value: key.value_name,
            });
        }
        self.factories.insert(key, factory);
        Ok(())
    }
}

impl std::fmt::Debug for BatchLoaderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.factories.keys().map(|k| format!("{} -> {}", k.key_name, k.value_name)))
            .finish()
    }
}

/// Builder returned by [`BatchLoaderRegistry::for_type_pair`].
pub struct LoaderRegistration<'a, K, V> {
    registry: &'a mut BatchLoaderRegistry,
    max_batch_size: Option<usize>,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V> LoaderRegistration<'_, K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Caps the number of keys per batch call for this loader.
    #[must_use]
    pub fn max_batch_size(mut self, size: usize) -> Self {
        self.max_batch_size = Some(size.max(1));
        self
    }

    /// Registers a batch function returning one value per key, in key order.
    pub fn register_batch_loader<F, Fut>(self, batch_fn: F) -> Result<(), RegistrationError>
    where
        F: Fn(Vec<K>, BatchLoaderEnvironment) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<V>, BatchLoadError>> + Send + 'static,
    {
        let batch_fn: BatchFn<K, V> = Arc::new(
            move |keys: Vec<K>, env: BatchLoaderEnvironment| -> BatchFuture<V> {
                batch_fn(keys, env)
                    .map(|result| result.map(|values| values.into_iter().map(Some).collect::<Vec<_>>()))
                    .boxed()
            },
        );
        self.finish(batch_fn)
    }

    /// Registers a batch function returning a map. Keys missing from the map
    /// resolve to `None`.
    pub fn register_mapped_batch_loader<F, Fut>(self, batch_fn: F) -> Result<(), RegistrationError>
    where
        F: Fn(Vec<K>, BatchLoaderEnvironment) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HashMap<K, V>, BatchLoadError>> + Send + 'static,
    {
        let batch_fn: BatchFn<K, V> = Arc::new(
            move |keys: Vec<K>, env: BatchLoaderEnvironment| -> BatchFuture<V> {
                let lookup = batch_fn(keys.clone(), env);
                async move {
                    let mut values = lookup.await?;
                    Ok::<_, BatchLoadError>(keys.iter().map(|k| values.remove(k)).collect::<Vec<_>>())
                }
                .boxed()
            },
        );
        self.finish(batch_fn)
    }

    fn finish(self, batch_fn: BatchFn<K, V>) -> Result<(), RegistrationError> {
        self.registry.insert(
            LoaderKey::of::<K, V>(),
            Arc::new(TypedFactory {
                batch_fn,
                max_batch_size: self.max_batch_size,
            }),
        )
    }
}

struct LoaderScope {
    registry: Arc<BatchLoaderRegistry>,
    context: ExecutionContext,
    cancel: CancellationToken,
    max_batch_size: Option<usize>,
    waker: Arc<AtomicWaker>,
    active: Mutex<IndexMap<LoaderKey, ActiveLoader>>,
}

impl Drop for LoaderScope {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// The loaders of one request.
#[derive(Clone)]
pub(crate) struct DataLoaders {
    scope: Arc<LoaderScope>,
}

impl DataLoaders {
    pub(crate) fn new(
        registry: Arc<BatchLoaderRegistry>,
        context: ExecutionContext,
        cancel: CancellationToken,
        max_batch_size: Option<usize>,
    ) -> Self {
        Self {
            scope: Arc::new(LoaderScope {
                registry,
                context,
                cancel,
                max_batch_size,
                waker: Arc::new(AtomicWaker::new()),
                active: Mutex::new(IndexMap::new()),
            }),
        }
    }

    /// Returns the request's loader for `K -> V`, if one is registered.
    pub(crate) fn get<K, V>(&self) -> Option<DataLoader<K, V>>
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        self.erased(LoaderKey::of::<K, V>())?
            .downcast_ref::<DataLoader<K, V>>()
            .cloned()
    }

    pub(crate) fn erased(&self, key: LoaderKey) -> Option<Arc<dyn Any + Send + Sync>> {
        let mut active = self.scope.active.lock();
        if let Some(loader) = active.get(&key) {
            return Some(Arc::clone(&loader.handle));
        }
        let factory = self.scope.registry.factories.get(&key)?;
        let loader = factory.create(&self.scope);
        let handle = Arc::clone(&loader.handle);
        active.insert(key, loader);
        Some(handle)
    }

    /// Flushes every loader queue. Returns the number of batch calls started.
    pub(crate) fn dispatch(&self) -> usize {
        let loaders: Vec<ActiveLoader> = self.scope.active.lock().values().cloned().collect();
        loaders.iter().map(|l| l.dispatch.dispatch()).sum()
    }

    /// Number of keys queued and not yet dispatched.
    pub(crate) fn pending(&self) -> usize {
        let loaders: Vec<ActiveLoader> = self.scope.active.lock().values().cloned().collect();
        loaders.iter().map(|l| l.dispatch.pending()).sum()
    }

    /// Drives `future` to completion, flushing the loader queues whenever it
    /// stops making progress.
    pub(crate) async fn drive<F: Future>(&self, future: F) -> F::Output {
        let mut future = std::pin::pin!(future);
        futures::future::poll_fn(|cx| {
            self.scope.waker.register(cx.waker());
            if let Poll::Ready(output) = future.as_mut().poll(cx) {
                return Poll::Ready(output);
            }
            self.flush();
            Poll::Pending
        })
        .await
    }

    /// Like [`drive`](Self::drive), for a stream: whenever the stream has no
    /// item ready the loader queues are flushed.
    pub(crate) fn drive_stream<S>(&self, stream: S) -> BoxStream<'static, S::Item>
    where
        S: Stream + Send + 'static,
        S::Item: Send + 'static,
    {
        let loaders = self.clone();
        let mut stream = Box::pin(stream);
        futures::stream::poll_fn(move |cx| {
            loaders.scope.waker.register(cx.waker());
            if let Poll::Ready(item) = stream.as_mut().poll_next(cx) {
                return Poll::Ready(item);
            }
            loaders.flush();
            Poll::Pending
        })
        .boxed()
    }

    fn flush(&self) {
        let queued = self.pending();
        if queued > 0 {
            let batches = self.dispatch();
            debug!(keys = queued, batches, "flushed loader queues");
        }
    }
}

struct LoaderQueue<K, V> {
    cache: FxHashMap<K, SharedLoad<V>>,
    pending: Vec<(K, oneshot::Sender<LoadResult<V>>)>,
}

struct LoaderState<K, V> {
    batch_fn: BatchFn<K, V>,
    max_batch_size: Option<usize>,
    env: BatchLoaderEnvironment,
    cancel: CancellationToken,
    waker: Arc<AtomicWaker>,
    key: LoaderKey,
    queue: Mutex<LoaderQueue<K, V>>,
}

impl<K, V> LoaderState<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn enqueue(&self, key: K) -> SharedLoad<V> {
        let mut queue = self.queue.lock();
        if let Some(load) = queue.cache.get(&key) {
            return load.clone();
        }

        let (tx, rx) = oneshot::channel();
        let load = async move { rx.await.unwrap_or_else(|_| Err(BatchLoadError::cancelled())) }
            .boxed()
            .shared();
        queue.cache.insert(key.clone(), load.clone());
        queue.pending.push((key, tx));
        drop(queue);

        self.waker.wake();
        load
    }
}

impl<K, V> Dispatch for LoaderState<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn dispatch(&self) -> usize {
        let mut pending = std::mem::take(&mut self.queue.lock().pending);
        if pending.is_empty() {
            return 0;
        }

        let size = self.max_batch_size.unwrap_or(pending.len()).max(1);
        let mut batches = 0;
        while !pending.is_empty() {
            let rest = pending.split_off(size.min(pending.len()));
            let (keys, senders): (Vec<K>, Vec<_>) = std::mem::replace(&mut pending, rest).into_iter().unzip();

            debug!(
                keys = keys.len(),
                key_type = self.key.key_name,
                value_type = self.key.value_name,
                "dispatching batch"
            );

            let load = (self.batch_fn)(keys, self.env.clone());
            let cancel = self.cancel.clone();
            tokio::spawn(async move {
                let result = tokio::select! {
                    biased;
                    () = cancel.cancelled() => Err(BatchLoadError::cancelled()),
                    result = load => result,
                };
                deliver(senders, result);
            });
            batches += 1;
        }
        batches
    }

    fn pending(&self) -> usize {
        self.queue.lock().pending.len()
    }
}

fn deliver<V: Clone>(
    senders: Vec<oneshot::Sender<LoadResult<V>>>,
    result: Result<Vec<Option<V>>, BatchLoadError>,
) {
    let values = match result {
        Ok(values) if values.len() == senders.len() => values,
        Ok(values) => {
            let error = BatchLoadError::length_mismatch(senders.len(), values.len());
            for sender in senders {
                let _ = sender.send(Err(error.clone()));
            }
            return;
        }
        Err(error) => {
            for sender in senders {
                let _ = sender.send(Err(error.clone()));
            }
            return;
        }
    };
    for (sender, value) in senders.into_iter().zip(values) {
        let _ = sender.send(Ok(value));
    }
}

/// Request-scoped handle to a batch loader.
pub struct DataLoader<K, V> {
    state: Arc<LoaderState<K, V>>,
}

impl<K, V> Clone for DataLoader<K, V> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<K, V> DataLoader<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Queues `key` for the next batch and returns a future for its value.
    ///
    /// The key is queued when this is called, not when the future is first
    /// polled. Repeated keys share one future for the rest of the request.
    pub fn load(&self, key: K) -> impl Future<Output = Result<Option<V>, BatchLoadError>> + Send + 'static {
        self.state.enqueue(key)
    }

    /// Loads several keys, preserving their order.
    pub fn load_many(
        &self,
        keys: impl IntoIterator<Item = K>,
    ) -> impl Future<Output = Result<Vec<Option<V>>, BatchLoadError>> + Send + 'static {
        let loads: Vec<_> = keys.into_iter().map(|k| self.state.enqueue(k)).collect();
        async move { futures::future::join_all(loads).await.into_iter().collect() }
    }

    /// Seeds the cache so `key` resolves without a batch call.
    pub fn prime(&self, key: K, value: V) {
        let load = futures::future::ready(Ok(Some(value))).boxed().shared();
        self.state.queue.lock().cache.entry(key).or_insert(load);
    }

    /// Removes `key` from the cache so the next load dispatches it again.
    pub fn clear(&self, key: &K) {
        self.state.queue.lock().cache.remove(key);
    }
}

impl<K, V> std::fmt::Debug for DataLoader<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataLoader")
            .field("key", &self.state.key.key_name)
            .field("value", &self.state.key.value_name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn loaders(registry: BatchLoaderRegistry) -> DataLoaders {
        DataLoaders::new(
            Arc::new(registry),
            ExecutionContext::new(),
            CancellationToken::new(),
            None,
        )
    }

    fn recording_registry(calls: Arc<Mutex<Vec<Vec<i64>>>>) -> BatchLoaderRegistry {
        let mut registry = BatchLoaderRegistry::new();
        registry
            .for_type_pair::<i64, String>()
            .register_batch_loader(move |keys: Vec<i64>, _env| {
                calls.lock().push(keys.clone());
                async move { Ok(keys.iter().map(|k| format!("author-{k}")).collect()) }
            })
            .unwrap();
        registry
    }

    #[tokio::test]
    async fn test_keys_in_one_tick_share_a_batch() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let loaders = loaders(recording_registry(Arc::clone(&calls)));
        let loader = loaders.get::<i64, String>().unwrap();

        let values = loaders
            .drive(futures::future::join_all(vec![
                loader.load(101),
                loader.load(102),
                loader.load(101),
            ]))
            .await;

        assert_eq!(
            values,
            vec![
                Ok(Some("author-101".to_string())),
                Ok(Some("author-102".to_string())),
                Ok(Some("author-101".to_string())),
            ]
        );
        assert_eq!(*calls.lock(), vec![vec![101, 102]]);
    }

    #[tokio::test]
    async fn test_drive_stream_flushes_between_items() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let loaders = loaders(recording_registry(Arc::clone(&calls)));
        let loader = loaders.get::<i64, String>().unwrap();

        let source = futures::stream::iter([3, 4]).then(move |id| loader.load(id));
        let values: Vec<_> = loaders.drive_stream(source).collect().await;

        assert_eq!(
            values,
            vec![Ok(Some("author-3".to_string())), Ok(Some("author-4".to_string()))]
        );
        assert_eq!(*calls.lock(), vec![vec![3], vec![4]]);
    }

    #[tokio::test]
    async fn test_cached_keys_are_not_dispatched_again() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let loaders = loaders(recording_registry(Arc::clone(&calls)));
        let loader = loaders.get::<i64, String>().unwrap();

        loaders.drive(loader.load(1)).await.unwrap();
        let values = loaders.drive(loader.load_many([1, 2])).await.unwrap();

        assert_eq!(values, vec![Some("author-1".to_string()), Some("author-2".to_string())]);
        assert_eq!(*calls.lock(), vec![vec![1], vec![2]]);
    }

    #[tokio::test]
    async fn test_max_batch_size_splits_batches() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let loaders = DataLoaders::new(
            Arc::new(recording_registry(Arc::clone(&calls))),
            ExecutionContext::new(),
            CancellationToken::new(),
            Some(2),
        );
        let loader = loaders.get::<i64, String>().unwrap();

        let values = loaders.drive(loader.load_many([1, 2, 3])).await.unwrap();

        assert_eq!(values.len(), 3);
        assert_eq!(*calls.lock(), vec![vec![1, 2], vec![3]]);
    }

    #[tokio::test]
    async fn test_batch_failure_reaches_every_waiter() {
        let mut registry = BatchLoaderRegistry::new();
        registry
            .for_type_pair::<i64, String>()
            .register_batch_loader(|_keys: Vec<i64>, _env| async { Err(BatchLoadError::new("store offline")) })
            .unwrap();
        let loaders = loaders(registry);
        let loader = loaders.get::<i64, String>().unwrap();

        let results = loaders
            .drive(futures::future::join(loader.load(1), loader.load(2)))
            .await;

        assert_eq!(results.0, Err(BatchLoadError::new("store offline")));
        assert_eq!(results.1, Err(BatchLoadError::new("store offline")));
    }

    #[tokio::test]
    async fn test_length_mismatch_fails_the_batch() {
        let mut registry = BatchLoaderRegistry::new();
        registry
            .for_type_pair::<i64, String>()
            .register_batch_loader(|_keys: Vec<i64>, _env| async { Ok(vec!["only".to_string()]) })
            .unwrap();
        let loaders = loaders(registry);
        let loader = loaders.get::<i64, String>().unwrap();

        let result = loaders.drive(loader.load_many([1, 2])).await;

        assert_eq!(result, Err(BatchLoadError::length_mismatch(2, 1)));
    }

    #[tokio::test]
    async fn test_mapped_loader_and_missing_keys() {
        let mut registry = BatchLoaderRegistry::new();
        registry
            .for_type_pair::<i64, String>()
            .register_mapped_batch_loader(|keys: Vec<i64>, _env| async move {
                Ok(keys
                    .into_iter()
                    .filter(|k| k % 2 == 0)
                    .map(|k| (k, k.to_string()))
                    .collect::<HashMap<_, _>>())
            })
            .unwrap();
        let loaders = loaders(registry);
        let loader = loaders.get::<i64, String>().unwrap();

        let values = loaders.drive(loader.load_many([1, 2])).await.unwrap();

        assert_eq!(values, vec![None, Some("2".to_string())]);
    }

    #[tokio::test]
    async fn test_loader_sees_request_context() {
        let mut registry = BatchLoaderRegistry::new();
        registry
            .for_type_pair::<i64, String>()
            .register_batch_loader(|keys: Vec<i64>, env: BatchLoaderEnvironment| {
                let tenant: String = env.context().get("tenant").unwrap_or_default();
                async move { Ok(keys.iter().map(|k| format!("{tenant}/{k}")).collect()) }
            })
            .unwrap();
        let context = ExecutionContext::new();
        context.insert("tenant", "acme");
        let loaders = DataLoaders::new(Arc::new(registry), context, CancellationToken::new(), None);
        let loader = loaders.get::<i64, String>().unwrap();

        assert_eq!(loaders.drive(loader.load(7)).await, Ok(Some("acme/7".to_string())));
    }

    #[tokio::test]
    async fn test_prime_and_clear() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut registry = BatchLoaderRegistry::new();
        let counter = Arc::clone(&count);
        registry
            .for_type_pair::<i64, String>()
            .register_batch_loader(move |keys: Vec<i64>, _env| {
                counter.fetch_add(1, Ordering::SeqCst);
                async move { Ok(keys.iter().map(ToString::to_string).collect()) }
            })
            .unwrap();
        let loaders = loaders(registry);
        let loader = loaders.get::<i64, String>().unwrap();

        loader.prime(5, "primed".to_string());
        assert_eq!(loaders.drive(loader.load(5)).await, Ok(Some("primed".to_string())));
        assert_eq!(count.load(Ordering::SeqCst), 0);

        loader.clear(&5);
        assert_eq!(loaders.drive(loader.load(5)).await, Ok(Some("5".to_string())));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancel_fails_in_flight_batches() {
        let mut registry = BatchLoaderRegistry::new();
        registry
            .for_type_pair::<i64, String>()
            .register_batch_loader(|_keys: Vec<i64>, _env| async {
                futures::future::pending::<()>().await;
                Ok(Vec::new())
            })
            .unwrap();
        let cancel = CancellationToken::new();
        let loaders = DataLoaders::new(Arc::new(registry), ExecutionContext::new(), cancel.clone(), None);
        let loader = loaders.get::<i64, String>().unwrap();

        let load = loader.load(1);
        assert_eq!(loaders.pending(), 1);
        assert_eq!(loaders.dispatch(), 1);
        assert_eq!(loaders.pending(), 0);
        cancel.cancel();

        assert_eq!(load.await, Err(BatchLoadError::cancelled()));
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let mut registry = BatchLoaderRegistry::new();
        registry
            .for_type_pair::<i64, String>()
            .register_batch_loader(|keys: Vec<i64>, _env| async move { Ok(keys.iter().map(ToString::to_string).collect()) })
            .unwrap();

        let err = registry
            .for_type_pair::<i64, String>()
            .register_batch_loader(|keys: Vec<i64>, _env| async move { Ok(keys.iter().map(ToString::to_string).collect()) })
            .unwrap_err();

        assert!(matches!(err, RegistrationError::DuplicateLoader { .. }));
        assert!(registry.contains::<i64, String>());
        assert!(!registry.contains::<String, i64>());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unregistered_pair() {
        let loaders = loaders(BatchLoaderRegistry::new());
        assert!(loaders.get::<i64, String>().is_none());
    }
}
