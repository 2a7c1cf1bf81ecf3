use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bevy::log::{debug, warn};
use parking_lot::Mutex;
use reqwest::Client;

use crate::resources::constants::{REQUEST_TIMEOUT_SECS, USER_AGENT};
use crate::tile_system::types::TileError;

/// Fetches raw tile bytes
#[async_trait]
pub trait TileTransport: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, TileError>;
}

/// HTTP transport backed by a shared reqwest client
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, TileError> {
        // Create a client with proper user agent and timeout
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|err| TileError::Network(err.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl TileTransport for HttpTransport {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, TileError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| TileError::Network(err.to_string()))?;

        let status = response.status();
        if status.as_u16() == 404 {
            return Err(TileError::NotFound);
        }
        if !status.is_success() {
            return Err(TileError::Status(status.as_u16()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|err| TileError::Network(err.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// Landing spot for a fetch result, written from the I/O side and polled by
/// the loading system.
pub type ResponseSlot = Arc<Mutex<Option<Result<Vec<u8>, TileError>>>>;

/// Where fetch futures run
#[derive(Clone)]
pub enum FetchExecutor {
    /// Spawned on a tokio runtime; results land asynchronously
    Runtime(tokio::runtime::Handle),
    /// Driven to completion on the calling thread
    Inline,
}

/// Issues fetches and tracks how many are outstanding.
pub struct TileFetcher {
    transport: Arc<dyn TileTransport>,
    executor: FetchExecutor,
    in_flight: Arc<AtomicUsize>,
}

impl TileFetcher {
    pub fn new(transport: Arc<dyn TileTransport>, executor: FetchExecutor) -> Self {
        Self {
            transport,
            executor,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Starts fetching `url`; the result appears in the returned slot.
    pub fn fetch(&self, url: String) -> ResponseSlot {
        let slot: ResponseSlot = Arc::new(Mutex::new(None));
        let transport = self.transport.clone();
        let in_flight = self.in_flight.clone();
        let target = slot.clone();
        in_flight.fetch_add(1, Ordering::SeqCst);

        let request = async move {
            let result = transport.fetch(&url).await;
            match &result {
                Ok(bytes) => debug!("Received {} bytes from {}", bytes.len(), url),
                Err(err) => warn!("Failed to load {}: {}", url, err),
            }
            *target.lock() = Some(result);
            in_flight.fetch_sub(1, Ordering::SeqCst);
        };

        match &self.executor {
            FetchExecutor::Runtime(handle) => {
                handle.spawn(request);
            }
            FetchExecutor::Inline => futures_lite::future::block_on(request),
        }
        slot
    }
}

#[cfg(test)]
pub use memory::MemoryTransport;

#[cfg(test)]
mod memory {
    use super::*;

    type Responder = Box<dyn Fn(&str) -> Result<Vec<u8>, TileError> + Send + Sync>;

    /// Answers from a closure and remembers every requested URL
    pub struct MemoryTransport {
        responder: Responder,
        requests: Mutex<Vec<String>>,
    }

    impl MemoryTransport {
        pub fn new(responder: impl Fn(&str) -> Result<Vec<u8>, TileError> + Send + Sync + 'static) -> Self {
            Self {
                responder: Box::new(responder),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn requests(&self) -> Vec<String> {
            self.requests.lock().clone()
        }
    }

    #[async_trait]
    impl TileTransport for MemoryTransport {
        async fn fetch(&self, url: &str) -> Result<Vec<u8>, TileError> {
            self.requests.lock().push(url.to_string());
            (self.responder)(url)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inline_fetch_fills_slot() {
        let transport = Arc::new(MemoryTransport::new(|url| {
            if url.ends_with("ok") {
                Ok(vec![1, 2, 3])
            } else {
                Err(TileError::NotFound)
            }
        }));
        let fetcher = TileFetcher::new(transport.clone(), FetchExecutor::Inline);

        let ok = fetcher.fetch("tile/ok".to_string());
        let missing = fetcher.fetch("tile/missing".to_string());

        assert_eq!(*ok.lock(), Some(Ok(vec![1, 2, 3])));
        assert_eq!(*missing.lock(), Some(Err(TileError::NotFound)));
        assert_eq!(fetcher.in_flight(), 0);
        assert_eq!(transport.requests(), vec!["tile/ok", "tile/missing"]);
    }

    #[test]
    fn test_runtime_fetch_lands_later() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();
        let transport = Arc::new(MemoryTransport::new(|_| Ok(vec![7])));
        let fetcher = TileFetcher::new(transport, FetchExecutor::Runtime(runtime.handle().clone()));

        let slot = fetcher.fetch("tile".to_string());
        for _ in 0..200 {
            if slot.lock().is_some() {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(*slot.lock(), Some(Ok(vec![7])));
    }
}
