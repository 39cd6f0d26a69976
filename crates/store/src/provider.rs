//! Connection acquisition under the three lifetime policies.
//!
//! A `ConnectionProvider` is built once from configuration. Each worker
//! asks it for a `Session`, then asks the session for a `Lease` per unit
//! of work (one transaction, one insert batch):
//!
//! | policy    | session holds          | lease                          |
//! |-----------|------------------------|--------------------------------|
//! | pooled    | the shared store       | a pooled connection, returned  |
//! | dedicated | one checked-out conn   | a borrow of that connection    |
//! | ephemeral | the shared store       | a fresh connection, closed     |

use crate::connection::Connection;
use crate::dialect::Dialect;
use bankcheck_core::{ConnectionPolicy, StoreResult};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::Duration;

/// A store under test.
pub trait Store: Send + Sync {
    /// SQL flavour of every connection.
    fn dialect(&self) -> Dialect;

    /// Take a connection from the store's pool.
    fn checkout(&self) -> StoreResult<Box<dyn Connection>>;

    /// Open a new connection that bypasses the pool.
    fn connect(&self) -> StoreResult<Box<dyn Connection>>;
}

/// Pool limits derived from the connection policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSizing {
    /// Maximum open connections.
    pub max_open: u32,
    /// Idle connections kept warm.
    pub max_idle: u32,
    /// Age after which a connection is recycled.
    pub max_lifetime: Duration,
}

impl PoolSizing {
    /// Sizing for `policy` given the number of long-lived workers and shards.
    pub fn for_policy(policy: ConnectionPolicy, workers: usize, shards: usize) -> Self {
        let workers = workers.max(1) as u32;
        let shards = shards.max(1) as u32;
        match policy {
            // Verification checks out a connection per round for each
            // shard, fast and delayed, alongside the workers.
            ConnectionPolicy::Pooled => Self {
                max_open: workers + shards * 2,
                max_idle: (workers / 2).max(1),
                max_lifetime: Duration::from_secs(5 * 60),
            },
            // Every worker pins a connection; verification checks out
            // per round on top of that.
            ConnectionPolicy::Dedicated => Self {
                max_open: workers * 2 + shards * 2,
                max_idle: workers,
                max_lifetime: Duration::from_secs(60 * 60),
            },
            ConnectionPolicy::Ephemeral => Self {
                max_open: workers,
                max_idle: 0,
                max_lifetime: Duration::from_secs(5 * 60),
            },
        }
    }
}

/// A connection in use for one unit of work.
pub enum Lease<'s> {
    /// Borrowed from a dedicated session.
    Held(&'s mut Box<dyn Connection>),
    /// Owned for the lease; released (returned to the pool or closed) on drop.
    Owned(Box<dyn Connection>),
}

impl Deref for Lease<'_> {
    type Target = dyn Connection;

    fn deref(&self) -> &Self::Target {
        match self {
            Lease::Held(conn) => &***conn,
            Lease::Owned(conn) => &**conn,
        }
    }
}

impl DerefMut for Lease<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match self {
            Lease::Held(conn) => &mut ***conn,
            Lease::Owned(conn) => &mut **conn,
        }
    }
}

/// A worker's view of the store.
pub trait Session: Send {
    /// Obtain a connection for one unit of work.
    fn lease(&mut self) -> StoreResult<Lease<'_>>;
}

struct PooledSession {
    store: Arc<dyn Store>,
}

impl Session for PooledSession {
    fn lease(&mut self) -> StoreResult<Lease<'_>> {
        Ok(Lease::Owned(self.store.checkout()?))
    }
}

struct DedicatedSession {
    conn: Box<dyn Connection>,
}

impl Session for DedicatedSession {
    fn lease(&mut self) -> StoreResult<Lease<'_>> {
        Ok(Lease::Held(&mut self.conn))
    }
}

struct EphemeralSession {
    store: Arc<dyn Store>,
}

impl Session for EphemeralSession {
    fn lease(&mut self) -> StoreResult<Lease<'_>> {
        Ok(Lease::Owned(self.store.connect()?))
    }
}

/// Factory handing out sessions for one policy.
#[derive(Clone)]
pub struct ConnectionProvider {
    store: Arc<dyn Store>,
    policy: ConnectionPolicy,
}

impl ConnectionProvider {
    /// Bind `store` to `policy`.
    pub fn new(store: Arc<dyn Store>, policy: ConnectionPolicy) -> Self {
        Self { store, policy }
    }

    /// SQL flavour of the store.
    pub fn dialect(&self) -> Dialect {
        self.store.dialect()
    }

    /// Open a session. Under the dedicated policy this checks out the
    /// connection the session will hold for its lifetime.
    pub fn session(&self) -> StoreResult<Box<dyn Session>> {
        Ok(match self.policy {
            ConnectionPolicy::Pooled => Box::new(PooledSession {
                store: Arc::clone(&self.store),
            }),
            ConnectionPolicy::Dedicated => Box::new(DedicatedSession {
                conn: self.store.checkout()?,
            }),
            ConnectionPolicy::Ephemeral => Box::new(EphemeralSession {
                store: Arc::clone(&self.store),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Row, Value};
    use std::sync::atomic::{AtomicU64, Ordering};

    struct CountingConn {
        id: u64,
    }

    impl Connection for CountingConn {
        fn dialect(&self) -> Dialect {
            Dialect::MySql
        }

        fn exec(&mut self, _sql: &str) -> StoreResult<u64> {
            Ok(0)
        }

        fn query(&mut self, _sql: &str) -> StoreResult<Vec<Row>> {
            Ok(vec![Row::new(vec![Value::Int(self.id as i64)])])
        }
    }

    #[derive(Default)]
    struct CountingStore {
        checkouts: AtomicU64,
        connects: AtomicU64,
    }

    impl Store for CountingStore {
        fn dialect(&self) -> Dialect {
            Dialect::MySql
        }

        fn checkout(&self) -> StoreResult<Box<dyn Connection>> {
            let id = self.checkouts.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(CountingConn { id }))
        }

        fn connect(&self) -> StoreResult<Box<dyn Connection>> {
            let id = 1000 + self.connects.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(CountingConn { id }))
        }
    }

    fn lease_id(session: &mut dyn Session) -> i64 {
        let mut lease = session.lease().unwrap();
        lease.query_row("select id").unwrap().unwrap().get_i64(0).unwrap()
    }

    #[test]
    fn test_pooled_checks_out_per_lease() {
        let store = Arc::new(CountingStore::default());
        let provider = ConnectionProvider::new(store.clone(), ConnectionPolicy::Pooled);
        let mut session = provider.session().unwrap();
        assert_eq!(store.checkouts.load(Ordering::SeqCst), 0);

        lease_id(session.as_mut());
        lease_id(session.as_mut());
        assert_eq!(store.checkouts.load(Ordering::SeqCst), 2);
        assert_eq!(store.connects.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_dedicated_holds_one_connection() {
        let store = Arc::new(CountingStore::default());
        let provider = ConnectionProvider::new(store.clone(), ConnectionPolicy::Dedicated);
        let mut session = provider.session().unwrap();
        assert_eq!(store.checkouts.load(Ordering::SeqCst), 1);

        let first = lease_id(session.as_mut());
        let second = lease_id(session.as_mut());
        assert_eq!(first, second);
        assert_eq!(store.checkouts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_ephemeral_connects_per_lease() {
        let store = Arc::new(CountingStore::default());
        let provider = ConnectionProvider::new(store.clone(), ConnectionPolicy::Ephemeral);
        let mut session = provider.session().unwrap();

        let first = lease_id(session.as_mut());
        let second = lease_id(session.as_mut());
        assert_ne!(first, second);
        assert_eq!(store.connects.load(Ordering::SeqCst), 2);
        assert_eq!(store.checkouts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_sizing_follows_policy() {
        let pooled = PoolSizing::for_policy(ConnectionPolicy::Pooled, 10, 1);
        assert_eq!(pooled.max_open, 12);
        assert_eq!(pooled.max_idle, 5);
        assert_eq!(pooled.max_lifetime, Duration::from_secs(300));

        let dedicated = PoolSizing::for_policy(ConnectionPolicy::Dedicated, 10, 2);
        assert_eq!(dedicated.max_open, 24);
        assert_eq!(dedicated.max_idle, 10);
        assert_eq!(dedicated.max_lifetime, Duration::from_secs(3600));

        let ephemeral = PoolSizing::for_policy(ConnectionPolicy::Ephemeral, 1, 1);
        assert_eq!(ephemeral.max_idle, 0);

        assert_eq!(
            PoolSizing::for_policy(ConnectionPolicy::Pooled, 1, 1).max_idle,
            1
        );
    }
}
