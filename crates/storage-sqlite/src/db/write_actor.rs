//! Single writer thread. Every job runs inside one immediate transaction, so
//! writes are serialized and a failing job leaves no partial state.

use diesel::sqlite::SqliteConnection;
use diesel::Connection;
use log::debug;
use std::any::Any;
use tokio::sync::{mpsc, oneshot};

use accountant_core::errors::{DatabaseError, Error, Result};

use super::{get_connection, DbPool};
use crate::errors::StorageError;

type BoxedValue = Box<dyn Any + Send>;
type Job = Box<dyn FnOnce(&mut SqliteConnection) -> Result<BoxedValue> + Send>;

struct WriteRequest {
    job: Job,
    reply: oneshot::Sender<Result<BoxedValue>>,
}

#[derive(Clone)]
pub struct WriteHandle {
    tx: mpsc::UnboundedSender<WriteRequest>,
}

impl WriteHandle {
    /// Queues `job` on the writer and waits for its result.
    pub async fn exec<T, F>(&self, job: F) -> Result<T>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply, response) = oneshot::channel();
        let job: Job = Box::new(move |conn| job(conn).map(|value| Box::new(value) as BoxedValue));
        self.tx
            .send(WriteRequest { job, reply })
            .map_err(|_| writer_gone("Database writer is not running"))?;

        let value = response
            .await
            .map_err(|_| writer_gone("Database writer dropped the request"))??;
        value
            .downcast::<T>()
            .map(|value| *value)
            .map_err(|_| Error::Unexpected("Database writer returned an unexpected type".into()))
    }
}

fn writer_gone(message: &str) -> Error {
    Error::Database(DatabaseError::Internal(message.to_string()))
}

fn run_job(pool: &DbPool, job: Job) -> Result<BoxedValue> {
    let mut conn = get_connection(pool)?;
    conn.immediate_transaction::<_, StorageError, _>(|tx| job(tx).map_err(StorageError::from))
        .map_err(Error::from)
}

/// Starts the writer thread. It exits once every handle is dropped.
pub fn spawn_writer(pool: DbPool) -> WriteHandle {
    let (tx, mut rx) = mpsc::unbounded_channel::<WriteRequest>();
    std::thread::spawn(move || {
        while let Some(WriteRequest { job, reply }) = rx.blocking_recv() {
            let result = run_job(&pool, job);
            if let Err(err) = &result {
                debug!("Write job rolled back: {}", err);
            }
            let _ = reply.send(result);
        }
        debug!("Database writer stopped");
    });
    WriteHandle { tx }
}
