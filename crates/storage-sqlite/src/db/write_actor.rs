//! Single writer thread. SQLite allows one writer at a time; funnelling every
//! write through one dedicated connection avoids SQLITE_BUSY storms and gives
//! each job an immediate transaction so readers never observe partial writes.

use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::sqlite::SqliteConnection;
use log::error;
use tokio::sync::{mpsc, oneshot};

use spendlog_core::errors::{DatabaseError, Error, Result};

type WriteJob = Box<dyn FnOnce(&mut SqliteConnection) + Send>;

/// Cloneable handle used by repositories to submit write jobs.
#[derive(Clone)]
pub struct WriteHandle {
    tx: mpsc::UnboundedSender<WriteJob>,
}

/// Wraps job errors so `immediate_transaction` can roll back on either a
/// diesel failure or an application-level one.
enum JobError {
    Db(diesel::result::Error),
    App(Error),
}

impl From<diesel::result::Error> for JobError {
    fn from(err: diesel::result::Error) -> Self {
        JobError::Db(err)
    }
}

impl From<JobError> for Error {
    fn from(err: JobError) -> Self {
        match err {
            JobError::Db(db) => Error::Database(DatabaseError::QueryFailed(db.to_string())),
            JobError::App(app) => app,
        }
    }
}

impl WriteHandle {
    /// Runs `job` on the writer thread inside an immediate transaction and
    /// awaits its result. A job that returns `Err` rolls the transaction back.
    pub async fn exec<T, F>(&self, job: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static,
    {
        let (result_tx, result_rx) = oneshot::channel::<Result<T>>();
        let boxed: WriteJob = Box::new(move |conn| {
            let outcome = run_in_transaction(conn, job);
            // The caller may have gone away; nothing to do with the result then.
            let _ = result_tx.send(outcome);
        });
        self.tx.send(boxed).map_err(|_| {
            Error::Database(DatabaseError::WriteQueue(
                "writer thread is not running".to_string(),
            ))
        })?;
        result_rx.await.map_err(|_| {
            Error::Database(DatabaseError::WriteQueue(
                "writer dropped the job before completion".to_string(),
            ))
        })?
    }
}

fn run_in_transaction<T, F>(conn: &mut SqliteConnection, job: F) -> Result<T>
where
    F: FnOnce(&mut SqliteConnection) -> Result<T>,
{
    conn.immediate_transaction::<T, JobError, _>(|tx_conn| job(tx_conn).map_err(JobError::App))
        .map_err(Error::from)
}

/// Spawns the writer thread and returns a handle for submitting jobs. The
/// thread exits once every handle has been dropped.
pub fn spawn_writer(pool: Pool<ConnectionManager<SqliteConnection>>) -> WriteHandle {
    let (tx, mut rx) = mpsc::unbounded_channel::<WriteJob>();
    std::thread::spawn(move || {
        while let Some(job) = rx.blocking_recv() {
            match pool.get() {
                Ok(mut conn) => job(&mut conn),
                Err(e) => {
                    // Dropping the job closes its oneshot; the caller sees a
                    // write-queue error instead of hanging.
                    error!("[Storage] Writer could not obtain a connection: {}", e);
                }
            }
        }
    });
    WriteHandle { tx }
}
