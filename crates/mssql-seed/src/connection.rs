//! SQL Server connection shared by the column catalog and the live row source.
//!
//! Tiberius is async; the generator is a synchronous pull loop. The
//! connection owns a current-thread tokio runtime and every round trip is
//! driven to completion with `block_on`, so callers simply block.

use std::collections::HashMap;

use tiberius::{AuthMethod, Client, Config, EncryptionLevel};
use tokio::net::TcpStream;
use tokio::runtime::{Builder, Runtime};
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, info};

use crate::catalog::ColumnInfo;
use crate::config::SourceConfig;
use crate::error::{Result, SeedError};

/// Tiberius client type used throughout the crate.
pub(crate) type MssqlClient = Client<Compat<TcpStream>>;

/// An open, authenticated SQL Server connection.
///
/// Row sources borrow it for the duration of one table and never close it;
/// closing is the job of whoever called [`MssqlConnection::connect`].
pub struct MssqlConnection {
    runtime: Runtime,
    client: MssqlClient,
    pub(crate) column_cache: HashMap<String, Vec<ColumnInfo>>,
}

impl MssqlConnection {
    /// Open a connection using SQL Server authentication.
    pub fn connect(config: &SourceConfig) -> Result<Self> {
        let password = config.password.as_deref().ok_or_else(|| {
            SeedError::Config("source.password is required to connect".to_string())
        })?;

        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| SeedError::resource("tokio runtime", e.to_string()))?;

        let tiberius_config = build_config(config, password);
        debug!("Connecting to {}", tiberius_config.get_addr());

        let client = runtime.block_on(async {
            let tcp = TcpStream::connect(tiberius_config.get_addr())
                .await
                .map_err(|e| tiberius::error::Error::Io {
                    kind: e.kind(),
                    message: e.to_string(),
                })?;

            tcp.set_nodelay(true).ok();

            Client::connect(tiberius_config, tcp.compat_write()).await
        })?;

        info!(
            "Connected to MSSQL: {}:{}/{}",
            config.host, config.port, config.database
        );

        Ok(Self {
            runtime,
            client,
            column_cache: HashMap::new(),
        })
    }

    /// Runtime and client, borrowed separately so a row stream can hold the
    /// client while the runtime drives it.
    pub(crate) fn parts(&mut self) -> (&Runtime, &mut MssqlClient) {
        (&self.runtime, &mut self.client)
    }

    /// Close the connection gracefully.
    pub fn close(self) -> Result<()> {
        let Self {
            runtime, client, ..
        } = self;
        runtime.block_on(client.close())?;
        debug!("MSSQL connection closed");
        Ok(())
    }
}

fn build_config(source: &SourceConfig, password: &str) -> Config {
    let mut config = Config::new();
    config.host(&source.host);
    config.port(source.port);
    config.database(&source.database);
    config.authentication(AuthMethod::sql_server(&source.user, password));

    if source.trust_server_cert {
        config.trust_cert();
    }
    if source.encrypt {
        config.encryption(EncryptionLevel::Required);
    } else {
        config.encryption(EncryptionLevel::NotSupported);
    }

    config
}
