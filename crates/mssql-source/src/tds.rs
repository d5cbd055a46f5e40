use async_trait::async_trait;
use mssql_core::{Cell, DataSource, RawRow, Session, SourceError};
use tiberius::{AuthMethod, Client, ColumnData, Config, EncryptionLevel, Row};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, instrument};

use crate::config::SourceConfig;

type TdsClient = Client<Compat<TcpStream>>;

/// [`DataSource`] speaking TDS to a SQL Server instance.
pub struct TdsSource {
    config: SourceConfig,
}

impl TdsSource {
    pub fn new(config: SourceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    fn tiberius_config(&self, host: &str, port: u16) -> Config {
        let cfg = &self.config;

        let mut config = Config::new();
        config.host(host);
        config.port(port);
        config.authentication(AuthMethod::sql_server(&cfg.username, &cfg.password));
        config.application_name("mssql-exporter");
        if let Some(db) = &cfg.database {
            config.database(db);
        }
        if cfg.encrypt {
            config.encryption(EncryptionLevel::Required);
        } else {
            config.encryption(EncryptionLevel::NotSupported);
        }
        if cfg.trust_server_certificate {
            config.trust_cert();
        }
        config
    }

    async fn open(&self, host: &str, port: u16) -> Result<TdsClient, tiberius::error::Error> {
        let config = self.tiberius_config(host, port);
        let tcp = TcpStream::connect(config.get_addr()).await?;
        tcp.set_nodelay(true)?;
        Client::connect(config, tcp.compat_write()).await
    }

    async fn open_routed(&self) -> Result<TdsClient, SourceError> {
        let cfg = &self.config;
        match self.open(&cfg.host, cfg.port).await {
            Ok(client) => Ok(client),
            // Azure gateways redirect once to the actual node
            Err(tiberius::error::Error::Routing { host, port }) => {
                debug!(%host, port, "following server redirect");
                self.open(&host, port).await.map_err(connect_error)
            }
            Err(e) => Err(connect_error(e)),
        }
    }
}

#[async_trait]
impl DataSource for TdsSource {
    #[instrument(level = "debug", skip(self), fields(host = %self.config.host, port = self.config.port))]
    async fn connect(&self) -> Result<Box<dyn Session>, SourceError> {
        let limit = self.config.connect_timeout;
        let client = tokio::time::timeout(limit, self.open_routed())
            .await
            .map_err(|_| SourceError::Timeout(limit.as_millis() as u64))??;

        debug!("connected");
        Ok(Box::new(TdsSession { client }))
    }
}

struct TdsSession {
    client: TdsClient,
}

#[async_trait]
impl Session for TdsSession {
    async fn query(&mut self, sql: &str) -> Result<Vec<RawRow>, SourceError> {
        let rows = self
            .client
            .simple_query(sql)
            .await
            .map_err(query_error)?
            .into_first_result()
            .await
            .map_err(query_error)?;

        Ok(rows.into_iter().map(to_raw_row).collect())
    }
}

fn connect_error(e: impl std::fmt::Display) -> SourceError {
    SourceError::Connect(e.to_string())
}

fn query_error(e: tiberius::error::Error) -> SourceError {
    SourceError::Query(e.to_string())
}

fn to_raw_row(row: Row) -> RawRow {
    RawRow::new(row.into_iter().map(to_cell).collect())
}

pub(crate) fn to_cell(data: ColumnData<'static>) -> Cell {
    match data {
        ColumnData::U8(v) => v.map_or(Cell::Null, |v| Cell::Int(v.into())),
        ColumnData::I16(v) => v.map_or(Cell::Null, |v| Cell::Int(v.into())),
        ColumnData::I32(v) => v.map_or(Cell::Null, |v| Cell::Int(v.into())),
        ColumnData::I64(v) => v.map_or(Cell::Null, Cell::Int),
        ColumnData::F32(v) => v.map_or(Cell::Null, |v| Cell::Float(v.into())),
        ColumnData::F64(v) => v.map_or(Cell::Null, Cell::Float),
        ColumnData::Bit(v) => v.map_or(Cell::Null, Cell::Bool),
        ColumnData::String(v) => v.map_or(Cell::Null, |s| Cell::Text(s.into_owned())),
        ColumnData::Numeric(v) => v.map_or(Cell::Null, |n| {
            Cell::Float(n.value() as f64 / 10f64.powi(i32::from(n.scale())))
        }),
        other => Cell::Other(format!("{other:?}")),
    }
}
