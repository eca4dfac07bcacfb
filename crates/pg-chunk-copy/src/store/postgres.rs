//! PostgreSQL implementations of the storage collaborator traits.

use super::{SourceReader, SourceRecord, TargetRecord, TargetWriter};
use crate::config::EndpointConfig;
use crate::error::{CopyError, Result, StorageError};
use async_trait::async_trait;
use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod};
use rustls::ClientConfig;
use std::sync::Arc;
use tokio_postgres::Config as PgConfig;
use tokio_postgres_rustls::MakeRustlsConnect;
use tracing::{info, warn};

/// Reader over one source relation.
pub struct PgSourceReader {
    pool: Pool,
    /// Quoted `"schema"."table"` for SQL text.
    relation: String,
    /// Plain `schema.table` for the regclass cast.
    regclass: String,
}

/// Writer over one target relation.
pub struct PgTargetWriter {
    pool: Pool,
    relation: String,
}

impl PgSourceReader {
    /// Build a pool for the endpoint and verify connectivity.
    pub async fn connect(config: &EndpointConfig) -> Result<Self> {
        let pool = build_pool(config)?;
        test_connection(&pool, "source").await?;
        info!(
            "Connected to source: {}:{}/{} ({}.{})",
            config.host, config.port, config.database, config.schema, config.table
        );
        Ok(Self {
            pool,
            relation: qualify_table(&config.schema, &config.table),
            regclass: format!("{}.{}", config.schema, config.table),
        })
    }

    /// Connectivity check for health reporting.
    pub async fn ping(&self) -> Result<()> {
        test_connection(&self.pool, "source").await
    }
}

#[async_trait]
impl SourceReader for PgSourceReader {
    async fn count(&self) -> std::result::Result<i64, StorageError> {
        let client = checkout(&self.pool, "counting source rows").await?;
        let sql = format!("SELECT count(*) FROM {}", self.relation);
        let row = client.query_one(sql.as_str(), &[]).await?;
        Ok(row.get(0))
    }

    async fn physical_size(&self) -> std::result::Result<i64, StorageError> {
        let client = checkout(&self.pool, "reading source relation size").await?;
        // Total size including indexes and TOAST, per the store's own
        // accounting. NULL (relation momentarily invisible) reports as 0.
        let row = client
            .query_one(
                "SELECT COALESCE(pg_total_relation_size($1::regclass), 0)",
                &[&self.regclass],
            )
            .await?;
        Ok(row.get(0))
    }

    async fn fetch_page(
        &self,
        offset: i64,
        limit: i64,
    ) -> std::result::Result<Vec<SourceRecord>, StorageError> {
        let client = checkout(&self.pool, "fetching source page").await?;
        let sql = format!(
            "SELECT id, name, value FROM {} ORDER BY id LIMIT $1 OFFSET $2",
            self.relation
        );
        let rows = client.query(sql.as_str(), &[&limit, &offset]).await?;
        Ok(rows
            .into_iter()
            .map(|row| SourceRecord {
                id: row.get(0),
                name: row.get(1),
                value: row.get(2),
            })
            .collect())
    }
}

impl PgTargetWriter {
    /// Build a pool for the endpoint and verify connectivity.
    pub async fn connect(config: &EndpointConfig) -> Result<Self> {
        let pool = build_pool(config)?;
        test_connection(&pool, "target").await?;
        info!(
            "Connected to target: {}:{}/{} ({}.{})",
            config.host, config.port, config.database, config.schema, config.table
        );
        Ok(Self {
            pool,
            relation: qualify_table(&config.schema, &config.table),
        })
    }

    /// Connectivity check for health reporting.
    pub async fn ping(&self) -> Result<()> {
        test_connection(&self.pool, "target").await
    }

    /// Row count of the target relation, for post-run validation.
    pub async fn count(&self) -> std::result::Result<i64, StorageError> {
        let client = checkout(&self.pool, "counting target rows").await?;
        let sql = format!("SELECT count(*) FROM {}", self.relation);
        let row = client.query_one(sql.as_str(), &[]).await?;
        Ok(row.get(0))
    }
}

#[async_trait]
impl TargetWriter for PgTargetWriter {
    async fn bulk_upsert(&self, records: &[TargetRecord]) -> std::result::Result<(), StorageError> {
        if records.is_empty() {
            return Ok(());
        }

        let mut ids = Vec::with_capacity(records.len());
        let mut names = Vec::with_capacity(records.len());
        let mut values = Vec::with_capacity(records.len());
        for record in records {
            ids.push(record.id);
            names.push(record.name.as_str());
            values.push(record.value.as_str());
        }

        // Array-valued parameters keep this to one statement and three
        // bind parameters regardless of page size (a flattened VALUES list
        // would hit the protocol's parameter limit long before MAX_CHUNK_ROWS).
        // ON CONFLICT makes the duplicate-id case an in-place overwrite, so
        // replaying a page is a no-op; any other constraint violation still
        // surfaces as an error.
        let client = checkout(&self.pool, "writing target page").await?;
        let sql = format!(
            "INSERT INTO {} (id, name, value) \
             SELECT * FROM unnest($1::bigint[], $2::text[], $3::text[]) \
             ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, value = EXCLUDED.value",
            self.relation
        );
        client.execute(sql.as_str(), &[&ids, &names, &values]).await?;
        Ok(())
    }
}

/// Get a pooled connection with context attached to any failure.
async fn checkout(pool: &Pool, context: &str) -> std::result::Result<Object, StorageError> {
    pool.get().await.map_err(|e| StorageError::pool(e, context))
}

async fn test_connection(pool: &Pool, which: &str) -> Result<()> {
    let client = pool
        .get()
        .await
        .map_err(|e| CopyError::Config(format!("cannot connect to {}: {}", which, e)))?;
    client
        .simple_query("SELECT 1")
        .await
        .map_err(|e| CopyError::Config(format!("{} connection test failed: {}", which, e)))?;
    Ok(())
}

/// Build a deadpool-postgres pool for an endpoint, honoring its ssl_mode.
fn build_pool(config: &EndpointConfig) -> Result<Pool> {
    let mut pg_config = PgConfig::new();
    pg_config.host(&config.host);
    pg_config.port(config.port);
    pg_config.dbname(&config.database);
    pg_config.user(&config.user);
    pg_config.password(&config.password);

    let mgr_config = ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    };

    let pool = match config.ssl_mode.as_str() {
        "disable" => {
            warn!("PostgreSQL TLS is disabled. Credentials will be transmitted in plaintext.");
            let mgr = Manager::from_config(pg_config, tokio_postgres::NoTls, mgr_config);
            Pool::builder(mgr)
                .max_size(POOL_SIZE)
                .build()
                .map_err(|e| CopyError::Config(format!("failed to build pool: {}", e)))?
        }
        _ => {
            let tls_config = build_tls_config(&config.ssl_mode)?;
            let tls_connector = MakeRustlsConnect::new(tls_config);
            let mgr = Manager::from_config(pg_config, tls_connector, mgr_config);
            Pool::builder(mgr)
                .max_size(POOL_SIZE)
                .build()
                .map_err(|e| CopyError::Config(format!("failed to build pool: {}", e)))?
        }
    };

    Ok(pool)
}

// The reference pipeline processes one page at a time; a couple of spare
// connections cover the health/validate paths.
const POOL_SIZE: usize = 4;

/// Build TLS configuration based on ssl_mode.
fn build_tls_config(ssl_mode: &str) -> Result<ClientConfig> {
    let mut root_store = rustls::RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = match ssl_mode {
        "require" => {
            warn!(
                "ssl_mode=require: TLS enabled but server certificate is not verified. \
                 Consider using 'verify-full' for production."
            );
            ClientConfig::builder()
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(NoVerifier))
                .with_no_client_auth()
        }
        "verify-ca" | "verify-full" => {
            info!("ssl_mode={}: certificate verification enabled", ssl_mode);
            ClientConfig::builder()
                .with_root_certificates(root_store)
                .with_no_client_auth()
        }
        other => {
            return Err(CopyError::Config(format!(
                "Invalid ssl_mode '{}'. Valid options: disable, require, verify-ca, verify-full",
                other
            )));
        }
    };

    Ok(config)
}

/// Quote a PostgreSQL identifier.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Qualify a table name with schema and proper quoting.
fn qualify_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(table))
}

/// Certificate verifier that accepts any certificate (`ssl_mode=require`).
///
/// # Security Warning
///
/// This bypasses all certificate validation. Use `verify-full` on untrusted
/// networks.
#[derive(Debug)]
struct NoVerifier;

impl rustls::client::danger::ServerCertVerifier for NoVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> std::result::Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        vec![
            rustls::SignatureScheme::RSA_PKCS1_SHA256,
            rustls::SignatureScheme::RSA_PKCS1_SHA384,
            rustls::SignatureScheme::RSA_PKCS1_SHA512,
            rustls::SignatureScheme::ECDSA_NISTP256_SHA256,
            rustls::SignatureScheme::ECDSA_NISTP384_SHA384,
            rustls::SignatureScheme::ECDSA_NISTP521_SHA512,
            rustls::SignatureScheme::RSA_PSS_SHA256,
            rustls::SignatureScheme::RSA_PSS_SHA384,
            rustls::SignatureScheme::RSA_PSS_SHA512,
            rustls::SignatureScheme::ED25519,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident_escapes_embedded_quotes() {
        assert_eq!(quote_ident("sample_data"), "\"sample_data\"");
        assert_eq!(quote_ident("odd\"name"), "\"odd\"\"name\"");
    }

    #[test]
    fn test_qualify_table() {
        assert_eq!(
            qualify_table("source_schema", "sample_data"),
            "\"source_schema\".\"sample_data\""
        );
    }

    #[test]
    fn test_tls_config_rejects_unknown_mode() {
        assert!(build_tls_config("prefer").is_err());
        assert!(build_tls_config("verify-full").is_ok());
    }
}
