//! Connection parameters.

use rustls::client::{ServerCertVerified, ServerCertVerifier, ServerName};
use rustls::{Certificate, ClientConfig, OwnedTrustAnchor, RootCertStore};
use secstr::SecUtf8;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{MdbError, MdbResult};

/// Describes whether and how TLS is used for a connection.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Tls {
    /// Plain TCP connection.
    #[default]
    Off,
    /// TLS without server certificate validation. Dangerous; intended
    /// for local development against a self-signed server only.
    Insecure,
    /// TLS with server certificate validation. `ca_certs_path`, when
    /// set, is a PEM file of additional trust anchors; absent that,
    /// the Mozilla root store is used.
    Secure { ca_certs_path: Option<String> },
}

/// An immutable set of parameters describing how to connect to a
/// MongoDB server.
///
/// Build one with [`ConnectParams::builder`], or use the [`connect`](
/// crate::connect) convenience function directly.
#[derive(Clone, Debug)]
pub struct ConnectParams {
    host: String,
    addr: String,
    database: String,
    user: Option<String>,
    password: SecUtf8,
    tls: Tls,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
}

impl ConnectParams {
    #[must_use]
    pub fn builder() -> ConnectParamsBuilder {
        ConnectParamsBuilder::new()
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub fn addr(&self) -> &str {
        &self.addr
    }

    #[must_use]
    pub fn database(&self) -> &str {
        &self.database
    }

    #[must_use]
    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    #[must_use]
    pub fn password(&self) -> &SecUtf8 {
        &self.password
    }

    #[must_use]
    pub fn is_tls(&self) -> bool {
        !matches!(self.tls, Tls::Off)
    }

    #[must_use]
    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout
    }

    #[must_use]
    pub fn write_timeout(&self) -> Option<Duration> {
        self.write_timeout
    }

    pub(crate) fn rustls_clientconfig(&self) -> MdbResult<ClientConfig> {
        match &self.tls {
            Tls::Off => Err(MdbError::Usage(
                "rustls_clientconfig called with Tls::Off",
            )),
            Tls::Secure { ca_certs_path } => {
                let mut root_store = RootCertStore::empty();
                match ca_certs_path {
                    None => {
                        root_store.add_server_trust_anchors(webpki_roots::TLS_SERVER_ROOTS.iter().map(
                            |ta| {
                                OwnedTrustAnchor::from_subject_spki_name_constraints(
                                    ta.subject,
                                    ta.spki,
                                    ta.name_constraints,
                                )
                            },
                        ));
                    }
                    Some(path) => {
                        let file = std::fs::File::open(Path::new(path))?;
                        let mut reader = std::io::BufReader::new(file);
                        let der_certs = rustls_pemfile::certs(&mut reader).map_err(|_| {
                            MdbError::Usage("CA certificate file is not valid PEM")
                        })?;
                        let (n_ok, n_err) = root_store.add_parsable_certificates(&der_certs);
                        if n_ok == 0 {
                            warn!("none of the server certificates in {path} were accepted");
                        } else if n_err > 0 {
                            warn!("not all server certificates in {path} were accepted");
                        }
                    }
                }
                Ok(ClientConfig::builder()
                    .with_safe_defaults()
                    .with_root_certificates(root_store)
                    .with_no_client_auth())
            }
            Tls::Insecure => Ok(ClientConfig::builder()
                .with_safe_defaults()
                .with_custom_certificate_verifier(Arc::new(NoCertificateVerification))
                .with_no_client_auth()),
        }
    }
}

/// Builds a [`ConnectParams`].
#[derive(Clone, Debug)]
pub struct ConnectParamsBuilder {
    host: Option<String>,
    port: u16,
    database: Option<String>,
    user: Option<String>,
    password: String,
    tls: Tls,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
}

impl Default for ConnectParamsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectParamsBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            host: None,
            port: 27017,
            database: None,
            user: None,
            password: String::new(),
            tls: Tls::Off,
            read_timeout: None,
            write_timeout: None,
        }
    }

    #[must_use]
    pub fn hostname(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn dbname(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    #[must_use]
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    #[must_use]
    pub fn tls(mut self, tls: Tls) -> Self {
        self.tls = tls;
        self
    }

    #[must_use]
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = Some(timeout);
        self
    }

    pub fn build(self) -> MdbResult<ConnectParams> {
        let host = self
            .host
            .ok_or(MdbError::Usage("ConnectParamsBuilder: hostname is required"))?;
        let database = self
            .database
            .ok_or(MdbError::Usage("ConnectParamsBuilder: dbname is required"))?;
        Ok(ConnectParams {
            addr: format!("{host}:{}", self.port),
            host,
            database,
            user: self.user,
            password: SecUtf8::from(self.password),
            tls: self.tls,
            read_timeout: self.read_timeout,
            write_timeout: self.write_timeout,
        })
    }
}

struct NoCertificateVerification;
impl ServerCertVerifier for NoCertificateVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &Certificate,
        _intermediates: &[Certificate],
        _server_name: &ServerName,
        _scts: &mut dyn Iterator<Item = &[u8]>,
        _ocsp_response: &[u8],
        _now: std::time::SystemTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_requires_host_and_database() {
        assert!(ConnectParams::builder().build().is_err());
        assert!(ConnectParams::builder().hostname("h").build().is_err());
        assert!(ConnectParams::builder()
            .hostname("h")
            .dbname("d")
            .build()
            .is_ok());
    }

    #[test]
    fn addr_combines_host_and_port() {
        let params = ConnectParams::builder()
            .hostname("example.com")
            .port(27018)
            .dbname("test")
            .build()
            .unwrap();
        assert_eq!(params.addr(), "example.com:27018");
        assert!(!params.is_tls());
    }
}
