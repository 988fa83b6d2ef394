use async_imap::Session;
use async_native_tls::TlsStream;
use async_trait::async_trait;
use futures::io::{AsyncRead, AsyncWrite};
use futures::StreamExt;
use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncReadCompatExt};

use super::store::{MailSession, MailStore};
use super::{PollError, SearchFilter};
use crate::config::{Credential, MailConfig};

/// Wrapper for either TLS or Plain IMAP stream
enum StreamWrapper {
    Tls(TlsStream<Compat<TcpStream>>),
    Plain(Compat<TcpStream>),
}

impl AsyncRead for StreamWrapper {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut TaskContext<'_>,
        buf: &mut [u8],
    ) -> Poll<std::io::Result<usize>> {
        match self.get_mut() {
            StreamWrapper::Tls(s) => Pin::new(s).poll_read(cx, buf),
            StreamWrapper::Plain(s) => Pin::new(s).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for StreamWrapper {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut TaskContext<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        match self.get_mut() {
            StreamWrapper::Tls(s) => Pin::new(s).poll_write(cx, buf),
            StreamWrapper::Plain(s) => Pin::new(s).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            StreamWrapper::Tls(s) => Pin::new(s).poll_flush(cx),
            StreamWrapper::Plain(s) => Pin::new(s).poll_flush(cx),
        }
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            StreamWrapper::Tls(s) => Pin::new(s).poll_close(cx),
            StreamWrapper::Plain(s) => Pin::new(s).poll_close(cx),
        }
    }
}

impl std::fmt::Debug for StreamWrapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamWrapper::Tls(_) => write!(f, "StreamWrapper::Tls"),
            StreamWrapper::Plain(_) => write!(f, "StreamWrapper::Plain"),
        }
    }
}

/// IMAP-backed mail store. Every `open` makes a fresh connection; sessions
/// are never pooled or shared between polls.
pub struct ImapMailStore {
    host: String,
    port: u16,
    folder: String,
}

impl ImapMailStore {
    pub fn new(host: String, port: u16, folder: String) -> Self {
        Self { host, port, folder }
    }

    pub fn from_config(config: &MailConfig) -> Self {
        Self::new(
            config.imap_host.clone(),
            config.imap_port,
            config.folder.clone(),
        )
    }

    fn uses_tls(&self) -> bool {
        self.port == 993 || self.port == 3993
    }

    async fn connect(&self) -> Result<StreamWrapper, PollError> {
        tracing::info!("Connecting to IMAP {}:{}", self.host, self.port);

        let tcp = TcpStream::connect(format!("{}:{}", self.host, self.port))
            .await
            .map_err(|e| PollError::Connection(format!("failed to connect to IMAP server: {e}")))?;

        if self.uses_tls() {
            tracing::debug!("Using IMAPS (TLS)");
            let tls = async_native_tls::TlsConnector::new();
            let tls_stream = tls
                .connect(&self.host, tcp.compat())
                .await
                .map_err(|e| PollError::Connection(format!("TLS handshake failed: {e}")))?;
            Ok(StreamWrapper::Tls(tls_stream))
        } else {
            tracing::debug!("Using plain IMAP");
            Ok(StreamWrapper::Plain(tcp.compat()))
        }
    }
}

#[async_trait]
impl MailStore for ImapMailStore {
    async fn open(&self, credential: &Credential) -> Result<Box<dyn MailSession>, PollError> {
        let stream = self.connect().await?;
        let client = async_imap::Client::new(stream);

        let mut session = client
            .login(&credential.address, &credential.secret)
            .await
            .map_err(|(err, _)| PollError::Connection(format!("IMAP login failed: {err}")))?;

        if let Err(err) = session.select(&self.folder).await {
            // Logged in but unusable; release before reporting.
            let _ = session.logout().await;
            return Err(PollError::Connection(format!(
                "failed to SELECT {}: {err}",
                self.folder
            )));
        }

        tracing::info!("IMAP login successful for {}", credential.address);
        Ok(Box::new(ImapSession { session }))
    }
}

/// A UID that SEARCH just returned must come back with a body; anything
/// else is the server misbehaving, not the message.
fn require_body(raw: Option<Vec<u8>>, uid: u32) -> Result<Vec<u8>, PollError> {
    raw.ok_or_else(|| PollError::Connection(format!("server returned no body for UID {uid}")))
}

struct ImapSession {
    session: Session<StreamWrapper>,
}

#[async_trait]
impl MailSession for ImapSession {
    async fn search(&mut self, filter: &SearchFilter) -> Result<Vec<u32>, PollError> {
        let query = filter.to_query();
        let uids = self
            .session
            .uid_search(&query)
            .await
            .map_err(|e| PollError::Connection(format!("IMAP UID SEARCH failed: {e}")))?;

        // UIDs grow with delivery order, so ascending order is oldest first.
        let mut uids: Vec<u32> = uids.into_iter().collect();
        uids.sort_unstable();
        tracing::debug!("SEARCH {} -> {} result(s)", query, uids.len());
        Ok(uids)
    }

    async fn fetch(&mut self, id: u32) -> Result<Vec<u8>, PollError> {
        let fetch_stream = self
            .session
            .uid_fetch(id.to_string(), "BODY[]")
            .await
            .map_err(|e| PollError::Connection(format!("IMAP UID FETCH failed: {e}")))?;
        tokio::pin!(fetch_stream);

        let mut raw_message: Option<Vec<u8>> = None;
        while let Some(result) = fetch_stream.next().await {
            let fetch = result
                .map_err(|e| PollError::Connection(format!("error fetching message: {e}")))?;
            if raw_message.is_none() {
                if let Some(body) = fetch.body() {
                    raw_message = Some(body.to_vec());
                }
            }
        }

        require_body(raw_message, id)
    }

    async fn logout(&mut self) -> Result<(), PollError> {
        self.session
            .logout()
            .await
            .map_err(|e| PollError::Connection(format!("IMAP LOGOUT failed: {e}")))
    }
}
