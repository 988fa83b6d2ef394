//! In-memory mail store for unit tests.

use async_trait::async_trait;
use mail_builder::MessageBuilder;
use std::sync::{Arc, Mutex};

use super::store::{MailSession, MailStore};
use super::{PollError, SearchFilter};
use crate::config::Credential;

pub const SENDER: &str = "no-reply@app.example";

#[derive(Debug, Clone)]
struct StoredMessage {
    uid: u32,
    sender: String,
    seen: bool,
    raw: Vec<u8>,
    /// Invisible until this many searches have run (1-based).
    visible_from_search: u32,
}

#[derive(Debug, Default)]
struct StoreState {
    messages: Vec<StoredMessage>,
    next_uid: u32,
    searches: u32,
    opens: u32,
    logouts: u32,
    fetched: Vec<u32>,
    refuse_login: bool,
    fail_search: bool,
}

/// Shared handle; clones observe the same mailbox.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMailStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryMailStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A message already in the mailbox.
    pub fn deliver(&self, sender: &str, raw: Vec<u8>) -> u32 {
        self.deliver_on_search(sender, raw, 1)
    }

    /// A message that shows up starting with the `search_number`-th search.
    pub fn deliver_on_search(&self, sender: &str, raw: Vec<u8>, search_number: u32) -> u32 {
        let mut state = self.state.lock().unwrap();
        state.next_uid += 1;
        let uid = state.next_uid;
        state.messages.push(StoredMessage {
            uid,
            sender: sender.to_string(),
            seen: false,
            raw,
            visible_from_search: search_number,
        });
        uid
    }

    pub fn refuse_login(&self) {
        self.state.lock().unwrap().refuse_login = true;
    }

    pub fn fail_search(&self) {
        self.state.lock().unwrap().fail_search = true;
    }

    pub fn searches(&self) -> u32 {
        self.state.lock().unwrap().searches
    }

    pub fn opens(&self) -> u32 {
        self.state.lock().unwrap().opens
    }

    pub fn logouts(&self) -> u32 {
        self.state.lock().unwrap().logouts
    }

    pub fn fetched(&self) -> Vec<u32> {
        self.state.lock().unwrap().fetched.clone()
    }
}

#[async_trait]
impl MailStore for InMemoryMailStore {
    async fn open(&self, _credential: &Credential) -> Result<Box<dyn MailSession>, PollError> {
        let mut state = self.state.lock().unwrap();
        if state.refuse_login {
            return Err(PollError::Connection("authentication failed".to_string()));
        }
        state.opens += 1;
        Ok(Box::new(InMemorySession {
            state: self.state.clone(),
        }))
    }
}

struct InMemorySession {
    state: Arc<Mutex<StoreState>>,
}

#[async_trait]
impl MailSession for InMemorySession {
    async fn search(&mut self, filter: &SearchFilter) -> Result<Vec<u32>, PollError> {
        let mut state = self.state.lock().unwrap();
        state.searches += 1;
        if state.fail_search {
            return Err(PollError::Connection("connection reset".to_string()));
        }
        let current = state.searches;
        Ok(state
            .messages
            .iter()
            .filter(|m| m.visible_from_search <= current)
            .filter(|m| m.sender == filter.sender)
            .filter(|m| !filter.unseen_only || !m.seen)
            .map(|m| m.uid)
            .collect())
    }

    async fn fetch(&mut self, id: u32) -> Result<Vec<u8>, PollError> {
        let mut state = self.state.lock().unwrap();
        state.fetched.push(id);
        let message = state
            .messages
            .iter_mut()
            .find(|m| m.uid == id)
            .ok_or_else(|| PollError::Connection(format!("no message {id}")))?;
        message.seen = true;
        Ok(message.raw.clone())
    }

    async fn logout(&mut self) -> Result<(), PollError> {
        self.state.lock().unwrap().logouts += 1;
        Ok(())
    }
}

/// A recovery mail carrying `link` in a plain-text body.
pub fn reset_mail(link: &str) -> Vec<u8> {
    MessageBuilder::new()
        .from(SENDER)
        .to("user@example.com")
        .subject("Восстановление пароля")
        .text_body(format!("Для смены пароля перейдите по ссылке: {}\n", link))
        .write_to_vec()
        .unwrap()
}

/// A mail from the expected sender with no link in it.
pub fn unrelated_mail() -> Vec<u8> {
    MessageBuilder::new()
        .from(SENDER)
        .to("user@example.com")
        .subject("Welcome")
        .text_body("Welcome aboard")
        .write_to_vec()
        .unwrap()
}

/// Multipart mail whose only part is an image.
pub fn image_only_mail() -> Vec<u8> {
    format!(
        "From: {SENDER}\r\n\
Subject: logo\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/mixed; boundary=\"b1\"\r\n\
\r\n\
--b1\r\n\
Content-Type: image/png\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
iVBORw0KGgo=\r\n\
--b1--\r\n"
    )
    .into_bytes()
}
