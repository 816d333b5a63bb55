//! Scripted fakes shared by the stream and relay tests.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use futures::{stream, StreamExt};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::{
    errors::Error,
    stream::{LineStream, StreamTransport},
    Result,
};

pub const KEEP_ALIVE_LINE: &str = r#"data: {"alerts":[{"name":"KEEP_ALIVE"}]}"#;

pub const NIRIM_LINE: &str = r#"data: {"alertTypeId":1,"alerts":[{"name":"נירים","englishName":"Nirim","areaNameHe":"עוטף עזה","areaNameEn":"Gaza Envelope","timeStamp":"2023-10-07 06:30:00","taCityId":1234,"lat":31.33,"lon":34.39,"countdownSec":15}]}"#;

pub enum Session {
    Fail(String),
    /// Yield the lines, then end the body.
    End(Vec<String>),
    /// Yield the lines, then stay silent forever.
    Hang(Vec<String>),
    /// Yield the lines, then a transport error.
    Fault(Vec<String>, String),
}

fn owned(lines: Vec<&str>) -> Vec<String> {
    lines.into_iter().map(str::to_string).collect()
}

impl Session {
    pub fn fail(reason: &str) -> Self {
        Self::Fail(reason.to_string())
    }

    pub fn end(lines: Vec<&str>) -> Self {
        Self::End(owned(lines))
    }

    pub fn hang(lines: Vec<&str>) -> Self {
        Self::Hang(owned(lines))
    }

    pub fn fault(lines: Vec<&str>, reason: &str) -> Self {
        Self::Fault(owned(lines), reason.to_string())
    }
}

struct Script {
    sessions: VecDeque<Session>,
    opens: Vec<Instant>,
}

/// Plays back one [`Session`] per `open`. Once the script is exhausted it
/// cancels `cancel` and hands out a silent stream.
#[derive(Clone)]
pub struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
    cancel: CancellationToken,
}

impl ScriptedTransport {
    pub fn new(cancel: CancellationToken, sessions: Vec<Session>) -> Self {
        Self {
            script: Arc::new(Mutex::new(Script {
                sessions: sessions.into(),
                opens: Vec::new(),
            })),
            cancel,
        }
    }

    pub fn open_times(&self) -> Vec<Instant> {
        self.script.lock().unwrap().opens.clone()
    }
}

fn lines_ok(lines: Vec<String>) -> impl futures::Stream<Item = Result<String>> + Send {
    stream::iter(lines.into_iter().map(Ok))
}

#[async_trait]
impl StreamTransport for ScriptedTransport {
    async fn open(&self) -> Result<LineStream> {
        let next = {
            let mut script = self.script.lock().unwrap();
            script.opens.push(Instant::now());
            script.sessions.pop_front()
        };

        match next {
            None => {
                self.cancel.cancel();
                Ok(Box::pin(stream::pending()))
            }
            Some(Session::Fail(reason)) => Err(Error::Connect(reason)),
            Some(Session::End(lines)) => Ok(Box::pin(lines_ok(lines))),
            Some(Session::Hang(lines)) => Ok(Box::pin(lines_ok(lines).chain(stream::pending()))),
            Some(Session::Fault(lines, reason)) => Ok(Box::pin(
                lines_ok(lines).chain(stream::once(async move { Err(Error::Transport(reason)) })),
            )),
        }
    }
}
