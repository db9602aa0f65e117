//! Stream reconstructor.
//!
//! Consumes the chunk stream of one completion and rebuilds the trailing
//! assistant message of a conversation as bytes arrive. Every chunk
//! produces a full [`StatePatch::SelectedConversation`] so the host never
//! has to apply deltas.
//!
//! The cancel flag is polled once per chunk boundary. When it is set the
//! flag is cleared, the producer is told to stop, and the partial message
//! is kept as it stands.

use parley_core::cancel::CancelFlag;
use parley_core::error::{Error, Result};
use parley_core::event::{StatePatch, StateSink};
use parley_core::message::{Conversation, Message};
use parley_core::provider::ChunkStream;
use tracing::{debug, info};

/// How a stream that did not fail ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    Completed,
    Aborted,
}

/// Rebuilds a conversation from one completion stream.
#[derive(Debug)]
pub struct StreamReconstructor {
    conversation: Conversation,

    /// Text decoded so far
    text: String,

    /// Trailing bytes of an incomplete UTF-8 sequence
    pending: Vec<u8>,

    is_first: bool,
    chunks: usize,
}

impl StreamReconstructor {
    pub fn new(conversation: Conversation) -> Self {
        Self {
            conversation,
            text: String::new(),
            pending: Vec::new(),
            is_first: true,
            chunks: 0,
        }
    }

    /// The conversation as last published.
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn chunks(&self) -> usize {
        self.chunks
    }

    pub fn into_conversation(self) -> Conversation {
        self.conversation
    }

    /// Drive `stream` to its end, an abort, or an error.
    ///
    /// On error the conversation keeps whatever was streamed before it and
    /// stays readable through [`StreamReconstructor::conversation`].
    pub async fn run(
        &mut self,
        stream: &mut ChunkStream,
        cancel: &CancelFlag,
        sink: &dyn StateSink,
    ) -> Result<StreamOutcome> {
        loop {
            if cancel.take() {
                stream.abort();
                info!(
                    conversation_id = %self.conversation.id,
                    chunks = self.chunks,
                    "Stream aborted"
                );
                return Ok(StreamOutcome::Aborted);
            }

            match stream.next_chunk().await {
                Some(Ok(bytes)) => {
                    let decoded = self.decode(&bytes);
                    self.apply(&decoded, sink);
                }
                Some(Err(e)) => {
                    debug!(
                        conversation_id = %self.conversation.id,
                        chunks = self.chunks,
                        error = %e,
                        "Stream failed"
                    );
                    return Err(Error::Provider(e));
                }
                None => break,
            }
        }

        if !self.pending.is_empty() {
            let tail = String::from_utf8_lossy(&self.pending).into_owned();
            self.pending.clear();
            self.apply(&tail, sink);
        }

        debug!(
            conversation_id = %self.conversation.id,
            chunks = self.chunks,
            chars = self.text.chars().count(),
            "Stream completed"
        );
        Ok(StreamOutcome::Completed)
    }

    fn apply(&mut self, decoded: &str, sink: &dyn StateSink) {
        self.chunks += 1;
        self.text.push_str(decoded);
        if self.is_first {
            self.is_first = false;
            self.conversation.push(Message::assistant(self.text.clone()));
        } else {
            self.conversation.set_last_content(self.text.clone());
        }
        sink.dispatch(StatePatch::SelectedConversation(self.conversation.clone()));
    }

    /// Decode as much of the buffered bytes as forms complete characters.
    fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut out = String::new();
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending.clear();
                    return out;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match e.error_len() {
                        Some(invalid) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + invalid);
                        }
                        None => {
                            // incomplete sequence at the end: wait for more bytes
                            self.pending.drain(..valid);
                            return out;
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::error::ProviderError;
    use parley_core::event::RecordingSink;
    use parley_core::message::Role;
    use parley_core::model::ModelSpec;
    use std::sync::Mutex;

    fn conversation() -> Conversation {
        let mut c = Conversation::new(ModelSpec::fallback(), "You are helpful.", 1.0);
        c.push(Message::user("Hi"));
        c
    }

    fn chunks(parts: &[&str]) -> ChunkStream {
        ChunkStream::from_items(parts.iter().map(|p| Ok(p.as_bytes().to_vec())).collect())
    }

    /// Requests cancellation once it has seen `after` conversation patches.
    struct CancelAfter {
        after: usize,
        seen: Mutex<usize>,
        cancel: CancelFlag,
    }

    impl StateSink for CancelAfter {
        fn dispatch(&self, patch: StatePatch) {
            if let StatePatch::SelectedConversation(_) = patch {
                let mut seen = self.seen.lock().unwrap();
                *seen += 1;
                if *seen == self.after {
                    self.cancel.request();
                }
            }
        }
    }

    #[tokio::test]
    async fn appends_exactly_one_assistant_message() {
        for n in [1usize, 10, 1000] {
            let parts: Vec<String> = (0..n).map(|i| format!("w{i} ")).collect();
            let refs: Vec<&str> = parts.iter().map(String::as_str).collect();
            let mut stream = chunks(&refs);
            let sink = RecordingSink::new();
            let cancel = CancelFlag::new();

            let mut rec = StreamReconstructor::new(conversation());
            let outcome = rec.run(&mut stream, &cancel, &sink).await.unwrap();
            assert_eq!(outcome, StreamOutcome::Completed);

            let conv = rec.into_conversation();
            assert_eq!(conv.messages.len(), 2, "n = {n}");
            assert_eq!(conv.messages[1].role, Role::Assistant);
            assert_eq!(conv.messages[1].content, parts.concat());
            assert_eq!(sink.patches().len(), n);
        }
    }

    #[tokio::test]
    async fn every_patch_carries_the_full_text() {
        let mut stream = chunks(&["Hel", "lo", "!"]);
        let sink = RecordingSink::new();
        let mut rec = StreamReconstructor::new(conversation());
        rec.run(&mut stream, &CancelFlag::new(), &sink).await.unwrap();

        let contents: Vec<String> = sink
            .patches()
            .into_iter()
            .filter_map(|p| match p {
                StatePatch::SelectedConversation(c) => c.last_message().map(|m| m.content.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(contents, vec!["Hel", "Hello", "Hello!"]);
    }

    #[tokio::test]
    async fn abort_keeps_the_first_k_chunks() {
        let parts = ["a", "b", "c", "d", "e"];
        for k in 1..parts.len() {
            let cancel = CancelFlag::new();
            let sink = CancelAfter {
                after: k,
                seen: Mutex::new(0),
                cancel: cancel.clone(),
            };
            let mut stream = chunks(&parts);

            let mut rec = StreamReconstructor::new(conversation());
            let outcome = rec.run(&mut stream, &cancel, &sink).await.unwrap();

            assert_eq!(outcome, StreamOutcome::Aborted);
            assert!(stream.is_aborted());
            assert!(!cancel.is_requested(), "flag must be cleared");
            let conv = rec.into_conversation();
            assert_eq!(conv.messages.len(), 2);
            assert_eq!(conv.messages[1].content, parts[..k].concat());
        }
    }

    #[tokio::test]
    async fn cancel_before_first_chunk_appends_nothing() {
        let cancel = CancelFlag::new();
        cancel.request();
        let mut stream = chunks(&["never"]);
        let sink = RecordingSink::new();

        let mut rec = StreamReconstructor::new(conversation());
        let outcome = rec.run(&mut stream, &cancel, &sink).await.unwrap();

        assert_eq!(outcome, StreamOutcome::Aborted);
        assert_eq!(rec.conversation().messages.len(), 1);
        assert!(sink.patches().is_empty());
    }

    #[tokio::test]
    async fn stream_error_propagates_and_keeps_partial_text() {
        let mut stream = ChunkStream::from_items(vec![
            Ok(b"partial".to_vec()),
            Err(ProviderError::StreamInterrupted("connection reset".into())),
        ]);
        let sink = RecordingSink::new();
        let mut rec = StreamReconstructor::new(conversation());

        let err = rec.run(&mut stream, &CancelFlag::new(), &sink).await.unwrap_err();
        assert!(matches!(err, Error::Provider(ProviderError::StreamInterrupted(_))));
        assert_eq!(rec.conversation().messages[1].content, "partial");
    }

    #[tokio::test]
    async fn multibyte_characters_split_across_chunks() {
        let bytes = "héllo 東京".as_bytes();
        // split inside "é" and inside "東"
        let items = vec![
            Ok(bytes[..2].to_vec()),
            Ok(bytes[2..8].to_vec()),
            Ok(bytes[8..].to_vec()),
        ];
        let mut stream = ChunkStream::from_items(items);
        let mut rec = StreamReconstructor::new(conversation());
        rec.run(&mut stream, &CancelFlag::new(), &RecordingSink::new())
            .await
            .unwrap();
        assert_eq!(rec.text(), "héllo 東京");
    }

    #[tokio::test]
    async fn invalid_bytes_become_replacement_characters() {
        let mut stream = ChunkStream::from_items(vec![Ok(vec![b'o', b'k', 0xff]), Ok(vec![0xe6])]);
        let mut rec = StreamReconstructor::new(conversation());
        rec.run(&mut stream, &CancelFlag::new(), &RecordingSink::new())
            .await
            .unwrap();
        assert_eq!(rec.text(), "ok\u{FFFD}\u{FFFD}");
    }

    #[tokio::test]
    async fn empty_stream_completes_without_a_message() {
        let mut stream = ChunkStream::from_items(Vec::new());
        let mut rec = StreamReconstructor::new(conversation());
        let outcome = rec
            .run(&mut stream, &CancelFlag::new(), &RecordingSink::new())
            .await
            .unwrap();
        assert_eq!(outcome, StreamOutcome::Completed);
        assert_eq!(rec.conversation().messages.len(), 1);
    }
}
