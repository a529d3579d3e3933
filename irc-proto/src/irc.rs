//! Implementation of IRC codec for Tokio.
use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::error;
use crate::line::LineCodec;
use crate::message::Message;

/// An IRC codec built around an inner codec.
pub struct IrcCodec {
    inner: LineCodec,
}

impl IrcCodec {
    /// Creates a new instance of IrcCodec wrapping a LineCodec with the specific encoding.
    pub fn new(label: &str) -> error::Result<IrcCodec> {
        LineCodec::new(label).map(|codec| IrcCodec { inner: codec })
    }

    /// Cuts a line at its first embedded line break, so a single message can never smuggle a
    /// second command onto the wire.
    pub fn sanitize(mut data: String) -> String {
        if let Some(pos) = data.find(|c| c == '\r' || c == '\n') {
            data.truncate(pos);
        }
        data
    }
}

impl Decoder for IrcCodec {
    type Item = Message;
    type Error = error::ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> error::Result<Option<Message>> {
        self.inner
            .decode(src)
            .and_then(|res| res.map_or(Ok(None), |msg| msg.parse::<Message>().map(Some)))
    }
}

impl Encoder<Message> for IrcCodec {
    type Error = error::ProtocolError;

    fn encode(&mut self, msg: Message, dst: &mut BytesMut) -> error::Result<()> {
        self.inner.encode(IrcCodec::sanitize(msg.to_string()), dst)
    }
}

impl Encoder<String> for IrcCodec {
    type Error = error::ProtocolError;

    fn encode(&mut self, line: String, dst: &mut BytesMut) -> error::Result<()> {
        self.inner.encode(IrcCodec::sanitize(line), dst)
    }
}

#[cfg(test)]
mod test {
    use super::IrcCodec;
    use crate::command::Command;
    use bytes::BytesMut;
    use tokio_util::codec::{Decoder, Encoder};

    #[test]
    fn sanitize() {
        assert_eq!(IrcCodec::sanitize("PRIVMSG #a :x\r\nQUIT".into()), "PRIVMSG #a :x");
        assert_eq!(IrcCodec::sanitize("PRIVMSG #a :x".into()), "PRIVMSG #a :x");
    }

    #[test]
    fn decode_message() {
        let mut codec = IrcCodec::new("utf-8").unwrap();
        let mut buf = BytesMut::from(&b":irc.example.org PING :token\r\n"[..]);
        let msg = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(msg.command, Command::PING("token".into(), None));
    }

    #[test]
    fn decode_error_keeps_stream_usable() {
        let mut codec = IrcCodec::new("utf-8").unwrap();
        let mut buf = BytesMut::from(&b":bad :line\r\nPING :x\r\n"[..]);
        assert!(codec.decode(&mut buf).is_err());
        assert!(codec.decode(&mut buf).unwrap().is_some());
    }

    #[test]
    fn encode_string_line() {
        let mut codec = IrcCodec::new("utf-8").unwrap();
        let mut buf = BytesMut::new();
        codec.encode("JOIN #a".to_owned(), &mut buf).unwrap();
        assert_eq!(&buf[..], b"JOIN #a\r\n");
    }
}
