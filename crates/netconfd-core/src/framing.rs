//! NETCONF message framing as a `tokio_util` codec.
//!
//! Inbound, a message ends at whichever comes first of the base:1.0
//! end-of-message marker `]]>]]>` and the base:1.1 end-of-chunks marker
//! `\n##\n`; chunk headers inside a chunked frame are stripped. Outbound,
//! the server hello is end-of-message framed and every reply is a single
//! chunk.

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

use crate::error::CoreError;

pub const END_OF_MESSAGE: &[u8] = b"]]>]]>";
pub const END_OF_CHUNKS: &[u8] = b"\n##\n";

/// Something the server writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// `<hello>`, terminated by `]]>]]>`.
    Hello(String),
    /// `<rpc-reply>`, as `\n#<len>\n<reply>\n##\n`.
    Reply(String),
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NetconfCodec;

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn is_blank(buf: &[u8]) -> bool {
    buf.iter().all(u8::is_ascii_whitespace)
}

/// Concatenate the chunk bodies of `\n#<len>\n<body>` sequences. Anything
/// that does not parse as chunks is passed through unchanged.
fn dechunk(frame: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(frame.len());
    let mut rest = frame;
    while let Some(header) = rest.strip_prefix(b"\n#") {
        let Some(newline) = header.iter().position(|&b| b == b'\n') else {
            break;
        };
        let Some(len) = std::str::from_utf8(&header[..newline])
            .ok()
            .and_then(|digits| digits.parse::<usize>().ok())
        else {
            break;
        };
        let data = &header[newline + 1..];
        if data.len() < len {
            break;
        }
        out.extend_from_slice(&data[..len]);
        rest = &data[len..];
    }

    if rest.is_empty() && !out.is_empty() {
        out
    } else {
        frame.to_vec()
    }
}

impl Decoder for NetconfCodec {
    type Item = String;
    type Error = CoreError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            if is_blank(src) {
                return Ok(None);
            }

            let eom = find(src, END_OF_MESSAGE);
            let eoc = find(src, END_OF_CHUNKS);
            let (at, delimiter, chunked) = match (eom, eoc) {
                (Some(m), Some(c)) if c < m => (c, END_OF_CHUNKS.len(), true),
                (Some(m), _) => (m, END_OF_MESSAGE.len(), false),
                (None, Some(c)) => (c, END_OF_CHUNKS.len(), true),
                (None, None) => return Ok(None),
            };

            let frame = src.split_to(at);
            src.advance(delimiter);
            if is_blank(&frame) {
                continue;
            }

            let body = if chunked { dechunk(&frame) } else { frame.to_vec() };
            trace!(bytes = body.len(), chunked, "frame decoded");
            return Ok(Some(String::from_utf8_lossy(&body).into_owned()));
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(frame) = self.decode(buf)? {
            return Ok(Some(frame));
        }
        if is_blank(buf) {
            buf.clear();
            return Ok(None);
        }
        let rest = buf.split();
        Ok(Some(String::from_utf8_lossy(&rest).into_owned()))
    }
}

impl Encoder<Outbound> for NetconfCodec {
    type Error = CoreError;

    fn encode(&mut self, item: Outbound, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            Outbound::Hello(xml) => {
                dst.reserve(xml.len() + END_OF_MESSAGE.len());
                dst.extend_from_slice(xml.as_bytes());
                dst.extend_from_slice(END_OF_MESSAGE);
            }
            Outbound::Reply(xml) => {
                let header = format!("\n#{}\n", xml.len());
                dst.reserve(header.len() + xml.len() + END_OF_CHUNKS.len());
                dst.extend_from_slice(header.as_bytes());
                dst.extend_from_slice(xml.as_bytes());
                dst.extend_from_slice(END_OF_CHUNKS);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use pretty_assertions::assert_eq;
    use tokio_util::codec::FramedRead;

    fn decode_all(input: &[u8]) -> Vec<String> {
        let mut codec = NetconfCodec;
        let mut buf = BytesMut::from(input);
        let mut out = Vec::new();
        while let Some(frame) = codec.decode(&mut buf).unwrap() {
            out.push(frame);
        }
        if let Some(frame) = codec.decode_eof(&mut buf).unwrap() {
            out.push(frame);
        }
        out
    }

    #[test]
    fn end_of_message_framing() {
        assert_eq!(
            decode_all(b"<rpc message-id=\"1\"/>]]>]]><rpc message-id=\"2\"/>]]>]]>"),
            ["<rpc message-id=\"1\"/>", "<rpc message-id=\"2\"/>"]
        );
    }

    #[test]
    fn chunk_headers_are_stripped() {
        assert_eq!(
            decode_all(b"\n#5\n<rpc \n#16\nmessage-id=\"3\"/>\n##\n"),
            ["<rpc message-id=\"3\"/>"]
        );
    }

    #[test]
    fn earliest_delimiter_wins() {
        let frames = decode_all(b"\n#4\nabcd\n##\n<b/>]]>]]>");
        assert_eq!(frames, ["abcd", "<b/>"]);
    }

    #[test]
    fn blank_input_yields_nothing() {
        assert!(decode_all(b"  \r\n\t").is_empty());
        assert!(decode_all(b"").is_empty());
        assert_eq!(decode_all(b"\n]]>]]><a/>]]>]]>"), ["<a/>"]);
    }

    #[test]
    fn trailing_bytes_at_eof_form_a_message() {
        assert_eq!(decode_all(b"<a/>]]>]]><close-session/>"), ["<a/>", "<close-session/>"]);
    }

    #[test]
    fn reply_is_single_chunk() {
        let mut buf = BytesMut::new();
        NetconfCodec
            .encode(Outbound::Reply("<ok/>".into()), &mut buf)
            .unwrap();
        assert_eq!(&buf[..], b"\n#5\n<ok/>\n##\n");

        let mut buf = BytesMut::new();
        NetconfCodec
            .encode(Outbound::Hello("<hello/>".into()), &mut buf)
            .unwrap();
        assert_eq!(&buf[..], b"<hello/>]]>]]>");
    }

    #[tokio::test]
    async fn message_split_across_reads() {
        let io = tokio_test::io::Builder::new()
            .read(b"<rpc message-id=\"7\"><get")
            .read(b"/></rpc>]]>")
            .read(b"]]>\n#4\n<a/>\n#")
            .read(b"2\nxy\n##\n")
            .build();
        let mut frames = FramedRead::new(io, NetconfCodec);

        assert_eq!(
            frames.next().await.unwrap().unwrap(),
            "<rpc message-id=\"7\"><get/></rpc>"
        );
        assert_eq!(frames.next().await.unwrap().unwrap(), "<a/>xy");
        assert!(frames.next().await.is_none());
    }
}
