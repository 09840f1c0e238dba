//! Minimal `text/event-stream` decoder
//!
//! Only `data` fields matter to the log stream; event names, ids and
//! comments are dropped.

#[derive(Debug, Default)]
pub(crate) struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub(crate) fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Data of the next complete event, skipping events that carry none
    pub(crate) fn next_data(&mut self) -> Option<String> {
        while let Some((end, separator)) = find_event_end(&self.buffer) {
            let event: Vec<u8> = self.buffer.drain(..end + separator).collect();
            let text = String::from_utf8_lossy(&event[..end]);

            let data: Vec<&str> = text
                .lines()
                .filter_map(|line| line.strip_prefix("data:"))
                .map(|value| value.strip_prefix(' ').unwrap_or(value))
                .collect();

            if !data.is_empty() {
                return Some(data.join("\n"));
            }
        }
        None
    }
}

/// Position of the blank line ending the first event, and its length
fn find_event_end(buffer: &[u8]) -> Option<(usize, usize)> {
    let lf = buffer.windows(2).position(|w| w == b"\n\n").map(|i| (i, 2));
    let crlf = buffer
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|i| (i, 4));

    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decodes_data_events() {
        let mut decoder = SseDecoder::default();
        decoder.push(b"data: [2025-01-01T00:00:00.000Z] earlier\n\ndata: pin 1 opened\n\n");

        assert_eq!(
            decoder.next_data().as_deref(),
            Some("[2025-01-01T00:00:00.000Z] earlier")
        );
        assert_eq!(decoder.next_data().as_deref(), Some("pin 1 opened"));
        assert_eq!(decoder.next_data(), None);
    }

    #[test]
    fn test_waits_for_complete_event() {
        let mut decoder = SseDecoder::default();
        decoder.push(b"data: pin 1 ");
        assert_eq!(decoder.next_data(), None);

        decoder.push(b"opened\n");
        assert_eq!(decoder.next_data(), None);

        decoder.push(b"\n");
        assert_eq!(decoder.next_data().as_deref(), Some("pin 1 opened"));
    }

    #[test]
    fn test_skips_keepalive_comments() {
        let mut decoder = SseDecoder::default();
        decoder.push(b":keepalive\n\ndata: OK\n\n");
        assert_eq!(decoder.next_data().as_deref(), Some("OK"));
    }

    #[test]
    fn test_multibyte_split_across_chunks() {
        let mut decoder = SseDecoder::default();
        let event = "data: débit 2 l/min\n\n".as_bytes();
        let (head, tail) = event.split_at(8);

        decoder.push(head);
        assert_eq!(decoder.next_data(), None);
        decoder.push(tail);
        assert_eq!(decoder.next_data().as_deref(), Some("débit 2 l/min"));
    }

    #[test]
    fn test_crlf_and_multiline_data() {
        let mut decoder = SseDecoder::default();
        decoder.push(b"data: a\r\ndata: b\r\n\r\n");
        assert_eq!(decoder.next_data().as_deref(), Some("a\nb"));
    }
}
