use std::io::{self, Read};

use encoding_rs::{CoderResult, Decoder, Encoding, UTF_8};

/// Default cap on a single captured line.
pub const DEFAULT_MAX_LINE_BYTES: usize = 1024 * 1024;

const READ_CHUNK: usize = 8 * 1024;

/// Turns raw pipe bytes into text lines.
///
/// Bytes are decoded before they are split, so encodings whose newline is
/// not the single byte `0x0A` (UTF-16 for one) keep their lines aligned. A
/// character split across two reads is held by the decoder until the rest
/// arrives. Invalid sequences are replaced rather than rejected.
///
/// Lines are yielded without their `\n` or `\r\n` terminator. A line longer
/// than `max_line_bytes` of decoded UTF-8 is cut at a character boundary and
/// the rest of it is discarded.
pub(crate) struct LineDecoder {
    decoder: Decoder,
    decoded: String,
    line: String,
    max_line_bytes: usize,
    truncated: bool,
    partial: bool,
}

impl LineDecoder {
    pub(crate) fn new(encoding: Option<&'static Encoding>, max_line_bytes: usize) -> Self {
        Self {
            decoder: encoding
                .unwrap_or(UTF_8)
                .new_decoder_without_bom_handling(),
            decoded: String::new(),
            line: String::new(),
            max_line_bytes,
            truncated: false,
            partial: false,
        }
    }

    /// Decode `bytes` and hand every completed line to `on_line`, together
    /// with whether it was truncated.
    pub(crate) fn feed(&mut self, bytes: &[u8], on_line: &mut impl FnMut(&str, bool)) {
        self.decode(bytes, false);
        self.split_decoded(on_line);
    }

    /// Flush the decoder at end of stream. A final line without a trailing
    /// newline is still yielded.
    pub(crate) fn finish(&mut self, on_line: &mut impl FnMut(&str, bool)) {
        self.decode(&[], true);
        self.split_decoded(on_line);
        if self.partial {
            self.emit(on_line);
        }
    }

    fn decode(&mut self, bytes: &[u8], last: bool) {
        let mut input = bytes;
        loop {
            let needed = self
                .decoder
                .max_utf8_buffer_length(input.len())
                .unwrap_or(READ_CHUNK);
            self.decoded.reserve(needed);
            let (result, read, _) = self.decoder.decode_to_string(input, &mut self.decoded, last);
            input = input.get(read..).unwrap_or_default();
            if result == CoderResult::InputEmpty {
                break;
            }
        }
    }

    fn split_decoded(&mut self, on_line: &mut impl FnMut(&str, bool)) {
        let decoded = std::mem::take(&mut self.decoded);
        let mut rest = decoded.as_str();
        while let Some(pos) = rest.find('\n') {
            self.append(rest.get(..pos).unwrap_or_default());
            self.emit(on_line);
            rest = rest.get(pos + 1..).unwrap_or_default();
        }
        self.append(rest);

        self.decoded = decoded;
        self.decoded.clear();
    }

    fn append(&mut self, piece: &str) {
        if piece.is_empty() {
            return;
        }
        self.partial = true;
        let room = self.max_line_bytes.saturating_sub(self.line.len());
        if piece.len() <= room {
            self.line.push_str(piece);
            return;
        }
        self.truncated = true;
        let mut end = room;
        while !piece.is_char_boundary(end) {
            end -= 1;
        }
        self.line.push_str(piece.get(..end).unwrap_or_default());
    }

    fn emit(&mut self, on_line: &mut impl FnMut(&str, bool)) {
        if self.line.ends_with('\r') {
            self.line.pop();
        }
        on_line(&self.line, self.truncated);
        self.line.clear();
        self.truncated = false;
        self.partial = false;
    }
}

/// Read `reader` to end of stream, yielding each decoded line.
pub(crate) fn read_lines<R: Read>(
    mut reader: R,
    encoding: Option<&'static Encoding>,
    max_line_bytes: usize,
    mut on_line: impl FnMut(&str, bool),
) -> io::Result<()> {
    let mut lines = LineDecoder::new(encoding, max_line_bytes);
    let mut buf = vec![0u8; READ_CHUNK];
    let outcome = loop {
        match reader.read(&mut buf) {
            Ok(0) => break Ok(()),
            Ok(read) => lines.feed(buf.get(..read).unwrap_or_default(), &mut on_line),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => break Err(err),
        }
    };
    // Whatever arrived before a read error is still captured.
    lines.finish(&mut on_line);
    outcome
}
